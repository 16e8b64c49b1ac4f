//! Track kinds and the endpoint types bound to a pipeline's edges.

use crate::stream::{self, Readable, Writable};
use std::fmt;
use std::time::Duration;

/// What flows through a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Data,
}

impl StreamKind {
    /// Returns the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Data => "data",
        }
    }

    /// True for the kinds that require host media capabilities.
    pub fn is_media(&self) -> bool {
        matches!(self, StreamKind::Video | StreamKind::Audio)
    }

    /// The media kind, when this is one.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            StreamKind::Video => Some(MediaKind::Video),
            StreamKind::Audio => Some(MediaKind::Audio),
            StreamKind::Data => None,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two media flavors a host can process or generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl From<MediaKind> for StreamKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => StreamKind::Video,
            MediaKind::Audio => StreamKind::Audio,
        }
    }
}

/// A host-owned media track offered to the pipeline as a source.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub kind: MediaKind,
    pub label: String,
}

impl MediaTrack {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }
}

pub(crate) enum SourceInner<T> {
    Media(MediaTrack),
    Data(Readable<T>),
}

/// An input endpoint ready to be bound as a pipeline's source.
///
/// Data sources carry their readable end directly. Media sources carry a
/// track descriptor that the host resolves to a readable at bind time.
pub struct SourceTrack<T> {
    kind: StreamKind,
    inner: SourceInner<T>,
}

impl<T> SourceTrack<T> {
    /// Creates a data source plus the writable end that feeds it.
    pub fn data(capacity: usize) -> (Writable<T>, SourceTrack<T>) {
        let (tx, rx) = stream::bounded(capacity);
        (tx, Self::from_readable(rx))
    }

    /// Wraps an existing readable end as a data source.
    pub fn from_readable(readable: Readable<T>) -> Self {
        Self {
            kind: StreamKind::Data,
            inner: SourceInner::Data(readable),
        }
    }

    /// Wraps a host media track as a source.
    pub fn media(track: MediaTrack) -> Self {
        Self {
            kind: track.kind.into(),
            inner: SourceInner::Media(track),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Splits the track into its kind and either the media descriptor or
    /// the data readable.
    pub(crate) fn into_parts(self) -> (StreamKind, SourceInner<T>) {
        (self.kind, self.inner)
    }
}

/// The consumable end of a bound pipeline.
///
/// Data outputs hold the readable the sink pump drives; media outputs are
/// consumed host-side and expose no readable here.
pub struct OutputTrack<T> {
    kind: StreamKind,
    consumer: Option<Readable<T>>,
}

impl<T> OutputTrack<T> {
    /// A data-style output wrapping the given readable end.
    pub fn new(kind: StreamKind, readable: Readable<T>) -> Self {
        Self {
            kind,
            consumer: Some(readable),
        }
    }

    /// A media output whose items the host consumes directly.
    pub fn media(kind: MediaKind) -> Self {
        Self {
            kind: kind.into(),
            consumer: None,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Pops one item without blocking. `None` when the output is empty,
    /// closed, or consumed host-side.
    pub fn try_recv(&self) -> Option<T> {
        self.consumer.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    /// Waits up to `timeout` for one item.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.consumer
            .as_ref()
            .and_then(|rx| rx.recv_timeout(timeout).ok())
    }

    /// Unwraps the readable end for direct iteration.
    pub fn into_readable(self) -> Option<Readable<T>> {
        self.consumer
    }
}
