//! Host integration seam for media tracks.
//!
//! Media sources and sinks live outside the pipeline: a host resolves a
//! track descriptor into a readable stream, or hands out a writable end it
//! consumes itself. Environments without media support plug in
//! [`NoMediaHost`] and every media bind reports through the
//! [`CapabilityNotifier`] instead of failing the pipeline.

use crate::stream::{Readable, Writable};
use crate::track::{MediaKind, MediaTrack, OutputTrack};
use std::fmt;

/// A host media capability a bind can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Turning a media track into a readable item stream.
    MediaProcessor,
    /// Turning an item stream back into host-consumed media.
    MediaGenerator,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::MediaProcessor => "media processor",
            Capability::MediaGenerator => "media generator",
        };
        write!(f, "{name}")
    }
}

/// Receives capability-miss notifications.
///
/// Called at most once per failed bind; the pipeline itself stays usable.
pub trait CapabilityNotifier: Send + Sync {
    fn capability_unavailable(&self, capability: Capability);
}

/// Default notifier that records misses in the log.
pub struct LogNotifier;

impl CapabilityNotifier for LogNotifier {
    fn capability_unavailable(&self, capability: Capability) {
        tracing::warn!(capability = %capability, "host capability unavailable");
    }
}

/// Media integration provided by the embedding host.
pub trait MediaHost<T>: Send + Sync {
    /// Resolves a media track into a readable item stream, or `None` when
    /// the host cannot process this track.
    fn processor(&self, track: &MediaTrack) -> Option<Readable<T>>;

    /// Creates a host-consumed media output plus the writable end the
    /// pipeline drives, or `None` when the host cannot generate media.
    fn generator(&self, kind: MediaKind) -> Option<(OutputTrack<T>, Writable<T>)>;
}

/// Host with no media support at all. The default.
pub struct NoMediaHost;

impl<T> MediaHost<T> for NoMediaHost {
    fn processor(&self, _track: &MediaTrack) -> Option<Readable<T>> {
        None
    }

    fn generator(&self, _kind: MediaKind) -> Option<(OutputTrack<T>, Writable<T>)> {
        None
    }
}
