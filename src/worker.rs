//! Background execution context: acquisition, the relay envelope, and the
//! worker body.
//!
//! A threaded pipeline relocates its whole chain into a worker context it
//! obtains by walking an ordered list of [`ContextProvider`]s. Every later
//! stage addition and endpoint binding is then relayed as an [`Envelope`]
//! over an unbounded channel: one-directional and fire-and-forget, with
//! ownership of the payload moving into the envelope. The worker services
//! envelopes with the same wiring operations local mode uses.

use crate::compose::{self, BoundEndpoints};
use crate::error::{PipelineError, Result};
use crate::report::{ErrorReporter, LogReporter};
use crate::stage::TransformStage;
use crate::stream::{Readable, Writable};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Name given to the dedicated worker thread.
const WORKER_THREAD_NAME: &str = "datapipe-worker";

/// Command envelope relayed into the worker context.
///
/// Payloads are moved in; the sender retains nothing usable.
pub enum Envelope<T> {
    /// Bind this readable endpoint as the chain's source.
    Source(Readable<T>),
    /// Drive the chain tail into this writable endpoint.
    Sink(Writable<T>),
    /// Wire a stage onto the chain tail.
    Add(TransformStage<T>),
}

impl<T> Envelope<T> {
    /// Returns the command name for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Envelope::Source(_) => "source",
            Envelope::Sink(_) => "sink",
            Envelope::Add(_) => "add",
        }
    }
}

/// Settings a provider needs to stand up a worker context.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Default capacity for the buffers the worker creates between stages.
    pub stage_buffer: usize,
}

/// Handle to an acquired background context.
#[derive(Debug)]
pub struct WorkerContext<T> {
    envelope_tx: Sender<Envelope<T>>,
    /// Worker thread handle, when the provider owns one. Dropping it
    /// detaches the thread; the worker loop ends once the envelope
    /// channel closes.
    handle: Option<JoinHandle<()>>,
}

impl<T> WorkerContext<T> {
    /// Creates a context handle around an envelope channel.
    pub fn new(envelope_tx: Sender<Envelope<T>>) -> Self {
        Self {
            envelope_tx,
            handle: None,
        }
    }

    /// Attaches the worker thread handle.
    pub fn with_thread(mut self, handle: JoinHandle<()>) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Returns true while the worker thread (if any) is still running.
    pub fn is_alive(&self) -> bool {
        match &self.handle {
            Some(handle) => !handle.is_finished(),
            None => true,
        }
    }

    /// Relays an envelope into the worker context, fire-and-forget.
    ///
    /// There is no acknowledgment; a dead context only shows up as a
    /// dropped payload in the log.
    pub(crate) fn relay(&self, envelope: Envelope<T>) {
        let label = envelope.label();
        if self.envelope_tx.send(envelope).is_err() {
            tracing::warn!(command = label, "background context gone; envelope dropped");
        }
    }
}

/// Acquisition strategy for a background worker context.
///
/// Strategies are tried in order; each failure is absorbed and the next
/// provider gets its chance.
pub trait ContextProvider<T: Send + 'static> {
    /// Short strategy name used in logs and the exhaustion error.
    fn name(&self) -> &'static str;

    /// Attempts to stand up a worker context.
    fn acquire(&self, settings: &WorkerSettings) -> Result<WorkerContext<T>>;
}

/// Provider that spawns the worker body on a fresh thread.
pub struct SpawnProvider {
    thread_name: Option<String>,
}

impl SpawnProvider {
    /// Worker on a thread with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            thread_name: Some(name.into()),
        }
    }

    /// Zero-configuration second chance: the same worker body on an
    /// unnamed thread.
    pub fn bundled() -> Self {
        Self { thread_name: None }
    }
}

impl<T: Send + 'static> ContextProvider<T> for SpawnProvider {
    fn name(&self) -> &'static str {
        if self.thread_name.is_some() {
            "dedicated-thread"
        } else {
            "bundled-thread"
        }
    }

    fn acquire(&self, settings: &WorkerSettings) -> Result<WorkerContext<T>> {
        let (envelope_tx, envelope_rx) = envelope_channel();
        let stage_buffer = settings.stage_buffer;

        let mut builder = thread::Builder::new();
        if let Some(name) = &self.thread_name {
            builder = builder.name(name.clone());
        }
        let handle =
            builder.spawn(move || run_worker(envelope_rx, stage_buffer, Arc::new(LogReporter)))?;

        Ok(WorkerContext::new(envelope_tx).with_thread(handle))
    }
}

/// Creates the unbounded envelope channel a custom provider wires between
/// the caller side and its worker body.
pub fn envelope_channel<T>() -> (Sender<Envelope<T>>, Receiver<Envelope<T>>) {
    unbounded()
}

/// The default acquisition chain: a named worker thread, then a bare spawn.
pub fn default_providers<T: Send + 'static>() -> Vec<Box<dyn ContextProvider<T>>> {
    vec![
        Box::new(SpawnProvider::named(WORKER_THREAD_NAME)),
        Box::new(SpawnProvider::bundled()),
    ]
}

/// Walks the provider list and returns the first context acquired.
///
/// Exhausting the list yields a single typed error naming every attempt.
pub fn acquire_context<T: Send + 'static>(
    providers: &[Box<dyn ContextProvider<T>>],
    settings: &WorkerSettings,
) -> Result<WorkerContext<T>> {
    let mut attempts = Vec::new();

    for provider in providers {
        match provider.acquire(settings) {
            Ok(context) => {
                tracing::debug!(provider = provider.name(), "background context acquired");
                return Ok(context);
            }
            Err(error) => {
                tracing::debug!(
                    provider = provider.name(),
                    error = %error,
                    "context provider failed"
                );
                attempts.push(format!("{}: {}", provider.name(), error));
            }
        }
    }

    if attempts.is_empty() {
        attempts.push("no providers configured".to_string());
    }
    Err(PipelineError::ContextUnavailable {
        attempts: attempts.join("; "),
    })
}

/// Worker body: owns the relocated chain and services envelopes until the
/// channel closes.
///
/// Public so callers managing their own context can run the same entry
/// point the built-in providers use.
pub fn run_worker<T: Send + 'static>(
    envelopes: Receiver<Envelope<T>>,
    stage_buffer: usize,
    reporter: Arc<dyn ErrorReporter>,
) {
    tracing::debug!("worker context started");
    let mut bound = BoundEndpoints::new();

    while let Ok(envelope) = envelopes.recv() {
        tracing::debug!(command = envelope.label(), "servicing envelope");
        match envelope {
            Envelope::Source(readable) => compose::add_source(readable, &mut bound),
            Envelope::Add(transform) => {
                compose::add_transform(transform, &mut bound, stage_buffer, reporter.clone());
            }
            Envelope::Sink(writable) => compose::add_sink(writable, &mut bound),
        }
    }

    tracing::debug!("worker context finished");
}
