//! Stage descriptions, their canonical form, and the pump threads that run them.
//!
//! Callers may describe a stage three ways: an already-canonical
//! [`TransformStage`], a bare mapping function, or a [`StageSettings`] object.
//! [`StageSpec::normalize`] folds all three into the canonical form; the
//! wiring layer then materializes ports and spawns one pump thread per stage.

use crate::error::{PipelineError, Result};
use crate::report::{ErrorReporter, StageError};
use crate::stream::{Readable, Writable};
use std::sync::Arc;
use std::thread;

/// Boxed one-to-one mapping function, the simplest stage shape.
pub type MapFn<T> = Box<dyn FnMut(T) -> T + Send + 'static>;

/// A per-item transform running inside a stage pump.
///
/// Each input item may produce zero or more output items through `out`;
/// emitting blocks while the downstream buffer is full.
pub trait Transform<T>: Send + 'static {
    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(())` - item handled; anything emitted has been passed downstream
    /// - `Err(StageError::Recoverable)` - item skipped, stage keeps running
    /// - `Err(StageError::Fatal)` - stage pump shuts down
    fn apply(
        &mut self,
        item: T,
        out: &mut StageOutput<'_, T>,
    ) -> std::result::Result<(), StageError>;
}

/// Emitter handed to [`Transform::apply`] for pushing items downstream.
pub struct StageOutput<'a, T> {
    sink: &'a Writable<T>,
    disconnected: bool,
}

impl<'a, T> StageOutput<'a, T> {
    fn new(sink: &'a Writable<T>) -> Self {
        Self {
            sink,
            disconnected: false,
        }
    }

    /// Pushes one item downstream, blocking while the buffer is full.
    ///
    /// Once the downstream side is gone, further emits are discarded and
    /// the pump stops after the current item.
    pub fn emit(&mut self, item: T) {
        if self.disconnected {
            return;
        }
        if self.sink.send(item).is_err() {
            self.disconnected = true;
        }
    }

    /// Returns true once the downstream side has disconnected.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Canonical stage: a named transform plus an optional buffer override.
pub struct TransformStage<T> {
    name: String,
    capacity: Option<usize>,
    transform: Box<dyn Transform<T>>,
}

impl<T: Send + 'static> TransformStage<T> {
    /// Creates a stage from a transform implementation.
    pub fn new(name: impl Into<String>, transform: Box<dyn Transform<T>>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            transform,
        }
    }

    /// Creates a stage from a one-to-one mapping function.
    pub fn map(name: impl Into<String>, f: impl FnMut(T) -> T + Send + 'static) -> Self {
        Self::new(name, Box::new(MapTransform { f }))
    }

    /// Overrides the capacity of this stage's output buffer.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Returns the stage name used for bookkeeping and error reporting.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the output buffer override, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// Wraps a plain function so each input yields exactly one output.
struct MapTransform<F> {
    f: F,
}

impl<T, F> Transform<T> for MapTransform<F>
where
    F: FnMut(T) -> T + Send + 'static,
{
    fn apply(
        &mut self,
        item: T,
        out: &mut StageOutput<'_, T>,
    ) -> std::result::Result<(), StageError> {
        out.emit((self.f)(item));
        Ok(())
    }
}

/// Settings-object stage description: optional name and buffer capacity
/// around a mapping function.
pub struct StageSettings<T> {
    /// Stage name; defaults to `"stage"`.
    pub name: Option<String>,
    /// Output buffer capacity; defaults to the pipeline's stage buffer.
    pub capacity: Option<usize>,
    /// The mapping function. Settings without one are rejected at add time.
    pub function: Option<MapFn<T>>,
}

impl<T> Default for StageSettings<T> {
    fn default() -> Self {
        Self {
            name: None,
            capacity: None,
            function: None,
        }
    }
}

/// The stage description shapes accepted by [`Pipeline::add`].
///
/// [`Pipeline::add`]: crate::pipeline::Pipeline::add
pub enum StageSpec<T> {
    /// Already canonical; passes through normalization unchanged.
    Stage(TransformStage<T>),
    /// Bare mapping function.
    Map(MapFn<T>),
    /// Settings object carrying the function plus metadata.
    Settings(StageSettings<T>),
}

impl<T: Send + 'static> StageSpec<T> {
    /// Convenience constructor for the bare-function shape.
    pub fn map(f: impl FnMut(T) -> T + Send + 'static) -> Self {
        Self::Map(Box::new(f))
    }

    /// Folds any accepted shape into the canonical [`TransformStage`].
    ///
    /// Pure construction with no side effects; a settings object without a
    /// function is the one rejected input.
    pub fn normalize(self) -> Result<TransformStage<T>> {
        match self {
            StageSpec::Stage(stage) => Ok(stage),
            StageSpec::Map(f) => Ok(TransformStage::new("map", Box::new(MapTransform { f }))),
            StageSpec::Settings(settings) => {
                let f = settings.function.ok_or(PipelineError::MissingStageFunction)?;
                let name = settings.name.unwrap_or_else(|| "stage".to_string());
                let mut stage = TransformStage::new(name, Box::new(MapTransform { f }));
                stage.capacity = settings.capacity;
                Ok(stage)
            }
        }
    }
}

impl<T> From<TransformStage<T>> for StageSpec<T> {
    fn from(stage: TransformStage<T>) -> Self {
        Self::Stage(stage)
    }
}

/// Spawns a detached pump thread driving `stage` from `input` to `output`.
///
/// The pump exits when the upstream disconnects, the downstream goes away,
/// or the transform reports a fatal error.
pub(crate) fn spawn_transform_pump<T: Send + 'static>(
    stage: TransformStage<T>,
    input: Readable<T>,
    output: Writable<T>,
    reporter: Arc<dyn ErrorReporter>,
) {
    thread::spawn(move || run_pump(stage, input, output, reporter));
}

fn run_pump<T: Send + 'static>(
    mut stage: TransformStage<T>,
    input: Readable<T>,
    output: Writable<T>,
    reporter: Arc<dyn ErrorReporter>,
) {
    while let Ok(item) = input.recv() {
        let mut out = StageOutput::new(&output);
        match stage.transform.apply(item, &mut out) {
            Ok(()) => {
                if out.is_disconnected() {
                    // Downstream gone, shut down
                    break;
                }
            }
            Err(StageError::Recoverable(msg)) => {
                // Report but continue processing
                reporter.report(&stage.name, &StageError::Recoverable(msg));
            }
            Err(StageError::Fatal(msg)) => {
                // Report and shut down
                reporter.report(&stage.name, &StageError::Fatal(msg));
                break;
            }
        }
    }
    tracing::debug!(stage = stage.name.as_str(), "stage pump finished");
}

/// Spawns a detached pump that forwards items from `input` into `output`.
///
/// Used to drive the chain tail into a sink endpoint.
pub(crate) fn spawn_forward_pump<T: Send + 'static>(input: Readable<T>, output: Writable<T>) {
    thread::spawn(move || {
        while let Ok(item) = input.recv() {
            if output.send(item).is_err() {
                break;
            }
        }
        tracing::debug!("forward pump finished");
    });
}
