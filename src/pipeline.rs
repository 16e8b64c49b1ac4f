//! The pipeline aggregate: identity, stage bookkeeping, endpoint binding,
//! and the local-or-threaded execution dispatch.

use crate::compose::{self, BoundEndpoints};
use crate::config::{ExecMode, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::host::{Capability, CapabilityNotifier, LogNotifier, MediaHost, NoMediaHost};
use crate::id::PipelineId;
use crate::report::{ErrorReporter, LogReporter};
use crate::stage::{StageSpec, TransformStage};
use crate::stream::{self, Readable, Writable};
use crate::track::{OutputTrack, SourceInner, SourceTrack, StreamKind};
use crate::worker::{self, ContextProvider, Envelope, WorkerContext, WorkerSettings};
use std::sync::Arc;

/// Result of an endpoint bind attempt.
///
/// `CapabilityUnavailable` is not an error: the pipeline stays usable and
/// the bind may be retried with a different endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The endpoint is wired into the chain.
    Bound,
    /// A media endpoint needed a host capability that is missing; nothing
    /// was bound and the notifier has been told.
    CapabilityUnavailable,
}

/// A linear chain of transform stages with one source and one sink.
///
/// Stages append in call order and never leave. In `Local` mode every
/// append wires the stage onto the chain tail right here; in `Threaded`
/// mode the stage moves into a background worker context and the caller
/// side keeps only names and flags. Which mode a pipeline runs in is fixed
/// at construction.
pub struct Pipeline<T: Send + 'static> {
    id: PipelineId,
    config: PipelineConfig,
    mode: ExecMode,
    stages: Vec<String>,
    bound: BoundEndpoints<T>,
    has_source: bool,
    has_sink: bool,
    kind: Option<StreamKind>,
    output: Option<OutputTrack<T>>,
    worker: Option<WorkerContext<T>>,
    context_error: Option<PipelineError>,
    host: Arc<dyn MediaHost<T>>,
    notifier: Arc<dyn CapabilityNotifier>,
    reporter: Arc<dyn ErrorReporter>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Creates a pipeline, acquiring a background context through the
    /// default provider chain when the config asks for `Threaded` mode.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_context_providers(config, &worker::default_providers())
    }

    /// Creates a pipeline with an explicit context acquisition chain.
    ///
    /// When every provider fails the error is kept on the pipeline: with
    /// `fallback_to_local` set the chain composes locally instead, otherwise
    /// the pipeline stays in `Threaded` mode with no context and endpoint
    /// payloads are dropped at bind time.
    pub fn with_context_providers(
        config: PipelineConfig,
        providers: &[Box<dyn ContextProvider<T>>],
    ) -> Self {
        let id = PipelineId::generate();
        let mut mode = config.mode;
        let mut worker = None;
        let mut context_error = None;

        if mode == ExecMode::Threaded {
            let settings = WorkerSettings {
                stage_buffer: config.stage_buffer,
            };
            match worker::acquire_context(providers, &settings) {
                Ok(context) => worker = Some(context),
                Err(error) => {
                    tracing::error!(pipeline = %id, error = %error, "no background context");
                    if config.fallback_to_local {
                        tracing::warn!(pipeline = %id, "falling back to local execution");
                        mode = ExecMode::Local;
                    }
                    context_error = Some(error);
                }
            }
        }

        tracing::debug!(pipeline = %id, mode = ?mode, "pipeline created");

        Self {
            id,
            config,
            mode,
            stages: Vec::new(),
            bound: BoundEndpoints::new(),
            has_source: false,
            has_sink: false,
            kind: None,
            output: None,
            worker,
            context_error,
            host: Arc::new(NoMediaHost),
            notifier: Arc::new(LogNotifier),
            reporter: Arc::new(LogReporter),
        }
    }

    /// Sets the host integration used to resolve media endpoints.
    pub fn with_media_host(mut self, host: Arc<dyn MediaHost<T>>) -> Self {
        self.host = host;
        self
    }

    /// Sets the notifier told about missing host capabilities.
    pub fn with_notifier(mut self, notifier: Arc<dyn CapabilityNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets the reporter stage pumps hand their errors to.
    ///
    /// Applies to stages composed locally. An already-acquired worker
    /// context keeps the reporter its provider installed.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Binds the pipeline's source endpoint.
    ///
    /// The pipeline takes the track's kind either way. Media tracks resolve
    /// through the host first; a missing processor capability returns
    /// `CapabilityUnavailable` and leaves the source unbound so a later
    /// attempt can still succeed. Binding twice is an error.
    pub fn set_source(&mut self, source: SourceTrack<T>) -> Result<BindOutcome> {
        if self.has_source {
            return Err(PipelineError::SourceAlreadyBound);
        }

        let (kind, inner) = source.into_parts();
        self.kind = Some(kind);

        let readable = match inner {
            SourceInner::Media(track) => match self.host.processor(&track) {
                Some(readable) => readable,
                None => {
                    self.notifier
                        .capability_unavailable(Capability::MediaProcessor);
                    return Ok(BindOutcome::CapabilityUnavailable);
                }
            },
            SourceInner::Data(readable) => readable,
        };

        self.has_source = true;
        self.dispatch_source(readable);
        tracing::debug!(pipeline = %self.id, kind = %kind, "source bound");
        Ok(BindOutcome::Bound)
    }

    /// Binds the sink using the pipeline's current kind, defaulting to
    /// `Data` when no source has fixed one.
    pub fn set_sink(&mut self) -> Result<BindOutcome> {
        self.set_sink_kind(self.kind.unwrap_or(StreamKind::Data))
    }

    /// Binds the sink for an explicit kind.
    ///
    /// Media kinds resolve through the host's generator; data kinds create
    /// the output channel directly. On success the output handle becomes
    /// available. Binding twice is an error; the pipeline's kind is not
    /// changed by the sink.
    pub fn set_sink_kind(&mut self, kind: StreamKind) -> Result<BindOutcome> {
        if self.has_sink {
            return Err(PipelineError::SinkAlreadyBound);
        }

        let (output, writable) = match kind.media_kind() {
            Some(media) => match self.host.generator(media) {
                Some(pair) => pair,
                None => {
                    self.notifier
                        .capability_unavailable(Capability::MediaGenerator);
                    return Ok(BindOutcome::CapabilityUnavailable);
                }
            },
            None => {
                let (tx, rx) = stream::bounded(self.config.sink_buffer);
                (OutputTrack::new(kind, rx), tx)
            }
        };

        self.output = Some(output);
        self.has_sink = true;
        self.dispatch_sink(writable);
        tracing::debug!(pipeline = %self.id, kind = %kind, "sink bound");
        Ok(BindOutcome::Bound)
    }

    /// Appends a stage to the chain.
    ///
    /// The spec normalizes first; a spec with no transform function fails
    /// without touching the pipeline. A successful append registers the
    /// stage name exactly once and wires (or relays) the transform.
    pub fn add(&mut self, spec: StageSpec<T>) -> Result<()> {
        let stage = spec.normalize()?;
        tracing::debug!(pipeline = %self.id, stage = stage.name(), "stage appended");
        self.stages.push(stage.name().to_string());
        self.dispatch_stage(stage);
        Ok(())
    }

    fn dispatch_source(&mut self, readable: Readable<T>) {
        match self.mode {
            ExecMode::Local => compose::add_source(readable, &mut self.bound),
            ExecMode::Threaded => match &self.worker {
                Some(context) => context.relay(Envelope::Source(readable)),
                None => {
                    tracing::warn!(
                        pipeline = %self.id,
                        "no background context; source endpoint dropped"
                    );
                }
            },
        }
    }

    fn dispatch_sink(&mut self, writable: Writable<T>) {
        match self.mode {
            ExecMode::Local => compose::add_sink(writable, &mut self.bound),
            ExecMode::Threaded => match &self.worker {
                Some(context) => context.relay(Envelope::Sink(writable)),
                None => {
                    tracing::warn!(
                        pipeline = %self.id,
                        "no background context; sink endpoint dropped"
                    );
                }
            },
        }
    }

    fn dispatch_stage(&mut self, stage: TransformStage<T>) {
        match self.mode {
            ExecMode::Local => compose::add_transform(
                stage,
                &mut self.bound,
                self.config.stage_buffer,
                self.reporter.clone(),
            ),
            ExecMode::Threaded => match &self.worker {
                Some(context) => context.relay(Envelope::Add(stage)),
                None => {
                    tracing::warn!(pipeline = %self.id, "no background context; stage dropped");
                }
            },
        }
    }

    pub fn id(&self) -> &PipelineId {
        &self.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The mode this pipeline actually runs in, after any fallback.
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// The kind fixed by the source, if one has been offered.
    pub fn kind(&self) -> Option<StreamKind> {
        self.kind
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> &[String] {
        &self.stages
    }

    /// Number of endpoints wired in the caller's context. Always zero in
    /// `Threaded` mode, where the worker owns the chain.
    pub fn bound_len(&self) -> usize {
        self.bound.len()
    }

    pub fn has_source(&self) -> bool {
        self.has_source
    }

    pub fn has_sink(&self) -> bool {
        self.has_sink
    }

    pub fn output(&self) -> Option<&OutputTrack<T>> {
        self.output.as_ref()
    }

    /// Takes the output handle, leaving the pipeline without one.
    pub fn take_output(&mut self) -> Option<OutputTrack<T>> {
        self.output.take()
    }

    /// The acquisition failure kept from construction, when every context
    /// provider declined.
    pub fn context_error(&self) -> Option<&PipelineError> {
        self.context_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{MediaKind, MediaTrack};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingNotifier {
        count: AtomicUsize,
    }

    impl CountingNotifier {
        fn new() -> Self {
            Self {
                count: AtomicUsize::new(0),
            }
        }
    }

    impl CapabilityNotifier for CountingNotifier {
        fn capability_unavailable(&self, _capability: Capability) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn local_config() -> PipelineConfig {
        PipelineConfig {
            mode: ExecMode::Local,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_pipeline_starts_empty() {
        let pipeline: Pipeline<i64> = Pipeline::new(local_config());

        assert_eq!(pipeline.stage_count(), 0);
        assert_eq!(pipeline.bound_len(), 0);
        assert!(!pipeline.has_source());
        assert!(!pipeline.has_sink());
        assert!(pipeline.kind().is_none());
        assert!(pipeline.output().is_none());
        assert!(pipeline.context_error().is_none());
    }

    #[test]
    fn test_threaded_pipeline_acquires_default_context() {
        let pipeline: Pipeline<i64> = Pipeline::new(PipelineConfig::default());

        assert_eq!(pipeline.mode(), ExecMode::Threaded);
        assert!(pipeline.context_error().is_none());
    }

    #[test]
    fn test_local_chain_end_to_end() {
        let mut pipeline = Pipeline::new(local_config());
        let (feeder, track) = SourceTrack::data(4);

        assert_eq!(pipeline.set_source(track).unwrap(), BindOutcome::Bound);
        pipeline.add(StageSpec::map(|n: i64| n + 1)).unwrap();
        pipeline.add(StageSpec::map(|n: i64| n * 2)).unwrap();
        assert_eq!(pipeline.set_sink().unwrap(), BindOutcome::Bound);

        // Source plus one outlet per stage
        assert_eq!(pipeline.bound_len(), 3);
        assert_eq!(pipeline.kind(), Some(StreamKind::Data));

        let output = pipeline.take_output().unwrap();
        feeder.send(5).unwrap();
        assert_eq!(output.recv_timeout(Duration::from_secs(2)), Some(12));
    }

    #[test]
    fn test_add_registers_each_stage_name_once() {
        let mut pipeline: Pipeline<i64> = Pipeline::new(local_config());

        pipeline.add(StageSpec::map(|n| n)).unwrap();
        pipeline
            .add(StageSpec::from(TransformStage::map("scale", |n: i64| n * 3)))
            .unwrap();

        assert_eq!(pipeline.stage_count(), 2);
        assert_eq!(pipeline.stage_names(), ["map", "scale"]);
    }

    #[test]
    fn test_add_rejects_spec_without_function() {
        let mut pipeline: Pipeline<i64> = Pipeline::new(local_config());

        let result = pipeline.add(StageSpec::Settings(Default::default()));

        assert!(matches!(result, Err(PipelineError::MissingStageFunction)));
        assert_eq!(pipeline.stage_count(), 0);
    }

    #[test]
    fn test_second_source_is_rejected() {
        let mut pipeline: Pipeline<i64> = Pipeline::new(local_config());
        let (_feeder, track) = SourceTrack::data(4);
        pipeline.set_source(track).unwrap();

        let (_feeder2, track2) = SourceTrack::data(4);
        let result = pipeline.set_source(track2);

        assert!(matches!(result, Err(PipelineError::SourceAlreadyBound)));
    }

    #[test]
    fn test_second_sink_is_rejected() {
        let mut pipeline: Pipeline<i64> = Pipeline::new(local_config());
        pipeline.set_sink().unwrap();

        let result = pipeline.set_sink();

        assert!(matches!(result, Err(PipelineError::SinkAlreadyBound)));
    }

    #[test]
    fn test_media_source_without_capability_reports_once() {
        let notifier = Arc::new(CountingNotifier::new());
        let mut pipeline: Pipeline<i64> =
            Pipeline::new(local_config()).with_notifier(notifier.clone());

        let source = SourceTrack::media(MediaTrack::new(MediaKind::Audio, "mic"));
        let outcome = pipeline.set_source(source).unwrap();

        assert_eq!(outcome, BindOutcome::CapabilityUnavailable);
        assert_eq!(notifier.count.load(Ordering::SeqCst), 1);
        // Kind is taken from the offered track even though nothing bound
        assert_eq!(pipeline.kind(), Some(StreamKind::Audio));
        assert!(!pipeline.has_source());
    }

    #[test]
    fn test_media_sink_without_capability_reports_once() {
        let notifier = Arc::new(CountingNotifier::new());
        let mut pipeline: Pipeline<i64> =
            Pipeline::new(local_config()).with_notifier(notifier.clone());

        let outcome = pipeline.set_sink_kind(StreamKind::Video).unwrap();

        assert_eq!(outcome, BindOutcome::CapabilityUnavailable);
        assert_eq!(notifier.count.load(Ordering::SeqCst), 1);
        assert!(!pipeline.has_sink());
        assert!(pipeline.output().is_none());
        // The sink never fixes the pipeline's kind
        assert!(pipeline.kind().is_none());
    }

    #[test]
    fn test_take_output_consumes_the_handle() {
        let mut pipeline: Pipeline<i64> = Pipeline::new(local_config());
        pipeline.set_sink().unwrap();

        assert!(pipeline.output().is_some());
        assert!(pipeline.take_output().is_some());
        assert!(pipeline.output().is_none());
        assert!(pipeline.take_output().is_none());
    }

    #[test]
    fn test_sink_kind_defaults_to_data_without_source() {
        let mut pipeline: Pipeline<i64> = Pipeline::new(local_config());
        pipeline.set_sink().unwrap();

        let output = pipeline.take_output().unwrap();
        assert_eq!(output.kind(), StreamKind::Data);
    }
}
