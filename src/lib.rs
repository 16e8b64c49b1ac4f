//! datapipe - Streaming stage pipelines with transparent thread offload.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod compose;
pub mod config;
pub mod error;
pub mod host;
pub mod id;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod stream;
pub mod track;
pub mod worker;

// Pipeline surface
pub use config::{ExecMode, PipelineConfig};
pub use error::{PipelineError, Result};
pub use id::PipelineId;
pub use pipeline::{BindOutcome, Pipeline};

// Stages and streams
pub use stage::{MapFn, StageOutput, StageSettings, StageSpec, Transform, TransformStage};
pub use stream::{Readable, Writable, bounded};
pub use track::{MediaKind, MediaTrack, OutputTrack, SourceTrack, StreamKind};

// Host integration
pub use host::{Capability, CapabilityNotifier, LogNotifier, MediaHost, NoMediaHost};

// Stage error reporting
pub use report::{ErrorReporter, LogReporter, StageError};

// Background execution contexts
pub use worker::{
    ContextProvider, Envelope, SpawnProvider, WorkerContext, WorkerSettings, acquire_context,
    default_providers, envelope_channel, run_worker,
};
