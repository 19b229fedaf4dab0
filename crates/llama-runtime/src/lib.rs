//! # llama-runtime
//!
//! Decoding engine implementations and telemetry for llama-predict.
//!
//! - [`ScriptedEngine`] replays canned snapshots and exposes an [`EngineProbe`]
//! - [`ThreadedEngine`] decodes on a dedicated thread per request, with
//!   engine-side stop matching and a max-token budget
//! - [`telemetry`] times streamed generations

pub mod scripted;
pub mod telemetry;
pub mod threaded;

pub use scripted::{EngineProbe, OpenedRequest, ScriptStep, ScriptedEngine};
pub use telemetry::{GenerationMetrics, GenerationTimer, LogTelemetry, NoopTelemetry, TelemetryHook};
pub use threaded::{EchoGenerator, ThreadedEngine, TokenGenerator};
