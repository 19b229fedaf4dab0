//! Streaming text completion over a pluggable decoding engine.
//!
//! This crate re-exports the workspace crates under one roof:
//!
//! - [`engine`]: the `DecodingEngine` trait and its data model
//! - [`tokenizer`]: the `Tokenizer` trait and a whitespace tokenizer
//! - [`sampling`]: request validation and sampling-config construction
//! - [`stream`]: streaming sessions that turn snapshots into fragments
//! - [`runtime`]: scripted and threaded engines plus generation telemetry
//! - [`predictor`]: prompt templates and the `Predictor` front end
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use llama_predict::prelude::*;
//!
//! # async fn demo() -> Result<(), PredictError> {
//! let tokenizer: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer::new());
//! let engine = Arc::new(ThreadedEngine::echo(Arc::clone(&tokenizer)));
//! let predictor = Predictor::new(engine, tokenizer, PredictorConfig::default());
//!
//! let mut fragments = predictor.predict("Hello")?;
//! while let Some(fragment) = fragments.next().await {
//!     print!("{}", fragment?);
//! }
//! # Ok(())
//! # }
//! ```

pub use llama_cli as predictor;
pub use llama_engine as engine;
pub use llama_runtime as runtime;
pub use llama_sampling as sampling;
pub use llama_stream as stream;
pub use llama_tokenizer as tokenizer;

pub use llama_stream::generate;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use llama_cli::{PredictError, Predictor, PredictorConfig};
    pub use llama_engine::{
        CompletionOutput, DecodeSnapshot, DecodingEngine, EngineError, SamplingConfig, TopK,
    };
    pub use llama_runtime::{ScriptedEngine, ThreadedEngine};
    pub use llama_sampling::{GenerationRequest, SamplingError, StopSequences};
    pub use llama_stream::{generate, DeliveryMode, FragmentStream, StreamError, StreamingSession};
    pub use llama_tokenizer::{Tokenizer, WhitespaceTokenizer};
}
