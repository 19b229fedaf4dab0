//! # llama-stream
//!
//! Turns a one-shot "generate until stop" request into a cancellable,
//! incrementally observable stream of text fragments.
//!
//! ```text
//! GenerationRequest ──build──> SamplingConfig ──open_request──> engine
//!                                                                  │
//!        caller <── fragments <── StreamingSession <── snapshots ──┘
//! ```
//!
//! Sampling parameters are validated before the engine is touched; engine
//! errors show up while iterating, at the point where they happen.

pub mod error;
pub mod session;
pub mod state;

use std::sync::Arc;

use llama_engine::DecodingEngine;
use llama_sampling::{GenerationRequest, SamplingResult};
use llama_tokenizer::Tokenizer;

pub use error::StreamError;
pub use session::{DeliveryMode, FragmentStream, SessionPhase, StreamingSession, SESSION_PRIORITY};
pub use state::StreamState;

/// Validate `request`, build its sampling config, and start a session.
///
/// Parameter errors are returned here, before any engine interaction.
pub fn generate(
    engine: Arc<dyn DecodingEngine>,
    tokenizer: &dyn Tokenizer,
    request: &GenerationRequest,
) -> SamplingResult<FragmentStream> {
    let config = llama_sampling::build(request, tokenizer)?;
    let session = StreamingSession::new(engine, DeliveryMode::from_incremental(request.incremental));
    tracing::debug!(session = %session.id(), mode = ?session.mode(), "generation requested");
    Ok(session.stream(request.prompt.clone(), config))
}
