//! Threaded engine: decoding on a dedicated OS thread.
//!
//! Each request gets its own worker thread so blocking token generation never
//! stalls the async runtime. The worker feeds cumulative snapshots into a
//! bounded channel; the consumer side is the request's [`SnapshotStream`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   bounded mpsc (snapshots)   ┌──────────────────┐
//! │ SnapshotStream│ <─────────────────────────── │  decode-worker    │
//! │ (async task)  │                              │  (OS thread)      │
//! │  DropGuard ───┼──── CancellationToken ─────> │  generator +      │
//! └──────────────┘                              │  tokenizer        │
//!                                               └──────────────────┘
//! ```
//!
//! # Stop Handling
//!
//! The worker decodes all generated tokens to text after each step and looks
//! for the configured stop strings. On a match the text is truncated at the
//! earliest stop, sent as the final snapshot, and the request finishes.
//! `max_tokens` bounds the number of steps.
//!
//! # Release
//!
//! Dropping the stream cancels the token and closes the channel; the worker
//! notices on its next step and exits.

use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use llama_engine::{
    DecodeSnapshot, DecodingEngine, EngineError, EngineResult, SamplingConfig, SnapshotStream, TokenId,
};
use llama_tokenizer::Tokenizer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Snapshots buffered between the worker and the consumer.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Produces the next token for a request. Runs on the worker thread.
pub trait TokenGenerator: Send + Sync {
    fn next_token(
        &self,
        prompt: &[TokenId],
        generated: &[TokenId],
        config: &SamplingConfig,
    ) -> EngineResult<TokenId>;
}

/// Echoes the prompt back token by token, then emits end-of-sequence.
#[derive(Debug, Clone, Copy)]
pub struct EchoGenerator {
    eos: TokenId,
}

impl EchoGenerator {
    pub fn new(eos: TokenId) -> Self {
        Self { eos }
    }
}

impl TokenGenerator for EchoGenerator {
    fn next_token(
        &self,
        prompt: &[TokenId],
        generated: &[TokenId],
        _config: &SamplingConfig,
    ) -> EngineResult<TokenId> {
        Ok(prompt.get(generated.len()).copied().unwrap_or(self.eos))
    }
}

/// Engine that runs a [`TokenGenerator`] on a worker thread per request.
pub struct ThreadedEngine {
    tokenizer: Arc<dyn Tokenizer>,
    generator: Arc<dyn TokenGenerator>,
    channel_capacity: usize,
}

impl ThreadedEngine {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, generator: Arc<dyn TokenGenerator>) -> Self {
        Self {
            tokenizer,
            generator,
            channel_capacity: SNAPSHOT_CHANNEL_CAPACITY,
        }
    }

    /// Echo engine over `tokenizer` (demo / smoke testing).
    pub fn echo(tokenizer: Arc<dyn Tokenizer>) -> Self {
        let eos = tokenizer.eos_token_id();
        Self::new(tokenizer, Arc::new(EchoGenerator::new(eos)))
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

#[async_trait]
impl DecodingEngine for ThreadedEngine {
    async fn open_request(
        &self,
        prompt: &str,
        config: &SamplingConfig,
        priority: i32,
    ) -> EngineResult<SnapshotStream> {
        if config.n != 1 || config.use_beam_search {
            return Err(EngineError::Request(format!(
                "unsupported candidate settings: n={}, beam_search={}",
                config.n, config.use_beam_search
            )));
        }
        let prompt_tokens = self
            .tokenizer
            .encode(prompt)
            .map_err(|e| EngineError::Tokenizer(e.to_string()))?;
        if prompt_tokens.is_empty() {
            return Err(EngineError::Request("empty prompt".to_string()));
        }

        let (tx, mut rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        let worker = DecodeWorker {
            prompt_tokens,
            config: config.clone(),
            tokenizer: Arc::clone(&self.tokenizer),
            generator: Arc::clone(&self.generator),
            tx,
            cancel: cancel.clone(),
        };

        thread::Builder::new()
            .name("decode-worker".into())
            .spawn(move || worker.run())
            .map_err(|e| EngineError::Inference(format!("failed to spawn decode worker: {e}")))?;

        tracing::debug!(priority, max_tokens = config.max_tokens, "decode worker started");

        let guard = cancel.drop_guard();
        let stream = async_stream::stream! {
            let _guard = guard;
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }
}

/// State owned by one worker thread.
struct DecodeWorker {
    prompt_tokens: Vec<TokenId>,
    config: SamplingConfig,
    tokenizer: Arc<dyn Tokenizer>,
    generator: Arc<dyn TokenGenerator>,
    tx: mpsc::Sender<EngineResult<DecodeSnapshot>>,
    cancel: CancellationToken,
}

impl DecodeWorker {
    fn run(self) {
        let mut generated = Vec::new();

        for _ in 0..self.config.max_tokens {
            if self.cancel.is_cancelled() {
                tracing::debug!(steps = generated.len(), "request cancelled; worker exiting");
                return;
            }

            let step = self
                .generator
                .next_token(&self.prompt_tokens, &generated, &self.config)
                .and_then(|token| {
                    generated.push(token);
                    self.tokenizer
                        .decode(&generated)
                        .map_err(|e| EngineError::Tokenizer(e.to_string()))
                });
            let text = match step {
                Ok(text) => text,
                Err(e) => {
                    let _ = self.tx.blocking_send(Err(e));
                    return;
                }
            };

            let (text, stopped) = match find_stop(&text, &self.config.stop) {
                Some(at) => (text[..at].to_string(), true),
                None => (text, false),
            };

            if self.tx.blocking_send(Ok(DecodeSnapshot::single(text))).is_err() {
                tracing::debug!(steps = generated.len(), "consumer dropped; worker exiting");
                return;
            }
            if stopped {
                tracing::debug!(steps = generated.len(), "stop sequence matched");
                return;
            }
        }
        tracing::debug!(steps = generated.len(), "max token budget reached");
    }
}

/// Byte offset of the earliest stop string in `text`, if any.
fn find_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}
