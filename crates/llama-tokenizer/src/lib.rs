//! # llama-tokenizer
//!
//! Tokenization capability for llama-predict.
//!
//! This crate provides:
//! - A `Tokenizer` trait for pluggable tokenization backends
//! - A reference whitespace tokenizer with Llama-style special tokens
//!
//! The streaming core only needs two things from a tokenizer: turning a token
//! ID back into text, and knowing the model's end-of-sequence ID. Engines that
//! decode on their own side also use `encode`.

use std::collections::HashMap;
use std::sync::RwLock;

/// Error type for tokenization operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizerError {
    #[error("Invalid token ID: {0}")]
    InvalidToken(i32),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("Decoding error: {0}")]
    DecodingError(String),
}

pub type TokenizerResult<T> = std::result::Result<T, TokenizerError>;

/// Core tokenizer trait. Implementations can be swapped without changing app code.
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token IDs.
    fn encode(&self, text: &str) -> TokenizerResult<Vec<i32>>;

    /// Decode a sequence of tokens into text.
    fn decode(&self, tokens: &[i32]) -> TokenizerResult<String>;

    /// The model's end-of-sequence token ID.
    fn eos_token_id(&self) -> i32;

    /// Get vocabulary size.
    fn vocab_size(&self) -> usize;

    /// Decode a single token into its textual form.
    fn decode_one(&self, token: i32) -> TokenizerResult<String> {
        self.decode(&[token])
    }
}

/// Unknown-word token (Llama convention).
pub const UNK_TOKEN: &str = "<unk>";
/// Beginning-of-sequence token (Llama convention).
pub const BOS_TOKEN: &str = "<s>";
/// End-of-sequence token (Llama convention).
pub const EOS_TOKEN: &str = "</s>";

/// Reference whitespace tokenizer.
///
/// - Splits on whitespace
/// - Reserves IDs 0/1/2 for `<unk>`, `<s>`, `</s>`
/// - Grows its vocabulary on encode; deterministic for a given input order
/// - Used by the threaded demo engine and by tests
pub struct WhitespaceTokenizer {
    state: RwLock<VocabState>,
    eos_id: i32,
}

#[derive(Debug, Default)]
struct VocabState {
    vocab: HashMap<i32, String>,
    reverse_vocab: HashMap<String, i32>,
    next_id: i32,
}

impl VocabState {
    fn intern(&mut self, word: &str) -> i32 {
        if let Some(id) = self.reverse_vocab.get(word) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.reverse_vocab.insert(word.to_string(), id);
        self.vocab.insert(id, word.to_string());
        id
    }
}

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        let mut state = VocabState::default();
        state.intern(UNK_TOKEN);
        state.intern(BOS_TOKEN);
        let eos_id = state.intern(EOS_TOKEN);
        Self {
            state: RwLock::new(state),
            eos_id,
        }
    }

    /// Look up the ID of an already-known word.
    pub fn token_id(&self, word: &str) -> Option<i32> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.reverse_vocab.get(word).copied())
    }

    fn decode_id(&self, token: i32) -> TokenizerResult<String> {
        let state = self
            .state
            .read()
            .map_err(|_| TokenizerError::DecodingError("tokenizer lock poisoned".to_string()))?;

        state
            .vocab
            .get(&token)
            .cloned()
            .ok_or(TokenizerError::InvalidToken(token))
    }
}

impl Default for WhitespaceTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> TokenizerResult<Vec<i32>> {
        let mut state = self
            .state
            .write()
            .map_err(|_| TokenizerError::EncodingError("tokenizer lock poisoned".to_string()))?;

        Ok(text.split_whitespace().map(|word| state.intern(word)).collect())
    }

    fn decode(&self, tokens: &[i32]) -> TokenizerResult<String> {
        let mut words = Vec::with_capacity(tokens.len());
        for &id in tokens {
            words.push(self.decode_id(id)?);
        }
        Ok(words.join(" "))
    }

    fn eos_token_id(&self) -> i32 {
        self.eos_id
    }

    fn vocab_size(&self) -> usize {
        self.state.read().map(|s| s.vocab.len()).unwrap_or(0)
    }
}
