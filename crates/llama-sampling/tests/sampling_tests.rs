//! Integration tests for llama-sampling.
//!
//! Validates:
//! - Build determinism (same request + same tokenizer => same config)
//! - End-of-sequence text is always part of the resolved stop set
//! - Top-k disabled mapping vs pass-through
//! - Stop resolution order: literals first, then decoded stop tokens, then EOS
//! - JSON requests with string-or-list stop sequences

use llama_engine::TopK;
use llama_sampling::*;
use llama_tokenizer::{Tokenizer, TokenizerError, TokenizerResult};
use std::collections::HashMap;
use std::num::NonZeroU32;

// ---------------------------------------------------------------------------
// Fixed-table tokenizer
// ---------------------------------------------------------------------------

/// Tokenizer with a fixed ID -> text table and a configurable EOS.
struct TableTokenizer {
    table: HashMap<i32, &'static str>,
    eos: i32,
}

impl TableTokenizer {
    fn new(eos: i32, entries: &[(i32, &'static str)]) -> Self {
        Self {
            table: entries.iter().copied().collect(),
            eos,
        }
    }
}

impl Tokenizer for TableTokenizer {
    fn encode(&self, _text: &str) -> TokenizerResult<Vec<i32>> {
        Err(TokenizerError::EncodingError("table tokenizer cannot encode".into()))
    }

    fn decode(&self, tokens: &[i32]) -> TokenizerResult<String> {
        tokens
            .iter()
            .map(|id| {
                self.table
                    .get(id)
                    .map(|s| s.to_string())
                    .ok_or(TokenizerError::InvalidToken(*id))
            })
            .collect()
    }

    fn eos_token_id(&self) -> i32 {
        self.eos
    }

    fn vocab_size(&self) -> usize {
        self.table.len()
    }
}

fn llama_table() -> TableTokenizer {
    TableTokenizer::new(2, &[(2, "</s>"), (7, "END"), (9, "<|im_end|>")])
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn build_is_deterministic() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello")
        .with_stop_sequences(vec!["x".to_string(), "y".to_string()])
        .with_stop_token_ids(vec![7, 9])
        .with_top_k(Some(12));
    let a = build(&req, &tok).unwrap();
    let b = build(&req, &tok).unwrap();
    assert_eq!(a, b);
}

#[test]
fn eos_text_present_without_any_stops() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello")
        .with_stop_sequences(StopSequences::None)
        .with_stop_token_ids(vec![]);
    let cfg = build(&req, &tok).unwrap();
    assert_eq!(cfg.stop, vec!["</s>"]);
}

#[test]
fn top_k_zero_or_unset_is_disabled_sentinel() {
    let tok = llama_table();
    for top_k in [None, Some(0)] {
        let req = GenerationRequest::new("Hello")
            .with_top_k(top_k)
            .with_temperature(1.3)
            .with_top_p(0.5);
        let cfg = build(&req, &tok).unwrap();
        assert_eq!(cfg.top_k, TopK::Disabled);
        assert_eq!(cfg.top_k.as_engine_value(), Ok(-1));
    }
}

#[test]
fn positive_top_k_passes_through() {
    let tok = llama_table();
    for k in [1, 50, 1000] {
        let cfg = build(&GenerationRequest::new("Hello").with_top_k(Some(k)), &tok).unwrap();
        assert_eq!(cfg.top_k, TopK::Limit(NonZeroU32::new(k as u32).unwrap()));
        assert_eq!(cfg.top_k.as_engine_value(), Ok(k));
    }
}

#[test]
fn negative_top_k_rejected() {
    let tok = llama_table();
    let err = build(&GenerationRequest::new("Hello").with_top_k(Some(-7)), &tok).unwrap_err();
    assert!(matches!(err, SamplingError::InvalidParameter { name: "top_k", .. }));
}

#[test]
fn single_stop_string_with_stop_token_and_eos() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello")
        .with_stop_sequences("STOP")
        .with_stop_token_ids(vec![7]);
    let cfg = build(&req, &tok).unwrap();
    assert_eq!(cfg.stop, vec!["STOP", "END", "</s>"]);
}

#[test]
fn stop_list_kept_in_order_before_decoded_tokens() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello")
        .with_stop_sequences(vec!["b".to_string(), "a".to_string()])
        .with_stop_token_ids(vec![9, 7]);
    let cfg = build(&req, &tok).unwrap();
    assert_eq!(cfg.stop, vec!["b", "a", "<|im_end|>", "END", "</s>"]);
}

#[test]
fn empty_stop_string_contributes_nothing() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello").with_stop_sequences("");
    let cfg = build(&req, &tok).unwrap();
    assert_eq!(cfg.stop, vec!["</s>"]);
}

#[test]
fn eos_in_caller_stop_ids_is_tolerated_as_duplicate() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello").with_stop_token_ids(vec![2]);
    let cfg = build(&req, &tok).unwrap();
    assert_eq!(cfg.stop, vec!["</s>", "</s>"]);
}

#[test]
fn config_copies_request_controls() {
    let tok = llama_table();
    let req = GenerationRequest::new("Hello")
        .with_max_new_tokens(5)
        .with_top_p(0.9)
        .with_top_k(Some(50))
        .with_temperature(0.6)
        .with_frequency_penalty(0.2)
        .with_presence_penalty(1.15);
    let cfg = build(&req, &tok).unwrap();
    assert_eq!(cfg.max_tokens, 5);
    assert_eq!(cfg.top_p, 0.9);
    assert_eq!(cfg.temperature, 0.6);
    assert_eq!(cfg.frequency_penalty, 0.2);
    assert_eq!(cfg.presence_penalty, 1.15);
}

// ---------------------------------------------------------------------------
// JSON requests
// ---------------------------------------------------------------------------

#[test]
fn request_from_json_with_single_stop_string() {
    let json = r#"{
        "prompt": "Hello",
        "max_new_tokens": 5,
        "top_k": 0,
        "stop_sequences": "STOP",
        "stop_token_ids": [7],
        "incremental": false
    }"#;
    let req: GenerationRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.stop_sequences, StopSequences::Single("STOP".into()));
    assert_eq!(req.top_k, Some(0));
    assert!(!req.incremental);
    // Unspecified fields fall back to defaults.
    assert_eq!(req.top_p, defaults::TOP_P);

    let cfg = build(&req, &llama_table()).unwrap();
    assert_eq!(cfg.stop, vec!["STOP", "END", "</s>"]);
    assert!(cfg.top_k.is_disabled());
}

#[test]
fn request_from_json_with_stop_list_and_null() {
    let req: GenerationRequest =
        serde_json::from_str(r#"{"prompt": "x", "stop_sequences": ["a", "b"]}"#).unwrap();
    assert_eq!(
        req.stop_sequences,
        StopSequences::Many(vec!["a".into(), "b".into()])
    );

    let req: GenerationRequest =
        serde_json::from_str(r#"{"prompt": "x", "stop_sequences": null, "top_k": null}"#).unwrap();
    assert_eq!(req.stop_sequences, StopSequences::None);
    assert_eq!(req.top_k, None);
}

#[test]
fn request_without_top_k_has_no_cutoff() {
    let json = r#"{"prompt": "Hello", "max_new_tokens": 5, "top_p": 0.9, "temperature": 0.6}"#;
    let req: GenerationRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.top_k, None);
    let cfg = build(&req, &llama_table()).unwrap();
    assert_eq!(cfg.top_k, TopK::Disabled);
    assert_eq!(cfg.top_k.as_engine_value(), Ok(-1));

    let cfg = build(&GenerationRequest::new("Hello"), &llama_table()).unwrap();
    assert_eq!(cfg.top_k, TopK::Disabled);
}
