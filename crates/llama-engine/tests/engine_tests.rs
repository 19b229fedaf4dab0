//! Integration tests for llama-engine core trait and types.
//!
//! Validates:
//! - DecodingEngine can be implemented by mock backends
//! - Trait objects work for dynamic dispatch (the "narrow waist" pattern)
//! - Snapshot streams are lazy and carry cumulative text
//! - Core types satisfy required trait bounds (Send, Sync, Clone, etc.)
//! - SamplingConfig serializes top_k with the engine sentinel

use futures::StreamExt;
use llama_engine::*;
use std::num::NonZeroU32;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Mock Backends
// ---------------------------------------------------------------------------

/// Emits the prompt one character at a time as growing snapshots.
struct SpellingEngine;

#[async_trait::async_trait]
impl DecodingEngine for SpellingEngine {
    async fn open_request(
        &self,
        prompt: &str,
        config: &SamplingConfig,
        _priority: i32,
    ) -> EngineResult<SnapshotStream> {
        let text: String = prompt.chars().take(config.max_tokens).collect();
        let stream = async_stream::stream! {
            let mut so_far = String::new();
            for c in text.chars() {
                so_far.push(c);
                yield Ok(DecodeSnapshot::single(so_far.clone()));
            }
        };
        Ok(Box::pin(stream))
    }
}

/// A failing backend that rejects every request.
struct FailingEngine;

#[async_trait::async_trait]
impl DecodingEngine for FailingEngine {
    async fn open_request(
        &self,
        _prompt: &str,
        _config: &SamplingConfig,
        _priority: i32,
    ) -> EngineResult<SnapshotStream> {
        Err(EngineError::Request("no model loaded".to_string()))
    }
}

fn config(max_tokens: usize) -> SamplingConfig {
    SamplingConfig {
        n: 1,
        top_p: 0.9,
        top_k: TopK::Limit(NonZeroU32::new(50).unwrap()),
        temperature: 0.6,
        use_beam_search: false,
        stop: vec!["</s>".to_string()],
        max_tokens,
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Trait Implementation Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spelling_engine_emits_cumulative_snapshots() {
    let engine = SpellingEngine;
    let stream = engine.open_request("abc", &config(16), 0).await.unwrap();
    let texts: Vec<String> = stream
        .map(|snap| snap.unwrap().outputs[0].text.clone())
        .collect()
        .await;
    assert_eq!(texts, vec!["a", "ab", "abc"]);
}

#[tokio::test]
async fn spelling_engine_respects_max_tokens() {
    let engine = SpellingEngine;
    let stream = engine.open_request("abcdef", &config(2), 0).await.unwrap();
    let count = stream.count().await;
    assert_eq!(count, 2);
}

#[tokio::test]
async fn failing_engine_rejects_request() {
    let engine = FailingEngine;
    let err = match engine.open_request("hi", &config(4), 0).await {
        Ok(_) => panic!("expected request error"),
        Err(e) => e,
    };
    assert!(matches!(err, EngineError::Request(_)));
}

#[tokio::test]
async fn engines_work_as_trait_objects() {
    let engines: Vec<Arc<dyn DecodingEngine>> = vec![Arc::new(SpellingEngine), Arc::new(FailingEngine)];
    let mut opened = 0;
    for engine in &engines {
        if engine.open_request("x", &config(1), 0).await.is_ok() {
            opened += 1;
        }
    }
    assert_eq!(opened, 1);
}

// ---------------------------------------------------------------------------
// Type Bound Tests
// ---------------------------------------------------------------------------

#[test]
fn core_types_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SamplingConfig>();
    assert_send_sync::<DecodeSnapshot>();
    assert_send_sync::<EngineError>();
    assert_send_sync::<Arc<dyn DecodingEngine>>();
}

#[test]
fn snapshot_stream_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<SnapshotStream>();
}

#[test]
fn sampling_config_serializes_engine_top_k() {
    let mut cfg = config(8);
    cfg.top_k = TopK::Disabled;
    let json = serde_json::to_value(&cfg).unwrap();
    assert_eq!(json["top_k"], -1);
    assert_eq!(json["n"], 1);
    assert_eq!(json["use_beam_search"], false);

    let back: SamplingConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn sampling_config_rejects_negative_top_k_on_deserialize() {
    let mut json = serde_json::to_value(config(8)).unwrap();
    json["top_k"] = serde_json::json!(-5);
    assert!(serde_json::from_value::<SamplingConfig>(json).is_err());
}
