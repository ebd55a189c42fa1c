//! REVET Judge - Judgment-Service Abstraction Layer
//!
//! Provider-agnostic trait for the external semantic-judgment service. The
//! escalation pipeline owns prompt construction and response parsing; this
//! crate owns only the opaque `call(prompt, max_tokens) -> String` boundary,
//! a production HTTP client, and in-memory providers for testing.

use async_trait::async_trait;
use revet_core::{JudgeError, RevetResult};
use std::collections::VecDeque;
use std::sync::Mutex;

mod http;

pub use http::HttpJudgeProvider;

// ============================================================================
// JUDGMENT PROVIDER TRAIT
// ============================================================================

/// Trait for judgment-service providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct MyJudge { /* ... */ }
///
/// #[async_trait]
/// impl JudgmentProvider for MyJudge {
///     async fn call(&self, prompt: &str, max_tokens: u32) -> RevetResult<String> {
///         // Call the service
///     }
///     fn model_id(&self) -> &str { "my-model" }
/// }
/// ```
#[async_trait]
pub trait JudgmentProvider: Send + Sync {
    /// Send one prompt to the judgment service and return the raw response
    /// text. One call corresponds to one escalation batch.
    ///
    /// # Returns
    /// * `Ok(String)` - The raw response text
    /// * `Err(RevetError::Judge)` - If the call fails
    async fn call(&self, prompt: &str, max_tokens: u32) -> RevetResult<String>;

    /// Model identifier reported by this provider.
    fn model_id(&self) -> &str;
}

// ============================================================================
// USAGE TRACKER
// ============================================================================

/// Tracks call counts and prompt/response character volume.
/// Thread-safe via atomic operations.
pub struct UsageTracker {
    calls: std::sync::atomic::AtomicU64,
    prompt_chars: std::sync::atomic::AtomicU64,
    response_chars: std::sync::atomic::AtomicU64,
}

impl UsageTracker {
    /// Create a new usage tracker with zero counts.
    pub fn new() -> Self {
        Self {
            calls: std::sync::atomic::AtomicU64::new(0),
            prompt_chars: std::sync::atomic::AtomicU64::new(0),
            response_chars: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Record one completed call.
    pub fn record_call(&self, prompt_chars: u64, response_chars: u64) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.prompt_chars
            .fetch_add(prompt_chars, std::sync::atomic::Ordering::Relaxed);
        self.response_chars
            .fetch_add(response_chars, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn prompt_chars(&self) -> u64 {
        self.prompt_chars.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn response_chars(&self) -> u64 {
        self.response_chars
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.calls.store(0, std::sync::atomic::Ordering::Relaxed);
        self.prompt_chars
            .store(0, std::sync::atomic::Ordering::Relaxed);
        self.response_chars
            .store(0, std::sync::atomic::Ordering::Relaxed);
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("calls", &self.calls())
            .field("prompt_chars", &self.prompt_chars())
            .field("response_chars", &self.response_chars())
            .finish()
    }
}

// ============================================================================
// SCRIPTED PROVIDER FOR TESTING
// ============================================================================

/// Scripted judgment provider for tests: returns canned responses in FIFO
/// order and errors with `ScriptExhausted` when the script runs out.
pub struct ScriptedJudge {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedJudge {
    /// Create a scripted judge from a sequence of canned responses.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn received_prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of responses left in the script.
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl JudgmentProvider for ScriptedJudge {
    async fn call(&self, prompt: &str, _max_tokens: u32) -> RevetResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front());
        next.ok_or_else(|| JudgeError::ScriptExhausted.into())
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

impl std::fmt::Debug for ScriptedJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedJudge")
            .field("remaining", &self.remaining())
            .finish()
    }
}

// ============================================================================
// FAILING PROVIDER FOR TESTING
// ============================================================================

/// Judgment provider that always fails, for transport-failure tests.
#[derive(Debug, Clone)]
pub struct FailingJudge {
    message: String,
}

impl FailingJudge {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl JudgmentProvider for FailingJudge {
    async fn call(&self, _prompt: &str, _max_tokens: u32) -> RevetResult<String> {
        Err(JudgeError::RequestFailed {
            provider: "failing".to_string(),
            message: self.message.clone(),
        }
        .into())
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

// ============================================================================
// TESTS
// ============================================================================
