//! Two-layer escalation pipeline
//!
//! L2-tier modifications are screened in cheap layer-1 batches; items the
//! screen cannot clear are re-examined in larger layer-2 batches. Both
//! layers call the external judgment service once per batch. Parsing is a
//! fragile external-format boundary and is isolated here behind two
//! functions with exhaustive fallback: a positional line parser for layer 1
//! and a JSON-array parser for layer 2.
//!
//! Failure policy: a malformed response is recovered locally by defaulting
//! the affected items to REVIEW (never toward approval). A transport
//! failure or timeout additionally surfaces a [`BatchFailure`] with enough
//! context to retry exactly that batch; completed batches stay valid.

use futures_util::stream::{self, StreamExt};
use revet_core::{
    BatchFailure, EngineConfig, EscalationLayer, EscalationRecord, FinalDecision, Layer1Judgment,
    Modification, RevetResult,
};
use revet_judge::JudgmentProvider;
use serde::Deserialize;
use std::sync::Arc;

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of one escalation run: one record per input item (input order),
/// plus the failures of any batches the judgment service could not serve.
#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub records: Vec<EscalationRecord>,
    pub failures: Vec<BatchFailure>,
    /// Total batches dispatched across both layers.
    pub batches_dispatched: usize,
}

impl EscalationOutcome {
    /// True when every batch was judged by the service (fail-safe defaults
    /// may still be present for unparsable entries, which are recovered
    /// locally and are not failures).
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Two-layer escalation pipeline over one document's L2 modifications.
pub struct EscalationPipeline {
    config: Arc<EngineConfig>,
    judge: Arc<dyn JudgmentProvider>,
}

impl EscalationPipeline {
    pub fn new(config: Arc<EngineConfig>, judge: Arc<dyn JudgmentProvider>) -> Self {
        Self { config, judge }
    }

    /// Run both layers over the given L2 modifications.
    ///
    /// Batches within a layer are dispatched concurrently (bounded by
    /// `max_concurrent_batches`) and reassembled by batch index, so record
    /// order always matches input order regardless of completion order.
    pub async fn run(&self, items: &[Modification]) -> EscalationOutcome {
        let mut records: Vec<EscalationRecord> = items
            .iter()
            .map(|m| EscalationRecord::new(m.modification_id, &m.cell_ref))
            .collect();
        let mut failures = Vec::new();

        if items.is_empty() {
            return EscalationOutcome {
                records,
                failures,
                batches_dispatched: 0,
            };
        }

        // Layer 1: cheap batched screen.
        let layer1_batches: Vec<Vec<usize>> = (0..items.len())
            .collect::<Vec<_>>()
            .chunks(self.config.layer1_batch_size)
            .map(|c| c.to_vec())
            .collect();

        let layer1_results = self
            .dispatch_layer(EscalationLayer::Layer1, &layer1_batches, items)
            .await;

        for (batch_index, item_indices, result) in layer1_results {
            match result {
                Ok(response) => {
                    let lines = non_empty_lines(&response);
                    for (pos, &item_index) in item_indices.iter().enumerate() {
                        let (judgment, confidence, reason) = match lines.get(pos) {
                            Some(line) => parse_layer1_line(line),
                            // Short response: the missing tail is unparsable.
                            None => (Layer1Judgment::Unsure, 50, "missing response line".to_string()),
                        };
                        records[item_index].record_layer1(
                            judgment,
                            confidence,
                            reason,
                            self.config.layer1_confidence_floor,
                        );
                    }
                }
                Err(err) => {
                    let reason = err.to_string();
                    tracing::error!(batch = batch_index, error = %reason, "layer-1 batch failed");
                    for &item_index in &item_indices {
                        records[item_index].fail_safe(format!("layer-1 batch failed: {}", reason));
                    }
                    failures.push(BatchFailure {
                        layer: EscalationLayer::Layer1,
                        batch_index,
                        modification_ids: item_indices
                            .iter()
                            .map(|&i| items[i].modification_id)
                            .collect(),
                        reason,
                    });
                }
            }
        }

        // Layer 2: selective deep analysis over items the screen flagged.
        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.needs_layer2 && r.layer2_decision.is_none())
            .map(|(i, _)| i)
            .collect();

        let layer2_batches: Vec<Vec<usize>> = pending
            .chunks(self.config.layer2_batch_size)
            .map(|c| c.to_vec())
            .collect();

        let layer2_results = self
            .dispatch_layer(EscalationLayer::Layer2, &layer2_batches, items)
            .await;

        for (batch_index, item_indices, result) in layer2_results {
            match result {
                Ok(response) => {
                    apply_layer2_response(&response, &item_indices, items, &mut records);
                }
                Err(err) => {
                    let reason = err.to_string();
                    tracing::error!(batch = batch_index, error = %reason, "layer-2 batch failed");
                    for &item_index in &item_indices {
                        records[item_index].fail_safe(format!("layer-2 batch failed: {}", reason));
                    }
                    failures.push(BatchFailure {
                        layer: EscalationLayer::Layer2,
                        batch_index,
                        modification_ids: item_indices
                            .iter()
                            .map(|&i| items[i].modification_id)
                            .collect(),
                        reason,
                    });
                }
            }
        }

        // Freeze everything that is not already finalized.
        for record in &mut records {
            record.finalize();
        }

        EscalationOutcome {
            records,
            failures,
            batches_dispatched: layer1_batches.len() + layer2_batches.len(),
        }
    }

    /// Dispatch one layer's batches with bounded parallelism, then hand the
    /// raw per-batch results back ordered by batch index.
    async fn dispatch_layer(
        &self,
        layer: EscalationLayer,
        batches: &[Vec<usize>],
        items: &[Modification],
    ) -> Vec<(usize, Vec<usize>, RevetResult<String>)> {
        let max_tokens = match layer {
            EscalationLayer::Layer1 => self.config.layer1_max_tokens,
            EscalationLayer::Layer2 => self.config.layer2_max_tokens,
        };

        let mut results: Vec<(usize, Vec<usize>, RevetResult<String>)> =
            stream::iter(batches.iter().enumerate().map(|(batch_index, item_indices)| {
                let prompt = match layer {
                    EscalationLayer::Layer1 => build_layer1_prompt(item_indices, items),
                    EscalationLayer::Layer2 => build_layer2_prompt(item_indices, items),
                };
                async move {
                    tracing::debug!(?layer, batch = batch_index, size = item_indices.len(), "dispatching batch");
                    let result = self.call_with_timeout(&prompt, max_tokens).await;
                    (batch_index, item_indices.clone(), result)
                }
            }))
            .buffer_unordered(self.config.max_concurrent_batches)
            .collect()
            .await;

        // Reassemble in batch order even if batches completed out of order.
        results.sort_by_key(|(batch_index, _, _)| *batch_index);
        results
    }

    async fn call_with_timeout(&self, prompt: &str, max_tokens: u32) -> RevetResult<String> {
        match tokio::time::timeout(self.config.judge_timeout, self.judge.call(prompt, max_tokens))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(revet_core::JudgeError::Timeout {
                provider: self.judge.model_id().to_string(),
                timeout_ms: self.config.judge_timeout.as_millis() as u64,
            }
            .into()),
        }
    }
}

// ============================================================================
// PROMPTS
// ============================================================================

fn describe_modification(index: usize, m: &Modification) -> String {
    format!(
        "{}. [{} / cell {}] column \"{}\": \"{}\" -> \"{}\"",
        index + 1,
        m.table_name,
        m.cell_ref,
        m.column_name,
        m.old_value,
        m.new_value
    )
}

/// Layer-1 screen prompt: one response line per item, in order.
pub fn build_layer1_prompt(item_indices: &[usize], items: &[Modification]) -> String {
    let mut prompt = String::from(
        "You are screening cell-level changes to a tracked work document.\n\
         For each numbered item, judge whether the change is semantically safe.\n\
         Respond with exactly one line per item, in the same order, formatted as:\n\
         JUDGMENT, confidence, reason\n\
         where JUDGMENT is SAFE, RISKY, or UNSURE and confidence is an integer 0-100.\n\
         Do not add any other text.\n\nItems:\n",
    );
    for (pos, &item_index) in item_indices.iter().enumerate() {
        prompt.push_str(&describe_modification(pos, &items[item_index]));
        prompt.push('\n');
    }
    prompt
}

/// Layer-2 deep-analysis prompt: a JSON array, one entry per item, ordered
/// by 1-based index.
pub fn build_layer2_prompt(item_indices: &[usize], items: &[Modification]) -> String {
    let mut prompt = String::from(
        "You are performing a deep review of document changes that a first-pass\n\
         screen could not clear. Analyze each numbered item and respond with a\n\
         JSON array only, one entry per item, ordered by index:\n\
         [{\"index\": 1, \"risk_level\": \"LOW|MEDIUM|HIGH\", \"decision\": \"APPROVE|REVIEW|REJECT\", \"confidence\": 0-100, \"reason\": \"...\"}]\n\nItems:\n",
    );
    for (pos, &item_index) in item_indices.iter().enumerate() {
        prompt.push_str(&describe_modification(pos, &items[item_index]));
        prompt.push('\n');
    }
    prompt
}

// ============================================================================
// LAYER-1 RESPONSE PARSING
// ============================================================================

fn non_empty_lines(response: &str) -> Vec<&str> {
    response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Strip an optional "1." / "1)" item prefix some services echo back.
fn strip_index_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim_start();
        }
    }
    trimmed
}

/// Parse one positional layer-1 line.
///
/// Any line without a readable confidence field counts as unparsable and
/// defaults to UNSURE at confidence 50 - the pipeline never drops an item.
pub fn parse_layer1_line(line: &str) -> (Layer1Judgment, u8, String) {
    let stripped = strip_index_prefix(line);
    let mut parts = stripped.splitn(3, ',');
    let token = parts.next().unwrap_or("");
    let confidence = parts.next().and_then(|c| c.trim().parse::<i64>().ok());
    let reason = parts.next().unwrap_or("").trim().to_string();

    match confidence {
        Some(c) => (
            Layer1Judgment::parse_token(token),
            c.clamp(0, 100) as u8,
            reason,
        ),
        None => (
            Layer1Judgment::Unsure,
            50,
            format!("unparsable line: {}", stripped),
        ),
    }
}

// ============================================================================
// LAYER-2 RESPONSE PARSING
// ============================================================================

#[derive(Debug, Deserialize)]
struct Layer2Entry {
    index: usize,
    decision: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

/// Extract the JSON array from a layer-2 response, tolerating prose around
/// it. Returns None when no parsable array is present.
fn extract_json_array(response: &str) -> Option<Vec<Layer2Entry>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

/// Apply one layer-2 batch response to its records.
///
/// A whole-batch parse failure defaults every item in the batch to REVIEW;
/// an entry missing from an otherwise valid array defaults just that item.
fn apply_layer2_response(
    response: &str,
    item_indices: &[usize],
    items: &[Modification],
    records: &mut [EscalationRecord],
) {
    let entries = match extract_json_array(response) {
        Some(entries) => entries,
        None => {
            tracing::warn!(items = item_indices.len(), "unparsable layer-2 response, failing batch closed");
            for &item_index in item_indices {
                records[item_index].fail_safe("unparsable layer-2 response");
            }
            return;
        }
    };

    for (pos, &item_index) in item_indices.iter().enumerate() {
        // Entries are keyed by the 1-based index used in the prompt.
        match entries.iter().find(|e| e.index == pos + 1) {
            Some(entry) => {
                let decision = FinalDecision::parse_token(&entry.decision).normalized();
                let confidence = entry
                    .confidence
                    .map(|c| c.clamp(0.0, 100.0).round() as u8)
                    .unwrap_or(50);
                let reason = entry.reason.clone().unwrap_or_default();
                records[item_index].record_layer2(decision, confidence, reason);
            }
            None => {
                tracing::warn!(
                    modification = %items[item_index].modification_id,
                    "layer-2 response missing entry, failing item closed"
                );
                records[item_index].fail_safe("missing entry in layer-2 response");
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
