use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::alignment::matcher::CandidateTable;
use crate::alignment::segment_store::SegmentStore;
use crate::config::AlignerConfig;
use crate::error::AlignmentError;
use crate::oracle::{OracleError, OracleProposal, OracleQuery};
use crate::pipeline::traits::SemanticOracle;
use crate::types::AlignmentWarning;

/// What one oracle pass did to the candidate table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticOutcome {
    /// Segments without an exact candidate that were put to the oracle.
    pub consulted_segments: usize,
    /// Distinct queries after memoization.
    pub queries: usize,
    pub batches: usize,
    pub added_candidates: usize,
    /// Segments left with fuzzy-only candidates because their batch failed.
    pub degraded_segments: usize,
    /// First failure, in batch order.
    pub failure: Option<OracleError>,
}

impl SemanticOutcome {
    pub fn quota_exhausted(&self) -> bool {
        self.failure.as_ref().is_some_and(OracleError::is_quota)
    }

    pub fn warning(&self) -> Option<AlignmentWarning> {
        self.failure
            .as_ref()
            .map(|failure| AlignmentWarning::OracleUnavailable {
                degraded_segments: self.degraded_segments,
                quota_exhausted: failure.is_quota(),
                message: failure.to_string(),
            })
    }
}

/// Query slot shared by every segment with the same normalized text and window.
struct MemoSlot {
    query: OracleQuery,
    window_start: usize,
    segments: Vec<usize>,
}

type BatchResult = Option<Result<Vec<Option<OracleProposal>>, OracleError>>;

/// Ask the oracle about every segment that has no exact candidate and add its
/// confident proposals as semantic candidates.
///
/// Identical requests are sent once per run. Batches run on a dedicated pool
/// of `oracle_concurrency` threads. A failed batch leaves its segments
/// fuzzy-only; after quota exhaustion the remaining batches are skipped.
pub fn augment_with_oracle(
    table: &mut CandidateTable,
    store: &SegmentStore,
    config: &AlignerConfig,
    oracle: &dyn SemanticOracle,
) -> Result<SemanticOutcome, AlignmentError> {
    let slots = collect_queries(table, store);
    let mut outcome = SemanticOutcome {
        consulted_segments: slots.iter().map(|slot| slot.segments.len()).sum(),
        queries: slots.len(),
        ..SemanticOutcome::default()
    };
    if slots.is_empty() {
        return Ok(outcome);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.oracle_concurrency)
        .thread_name(|index| format!("oracle-{index}"))
        .build()
        .map_err(|e| AlignmentError::runtime("build oracle thread pool", e))?;

    let queries: Vec<OracleQuery> = slots.iter().map(|slot| slot.query.clone()).collect();
    let batches: Vec<&[OracleQuery]> = queries.chunks(config.oracle_batch_size).collect();
    outcome.batches = batches.len();
    let quota_hit = AtomicBool::new(false);

    tracing::debug!(
        oracle = %oracle.label(),
        queries = queries.len(),
        batches = batches.len(),
        concurrency = config.oracle_concurrency,
        "dispatching semantic oracle batches"
    );

    let results: Vec<BatchResult> = pool.install(|| {
        batches
            .par_iter()
            .map(|batch| {
                if quota_hit.load(Ordering::Acquire) {
                    return None;
                }
                let result = oracle.propose_batch(batch).and_then(|proposals| {
                    if proposals.len() == batch.len() {
                        Ok(proposals)
                    } else {
                        Err(OracleError::InvalidResponse(format!(
                            "expected {} proposals, got {}",
                            batch.len(),
                            proposals.len()
                        )))
                    }
                });
                if let Err(err) = &result {
                    if err.is_quota() {
                        quota_hit.store(true, Ordering::Release);
                    }
                }
                Some(result)
            })
            .collect()
    });

    let slot_batches = slots.chunks(config.oracle_batch_size);
    for (batch_index, (batch_slots, result)) in slot_batches.zip(results).enumerate() {
        let degraded: usize = batch_slots.iter().map(|slot| slot.segments.len()).sum();
        let proposals = match result {
            Some(Ok(proposals)) => proposals,
            Some(Err(err)) => {
                tracing::debug!(batch = batch_index, error = %err, "oracle batch failed");
                outcome.degraded_segments += degraded;
                outcome.failure.get_or_insert(err);
                continue;
            }
            None => {
                tracing::debug!(batch = batch_index, "oracle batch skipped after quota exhaustion");
                outcome.degraded_segments += degraded;
                continue;
            }
        };

        for (slot, proposal) in batch_slots.iter().zip(proposals) {
            let Some(proposal) = proposal else {
                continue;
            };
            if proposal.candidate_index >= slot.query.candidate_line_texts.len()
                || !proposal.confidence.is_finite()
                || proposal.confidence < config.min_candidate_score
            {
                continue;
            }
            let line = slot.window_start + proposal.candidate_index;
            let confidence = proposal.confidence.min(1.0);
            for &segment in &slot.segments {
                if table.add_semantic(segment, line, confidence) {
                    outcome.added_candidates += 1;
                }
            }
        }
    }

    tracing::debug!(
        added = outcome.added_candidates,
        degraded = outcome.degraded_segments,
        "semantic augmentation finished"
    );
    Ok(outcome)
}

fn collect_queries(table: &CandidateTable, store: &SegmentStore) -> Vec<MemoSlot> {
    let mut slots: Vec<MemoSlot> = Vec::new();
    let mut memo: HashMap<(&str, usize, usize), usize> = HashMap::new();
    let lines = store.lines();

    for (segment_index, segment) in store.segments().iter().enumerate() {
        let Some(window) = table.window(segment_index) else {
            continue;
        };
        if segment.normalized.is_empty() || window.is_empty() || table.has_exact(segment_index) {
            continue;
        }
        let key = (segment.normalized.as_str(), window.start, window.end);
        if let Some(&slot) = memo.get(&key) {
            slots[slot].segments.push(segment_index);
            continue;
        }
        memo.insert(key, slots.len());
        slots.push(MemoSlot {
            query: OracleQuery {
                segment_text: segment.text.clone(),
                candidate_line_texts: lines[window.range()]
                    .iter()
                    .map(|line| line.text.clone())
                    .collect(),
            },
            window_start: window.start,
            segments: vec![segment_index],
        });
    }
    slots
}
