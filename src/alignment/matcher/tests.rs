use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::alignment::segment_store::SegmentStore;
use crate::oracle::{OracleError, OracleProposal};
use crate::pipeline::defaults::{FuzzyScorer, ScriptNormalizer};
use crate::pipeline::traits::SemanticOracle;
use crate::types::{ReferenceLine, TranscriptSegment};

fn store(segments: &[(&str, u64, u64)], lines: &[&str]) -> SegmentStore {
    let segments: Vec<TranscriptSegment> = segments
        .iter()
        .map(|(text, start, end)| TranscriptSegment::new(*text, *start, *end))
        .collect();
    let lines: Vec<ReferenceLine> = lines
        .iter()
        .enumerate()
        .map(|(i, text)| ReferenceLine::new(i, *text))
        .collect();
    SegmentStore::build(&segments, &lines, 500, &ScriptNormalizer).expect("valid store")
}

fn table(store: &SegmentStore, config: &AlignerConfig) -> CandidateTable {
    build_candidate_table(store, config, &FuzzyScorer)
}

#[test]
fn greeting_pair_ranks_expected_lines_first() {
    let store = store(
        &[
            ("ohayou gozaimasu", 0, 1200),
            ("kyou wa ii tenki desu ne", 1300, 3000),
        ],
        &["おはようございます。", "今日はいい天気ですね。"],
    );
    let table = table(&store, &AlignerConfig::default());

    let first = &table.candidates(0)[0];
    assert_eq!(first.line_index, 0);
    assert_eq!(first.kind, MatchKind::Exact);
    assert_eq!(first.score, 1.0);

    let second = &table.candidates(1)[0];
    assert_eq!(second.line_index, 1);
    assert_eq!(second.kind, MatchKind::Fuzzy);
    assert!(second.score > 0.3 && second.score < 0.5);
    assert_eq!(table.score(1, 1), Some(second.score));
    assert_eq!(table.score(1, 0), None);
}

#[test]
fn equal_scores_prefer_lines_near_expected_position() {
    let store = store(&[("a", 0, 1000), ("はい", 2000, 2000)], &["はい", "さようなら", "はい"]);
    let table = table(&store, &AlignerConfig::default());
    let ranked: Vec<usize> = table.candidates(1).iter().map(|c| c.line_index).collect();
    assert_eq!(ranked, vec![2, 0]);
    assert!(table.candidates(0).is_empty());
}

#[test]
fn candidates_stay_inside_the_window() {
    let lines = ["はい"; 10];
    let store = store(&[("はい", 0, 1000), ("x", 9000, 10000)], &lines);
    let config = AlignerConfig {
        window_lines: 2,
        ..AlignerConfig::default()
    };
    let table = table(&store, &config);
    let window = table.window(0).unwrap();
    assert_eq!(window.range(), 0..3);
    assert!(table.candidates(0).iter().all(|c| window.contains(c.line_index)));
    assert!(table.in_window(0, 2));
    assert!(!table.in_window(0, 3));
}

#[test]
fn candidate_count_is_capped() {
    let lines = ["はい"; 10];
    let store = store(&[("はい", 0, 1000)], &lines);
    let config = AlignerConfig {
        max_candidates: 3,
        ..AlignerConfig::default()
    };
    let table = table(&store, &config);
    assert_eq!(table.candidates(0).len(), 3);
    assert!(table.line_has_candidate(0));
    assert!(!table.line_has_candidate(9));
}

#[test]
fn semantic_candidate_replaces_weaker_fuzzy_one() {
    let store = store(
        &[("ありがとう", 0, 1000)],
        &["ありがとうございます", "さようなら"],
    );
    let mut table = table(&store, &AlignerConfig::default());
    let fuzzy = table.score(0, 0).unwrap();
    assert!(fuzzy < 0.9);

    assert!(!table.add_semantic(0, 0, fuzzy - 0.1));
    assert!(table.add_semantic(0, 0, 0.9));
    assert_eq!(table.score(0, 0), Some(0.9));
    assert_eq!(table.best_kind(0, 0), Some(MatchKind::Semantic));
    assert_eq!(table.candidates(0).len(), 1);
    assert_eq!(table.semantic_count(), 1);
}

struct FixedOracle {
    calls: AtomicUsize,
    answer: Result<Option<OracleProposal>, OracleError>,
}

impl FixedOracle {
    fn new(answer: Result<Option<OracleProposal>, OracleError>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer,
        }
    }
}

impl SemanticOracle for FixedOracle {
    fn propose(
        &self,
        _segment_text: &str,
        _candidate_lines: &[String],
    ) -> Result<Option<OracleProposal>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

#[test]
fn oracle_rescues_segment_below_fuzzy_floor() {
    let store = store(&[("arigatou", 0, 1000)], &["有難う", "さようなら"]);
    let config = AlignerConfig::default();
    let mut table = table(&store, &config);
    assert!(table.candidates(0).is_empty());

    let oracle = FixedOracle::new(Ok(Some(OracleProposal {
        candidate_index: 0,
        confidence: 0.8,
    })));
    let outcome = augment_with_oracle(&mut table, &store, &config, &oracle).unwrap();
    assert_eq!(outcome.added_candidates, 1);
    assert!(outcome.failure.is_none());
    assert!(outcome.warning().is_none());
    assert_eq!(table.best_kind(0, 0), Some(MatchKind::Semantic));
    assert_eq!(table.score(0, 0), Some(0.8));
}

#[test]
fn low_confidence_proposals_are_ignored() {
    let store = store(&[("arigatou", 0, 1000)], &["有難う"]);
    let config = AlignerConfig::default();
    let mut table = table(&store, &config);
    let oracle = FixedOracle::new(Ok(Some(OracleProposal {
        candidate_index: 0,
        confidence: 0.05,
    })));
    let outcome = augment_with_oracle(&mut table, &store, &config, &oracle).unwrap();
    assert_eq!(outcome.added_candidates, 0);
    assert!(table.candidates(0).is_empty());
}

#[test]
fn identical_segments_share_one_query() {
    let store = store(
        &[("eto", 0, 100), ("eto", 100, 200), ("eto", 200, 300)],
        &["有難う"],
    );
    let config = AlignerConfig::default();
    let mut table = table(&store, &config);
    let oracle = FixedOracle::new(Ok(None));
    let outcome = augment_with_oracle(&mut table, &store, &config, &oracle).unwrap();
    assert_eq!(outcome.consulted_segments, 3);
    assert_eq!(outcome.queries, 1);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn exact_segments_skip_the_oracle() {
    let store = store(&[("有難う", 0, 1000)], &["有難う"]);
    let config = AlignerConfig::default();
    let mut table = table(&store, &config);
    let oracle = FixedOracle::new(Err(OracleError::Timeout));
    let outcome = augment_with_oracle(&mut table, &store, &config, &oracle).unwrap();
    assert_eq!(outcome.queries, 0);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_oracle_degrades_to_fuzzy_candidates() {
    let store = store(
        &[("ohayou", 0, 1000), ("arigatou", 1000, 2000)],
        &["おはよう", "有難う"],
    );
    let config = AlignerConfig::default();
    let mut table = table(&store, &config);
    let before = table.clone();
    let oracle = FixedOracle::new(Err(OracleError::Unavailable("connection refused".into())));
    let outcome = augment_with_oracle(&mut table, &store, &config, &oracle).unwrap();

    assert_eq!(table, before);
    assert_eq!(outcome.degraded_segments, 1);
    assert!(!outcome.quota_exhausted());
    match outcome.warning() {
        Some(crate::types::AlignmentWarning::OracleUnavailable {
            degraded_segments,
            quota_exhausted,
            ..
        }) => {
            assert_eq!(degraded_segments, 1);
            assert!(!quota_exhausted);
        }
        other => panic!("unexpected warning: {other:?}"),
    }
}

#[test]
fn quota_exhaustion_is_reported() {
    let store = store(&[("eto", 0, 100), ("ano", 100, 200)], &["有難う"]);
    let config = AlignerConfig {
        oracle_batch_size: 1,
        oracle_concurrency: 1,
        ..AlignerConfig::default()
    };
    let mut table = table(&store, &config);
    let oracle = FixedOracle::new(Err(OracleError::QuotaExhausted("429".into())));
    let outcome = augment_with_oracle(&mut table, &store, &config, &oracle).unwrap();
    assert!(outcome.quota_exhausted());
    assert_eq!(outcome.degraded_segments, 2);
    assert_eq!(outcome.batches, 2);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
}
