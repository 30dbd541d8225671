use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use script_align_rs::input::{parse_reference_text, parse_transcript_json};
use script_align_rs::{
    AbortHandle, AlignedEntry, AlignerConfig, AlignmentError, AlignmentInput, AlignmentOutput,
    AlignmentWarning, Confidence, InsertionPolicy, OracleError, OracleProposal, ReferenceLine,
    SemanticOracle, SubtitleAlignerBuilder, TrackFormat, TranscriptSegment,
};

/// Script phrases with the romaji a recognizer might produce for them.
const PHRASES: [(&str, &str); 12] = [
    ("おはようございます。", "ohayou gozaimasu"),
    ("今日はいい天気ですね。", "kyou wa ii tenki desu ne"),
    ("じゃあまた明日。", "jaa mata ashita"),
    ("本当にありがとうございました。", "hontou ni arigatou gozaimashita"),
    ("どこへ行くんですか？", "doko e ikun desu ka"),
    ("駅の前で待っています。", "eki no mae de matte imasu"),
    ("それは知らなかった。", "sore wa shiranakatta"),
    ("早く帰ろう。", "hayaku kaerou"),
    ("お腹が空きました。", "onaka ga sukimashita"),
    ("先生はもう来ましたか？", "sensei wa mou kimashita ka"),
    ("電車が遅れているみたいです。", "densha ga okurete iru mitai desu"),
    ("静かにしてください。", "shizuka ni shite kudasai"),
];

/// Backchannel lines short enough to be swallowed by a neighboring span.
const SHORT_LINES: [(&str, &str); 4] = [
    ("はい。", "hai"),
    ("うん。", "un"),
    ("えっ？", "e"),
    ("そう。", "sou"),
];

const FILLERS: [&str; 3] = ["nanka", "ano ne", "maa"];

struct Generated {
    input: AlignmentInput,
    /// Reference texts at least one segment actually speaks.
    spoken_texts: BTreeSet<String>,
}

/// A script with repeated and short lines, about one line in five never spoken,
/// fillers between lines, romaji for two segments in five, and segments that
/// overlap or start slightly before their predecessor.
fn generate(seed: u64) -> Generated {
    let mut rng = StdRng::seed_from_u64(seed);
    let line_count = rng.gen_range(5..16);
    let picks: Vec<(&str, &str)> = (0..line_count)
        .map(|_| {
            let pool: &[(&str, &str)] = if rng.gen_bool(0.3) {
                &SHORT_LINES
            } else {
                &PHRASES
            };
            pool.choose(&mut rng).copied().unwrap_or(PHRASES[0])
        })
        .collect();
    let lines: Vec<ReferenceLine> = picks
        .iter()
        .enumerate()
        .map(|(index, (text, _))| ReferenceLine::new(index, *text))
        .collect();

    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut spoken_texts = BTreeSet::new();
    let mut cursor = rng.gen_range(0..2_000u64);
    for (position, (text, romaji)) in picks.iter().enumerate() {
        if rng.gen_bool(0.12) {
            let start = cursor;
            cursor += rng.gen_range(200..500);
            let filler = FILLERS.choose(&mut rng).copied().unwrap_or("maa");
            segments.push(TranscriptSegment::new(filler, start, cursor));
        }
        if position == 0 || !rng.gen_bool(0.2) {
            let start = match segments.last() {
                // Stays inside the default monotonic tolerance.
                Some(previous) if rng.gen_bool(0.2) => {
                    previous.start_ms.saturating_sub(rng.gen_range(0..400))
                }
                _ => cursor + rng.gen_range(0..400),
            };
            let end = start + rng.gen_range(500..2_500);
            let heard = if rng.gen_bool(0.4) { *romaji } else { *text };
            segments.push(TranscriptSegment::new(heard, start, end));
            spoken_texts.insert(text.to_string());
            cursor = cursor.max(end);
        } else {
            cursor += rng.gen_range(0..1_500);
        }
    }

    Generated {
        input: AlignmentInput { segments, lines },
        spoken_texts,
    }
}

fn align(input: &AlignmentInput, config: AlignerConfig) -> Result<AlignmentOutput, AlignmentError> {
    SubtitleAlignerBuilder::new(config).build()?.align(input)
}

fn dropped_lines(output: &AlignmentOutput) -> Vec<usize> {
    output
        .warnings
        .iter()
        .filter_map(|warning| match warning {
            AlignmentWarning::LineDropped { line_index, .. } => Some(*line_index),
            _ => None,
        })
        .collect()
}

fn assert_track_invariants(entries: &[AlignedEntry], context: &str) {
    for entry in entries {
        assert!(
            entry.start_ms < entry.end_ms,
            "{context}: empty interval for line {}: [{}, {})",
            entry.line_index,
            entry.start_ms,
            entry.end_ms
        );
        match entry.confidence {
            Confidence::Matched => assert!(entry.score.is_some(), "{context}: matched without score"),
            Confidence::Interpolated => assert!(entry.score.is_none(), "{context}: interpolated with score"),
        }
    }
    for pair in entries.windows(2) {
        assert!(
            pair[0].line_index < pair[1].line_index,
            "{context}: line order broken at {} -> {}",
            pair[0].line_index,
            pair[1].line_index
        );
        assert!(
            pair[0].start_ms < pair[1].start_ms,
            "{context}: start order broken at line {}",
            pair[1].line_index
        );
        assert!(
            pair[0].end_ms <= pair[1].start_ms,
            "{context}: overlap between lines {} and {}",
            pair[0].line_index,
            pair[1].line_index
        );
    }
}

#[test]
fn random_scripts_produce_monotonic_non_overlapping_tracks() {
    for seed in 0..40u64 {
        let generated = generate(seed);
        let context = format!("seed {seed}");
        let output = align(&generated.input, AlignerConfig::default())
            .unwrap_or_else(|err| panic!("{context}: {err}"));
        assert_track_invariants(&output.entries, &context);

        // Keep policy: every line appears exactly once.
        let indices: Vec<usize> = output.entries.iter().map(|e| e.line_index).collect();
        let expected: Vec<usize> = generated.input.lines.iter().map(|l| l.index).collect();
        assert_eq!(indices, expected, "{context}: coverage");
        assert_eq!(output.summary.dropped_count, 0, "{context}");
    }
}

#[test]
fn lines_nobody_speaks_are_never_matched() {
    for seed in 0..60u64 {
        let generated = generate(seed);
        let context = format!("seed {seed}");
        let output = align(&generated.input, AlignerConfig::default())
            .unwrap_or_else(|err| panic!("{context}: {err}"));
        for entry in &output.entries {
            if !generated.spoken_texts.contains(&entry.text) {
                assert_eq!(
                    entry.confidence,
                    Confidence::Interpolated,
                    "{context}: unspoken line {} '{}' took audio at [{}, {})",
                    entry.line_index,
                    entry.text,
                    entry.start_ms,
                    entry.end_ms
                );
            }
        }
        assert!(output.summary.matched_count > 0, "{context}");
    }
}

#[test]
fn short_unspoken_line_between_matches_is_interpolated() {
    let input = AlignmentInput {
        segments: vec![
            TranscriptSegment::new("おはようございます", 0, 1000),
            TranscriptSegment::new("今日はいい天気ですね", 3000, 4000),
        ],
        lines: vec![
            ReferenceLine::new(0, "おはようございます。"),
            ReferenceLine::new(1, "はい。"),
            ReferenceLine::new(2, "今日はいい天気ですね。"),
        ],
    };
    let output = align(&input, AlignerConfig::default()).unwrap();
    let spans: Vec<(usize, u64, u64, Confidence)> = output
        .entries
        .iter()
        .map(|e| (e.line_index, e.start_ms, e.end_ms, e.confidence))
        .collect();
    assert_eq!(
        spans,
        vec![
            (0, 0, 1000, Confidence::Matched),
            (1, 1000, 2000, Confidence::Interpolated),
            (2, 3000, 4000, Confidence::Matched),
        ]
    );
}

#[test]
fn repeated_short_line_binds_to_nearest_copy() {
    let input = AlignmentInput {
        segments: vec![
            TranscriptSegment::new("おはようございます", 0, 1000),
            TranscriptSegment::new("はい", 1000, 2000),
        ],
        lines: vec![
            ReferenceLine::new(0, "おはようございます。"),
            ReferenceLine::new(1, "はい。"),
            ReferenceLine::new(2, "今日はいい天気ですね。"),
            ReferenceLine::new(3, "はい。"),
        ],
    };
    for max_split_lines in [1, AlignerConfig::DEFAULT_MAX_SPLIT_LINES] {
        let config = AlignerConfig {
            max_split_lines,
            ..AlignerConfig::default()
        };
        let output = align(&input, config).unwrap();
        let spans: Vec<(usize, u64, u64, Confidence)> = output
            .entries
            .iter()
            .map(|e| (e.line_index, e.start_ms, e.end_ms, e.confidence))
            .collect();
        assert_eq!(
            spans,
            vec![
                (0, 0, 1000, Confidence::Matched),
                (1, 1000, 2000, Confidence::Matched),
                (2, 2000, 3000, Confidence::Interpolated),
                (3, 3000, 4000, Confidence::Interpolated),
            ],
            "max_split_lines {max_split_lines}"
        );
    }
}

#[test]
fn drop_policies_account_for_every_line() {
    for policy in InsertionPolicy::ALL {
        for seed in 0..20u64 {
            let generated = generate(seed);
            let context = format!("seed {seed} policy {policy}");
            let config = AlignerConfig {
                insertion_policy: policy,
                ..AlignerConfig::default()
            };
            let output = align(&generated.input, config)
                .unwrap_or_else(|err| panic!("{context}: {err}"));
            assert_track_invariants(&output.entries, &context);

            let mut covered: Vec<usize> = output.entries.iter().map(|e| e.line_index).collect();
            let dropped = dropped_lines(&output);
            assert_eq!(dropped.len(), output.summary.dropped_count, "{context}");
            covered.extend(dropped);
            covered.sort_unstable();
            let expected: Vec<usize> = generated.input.lines.iter().map(|l| l.index).collect();
            assert_eq!(covered, expected, "{context}: every line kept or reported once");

            if policy == InsertionPolicy::DropAll {
                assert!(
                    output
                        .entries
                        .iter()
                        .all(|e| e.confidence == Confidence::Matched),
                    "{context}: drop_all kept an interpolated line"
                );
            }
        }
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    for seed in [3u64, 11, 27] {
        let generated = generate(seed);
        let aligner = SubtitleAlignerBuilder::new(AlignerConfig::default())
            .build()
            .unwrap();
        let first = aligner.align(&generated.input).unwrap();
        let second = aligner.align(&generated.input).unwrap();
        assert_eq!(first, second);
        for format in TrackFormat::ALL {
            assert_eq!(
                aligner.render(&first.entries, format).unwrap(),
                aligner.render(&second.entries, format).unwrap()
            );
        }
    }
}

fn greeting_input() -> AlignmentInput {
    AlignmentInput {
        segments: vec![
            TranscriptSegment::new("ohayou gozaimasu", 0, 1200),
            TranscriptSegment::new("kyou wa ii tenki desu ne", 1300, 3000),
            TranscriptSegment::new("arigatou", 3200, 4000),
        ],
        lines: vec![
            ReferenceLine::new(0, "おはようございます。"),
            ReferenceLine::new(1, "今日はいい天気ですね。"),
            ReferenceLine::new(2, "有難う。"),
        ],
    }
}

struct FailingOracle {
    error: OracleError,
    calls: AtomicUsize,
}

impl FailingOracle {
    fn new(error: OracleError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SemanticOracle for FailingOracle {
    fn propose(
        &self,
        _segment_text: &str,
        _candidate_lines: &[String],
    ) -> Result<Option<OracleProposal>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Knows that "arigatou" is written 有難う.
struct GlossaryOracle;

impl SemanticOracle for GlossaryOracle {
    fn propose(
        &self,
        segment_text: &str,
        candidate_lines: &[String],
    ) -> Result<Option<OracleProposal>, OracleError> {
        if !segment_text.contains("arigatou") {
            return Ok(None);
        }
        Ok(candidate_lines
            .iter()
            .position(|line| line.contains("有難う"))
            .map(|candidate_index| OracleProposal {
                candidate_index,
                confidence: 0.9,
            }))
    }
}

#[test]
fn fuzzy_only_run_interpolates_unrecognized_line() {
    let output = align(&greeting_input(), AlignerConfig::default()).unwrap();
    let last = &output.entries[2];
    assert_eq!(last.confidence, Confidence::Interpolated);
    assert_eq!((last.start_ms, last.end_ms), (3000, 4000));
    assert_eq!(output.summary.deleted_segment_count, 1);
}

#[test]
fn oracle_rescues_line_fuzzy_matching_misses() {
    let aligner = SubtitleAlignerBuilder::new(AlignerConfig::default())
        .with_oracle(Box::new(GlossaryOracle))
        .build()
        .unwrap();
    let output = aligner.align(&greeting_input()).unwrap();
    let last = &output.entries[2];
    assert_eq!(last.confidence, Confidence::Matched);
    assert_eq!((last.start_ms, last.end_ms), (3200, 4000));
    assert_eq!(output.summary.semantic_candidate_count, 1);
    assert!(output.warnings.is_empty());
}

#[test]
fn failing_oracle_degrades_to_fuzzy_result() {
    let baseline = align(&greeting_input(), AlignerConfig::default()).unwrap();
    let aligner = SubtitleAlignerBuilder::new(AlignerConfig::default())
        .with_oracle(Box::new(FailingOracle::new(OracleError::Unavailable(
            "connection refused".to_string(),
        ))))
        .build()
        .unwrap();
    let output = aligner.align(&greeting_input()).unwrap();

    assert_eq!(output.entries, baseline.entries);
    let oracle_warnings: Vec<&AlignmentWarning> = output
        .warnings
        .iter()
        .filter(|w| matches!(w, AlignmentWarning::OracleUnavailable { .. }))
        .collect();
    assert_eq!(oracle_warnings.len(), 1);
    match oracle_warnings[0] {
        AlignmentWarning::OracleUnavailable {
            degraded_segments,
            quota_exhausted,
            ..
        } => {
            // The exact greeting never reaches the oracle.
            assert_eq!(*degraded_segments, 2);
            assert!(!quota_exhausted);
        }
        other => panic!("unexpected warning: {other:?}"),
    }
}

#[test]
fn quota_exhaustion_degrades_by_default() {
    let aligner = SubtitleAlignerBuilder::new(AlignerConfig::default())
        .with_oracle(Box::new(FailingOracle::new(OracleError::QuotaExhausted(
            "429 Too Many Requests".to_string(),
        ))))
        .build()
        .unwrap();
    let output = aligner.align(&greeting_input()).unwrap();
    assert!(output.warnings.iter().any(|w| matches!(
        w,
        AlignmentWarning::OracleUnavailable {
            quota_exhausted: true,
            ..
        }
    )));
}

#[test]
fn quota_exhaustion_aborts_when_configured() {
    let config = AlignerConfig {
        abort_on_oracle_quota: true,
        ..AlignerConfig::default()
    };
    let aligner = SubtitleAlignerBuilder::new(config)
        .with_oracle(Box::new(FailingOracle::new(OracleError::QuotaExhausted(
            "429".to_string(),
        ))))
        .build()
        .unwrap();
    match aligner.align(&greeting_input()) {
        Err(AlignmentError::Aborted { stage, reason }) => {
            assert_eq!(stage, "resolve");
            assert!(reason.contains("quota"), "reason: {reason}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(aligner.abort_handle().is_aborted());
}

#[test]
fn abort_from_another_thread_stops_the_run() {
    let abort = AbortHandle::new();
    let aligner = SubtitleAlignerBuilder::new(AlignerConfig::default())
        .with_abort_handle(abort.clone())
        .build()
        .unwrap();
    std::thread::spawn(move || abort.abort("operator cancelled"))
        .join()
        .expect("abort thread");
    assert!(matches!(
        aligner.align(&greeting_input()),
        Err(AlignmentError::Aborted {
            stage: "normalize",
            ..
        })
    ));
}

#[test]
fn malformed_inputs_are_rejected() {
    let lines = vec![ReferenceLine::new(0, "おはようございます。")];
    let empty_transcript = AlignmentInput {
        segments: Vec::new(),
        lines: lines.clone(),
    };
    assert!(matches!(
        align(&empty_transcript, AlignerConfig::default()),
        Err(AlignmentError::MalformedInput { .. })
    ));

    let empty_script = AlignmentInput {
        segments: vec![TranscriptSegment::new("ohayou", 0, 1000)],
        lines: parse_reference_text("\n- 3 -\n\n"),
    };
    assert!(matches!(
        align(&empty_script, AlignerConfig::default()),
        Err(AlignmentError::MalformedInput { .. })
    ));

    let backwards = AlignmentInput {
        segments: vec![
            TranscriptSegment::new("ohayou", 5000, 6000),
            TranscriptSegment::new("ohayou", 1000, 2000),
        ],
        lines,
    };
    assert!(matches!(
        align(&backwards, AlignerConfig::default()),
        Err(AlignmentError::MalformedInput { .. })
    ));
}

#[test]
fn unrelated_texts_have_no_viable_alignment() {
    let input = AlignmentInput {
        segments: vec![TranscriptSegment::new("zzz", 0, 1000)],
        lines: vec![ReferenceLine::new(0, "おはようございます。")],
    };
    match align(&input, AlignerConfig::default()) {
        Err(AlignmentError::NoViableAlignment {
            matched_lines,
            min_score,
            ..
        }) => {
            assert_eq!(matched_lines, 0);
            assert_eq!(min_score, AlignerConfig::DEFAULT_MIN_GLOBAL_SCORE);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn whisper_dump_to_vtt_end_to_end() {
    let transcript = r#"{"segments": [
        {"id": 0, "start": 0.0, "end": 1.2, "text": "ohayou gozaimasu"},
        {"id": 1, "start": 1.3, "end": 3.0, "text": "kyou wa ii tenki desu ne"}
    ]}"#;
    let input = AlignmentInput {
        segments: parse_transcript_json(transcript).unwrap(),
        lines: parse_reference_text("ハルカ：おはようございます。\n\n今日はいい天気ですね。\n"),
    };
    let aligner = SubtitleAlignerBuilder::new(AlignerConfig::default())
        .build()
        .unwrap();
    let output = aligner.align(&input).unwrap();
    let vtt = aligner.render(&output.entries, TrackFormat::Vtt).unwrap();
    assert_eq!(
        vtt,
        "WEBVTT\n\n00:00:00.000 --> 00:00:01.200\n<v ハルカ>おはようございます。\n\n\
         00:00:01.300 --> 00:00:03.000\n今日はいい天気ですね。\n"
    );
}
