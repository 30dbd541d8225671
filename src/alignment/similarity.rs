use std::collections::HashMap;

const EDIT_WEIGHT: f64 = 0.6;
const DICE_WEIGHT: f64 = 0.4;

/// Blend of normalized edit similarity and character-bigram Dice over two
/// already-normalized strings.
///
/// Identical non-empty text scores exactly 1.0; an empty side scores 0.0.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let blended = EDIT_WEIGHT * edit_similarity(&a, &b) + DICE_WEIGHT * bigram_dice(&a, &b);
    blended.clamp(0.0, 1.0) as f32
}

pub(crate) fn edit_similarity(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Two-row Levenshtein distance over characters.
pub(crate) fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Dice coefficient over character bigram multisets. Single-character strings
/// contribute their one character as a unigram.
pub(crate) fn bigram_dice(a: &[char], b: &[char]) -> f64 {
    let grams_a = grams(a);
    let grams_b = grams(b);
    let total: usize = grams_a.values().sum::<usize>() + grams_b.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }
    let shared: usize = grams_a
        .iter()
        .map(|(gram, count)| (*count).min(grams_b.get(gram).copied().unwrap_or(0)))
        .sum();
    2.0 * shared as f64 / total as f64
}

fn grams(text: &[char]) -> HashMap<(char, Option<char>), usize> {
    let mut counts = HashMap::new();
    if text.len() == 1 {
        counts.insert((text[0], None), 1);
        return counts;
    }
    for pair in text.windows(2) {
        *counts.entry((pair[0], Some(pair[1]))).or_insert(0) += 1;
    }
    counts
}
