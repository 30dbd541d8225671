use crate::alignment::romaji::romaji_to_hiragana;

const OPEN_BRACKETS: [char; 7] = ['（', '(', '【', '［', '[', '〈', '《'];
const CLOSE_BRACKETS: [char; 7] = ['）', ')', '】', '］', ']', '〉', '》'];
const SCENE_MARKERS: [char; 8] = ['○', '◯', '●', '■', '□', '◆', '◇', '※'];
const MAX_ACTOR_CHARS: usize = 16;

/// Matching key shared by transcript segments and reference lines.
///
/// Both sides go through the same folding so that a romaji or katakana
/// transcript can be compared with a kana/kanji script character by character.
pub fn normalize_text(text: &str) -> String {
    let folded: String = fold_width(text)
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let without_directions = strip_bracketed(&folded);
    romaji_to_hiragana(&without_directions)
        .chars()
        .map(katakana_to_hiragana)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Collapse whitespace runs to a single space and trim. Used for display text.
pub fn fold_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold full-width ASCII forms and the ideographic space to their half-width forms.
pub fn fold_width(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0xFF01..=0xFF5E => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            0x3000 => ' ',
            _ => c,
        })
        .collect()
}

pub fn katakana_to_hiragana(c: char) -> char {
    let value = c as u32;
    if (0x30A1..=0x30F6).contains(&value) {
        char::from_u32(value - 0x60).unwrap_or(c)
    } else {
        c
    }
}

/// Remove bracketed spans such as `（笑）` or `[music]`.
///
/// An unclosed bracket only loses the bracket character itself, so a truncated
/// OCR line keeps its dialogue.
pub fn strip_bracketed(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        if OPEN_BRACKETS.contains(&c) {
            depth += 1;
            continue;
        }
        if CLOSE_BRACKETS.contains(&c) {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth == 0 {
            out.push(c);
        }
    }
    if depth > 0 {
        return text
            .chars()
            .filter(|c| !OPEN_BRACKETS.contains(c) && !CLOSE_BRACKETS.contains(c))
            .collect();
    }
    out
}

/// Lines that OCR picks up from the page but that are never spoken.
pub fn is_ocr_artifact(line: &str) -> bool {
    let folded = fold_whitespace(&fold_width(line));
    if folded.is_empty() {
        return true;
    }
    is_page_number(&folded) || is_stage_direction(&folded) || is_scene_heading(&folded)
}

fn is_page_number(text: &str) -> bool {
    let mut digits = 0usize;
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits += 1;
            continue;
        }
        if matches!(
            c,
            ' ' | '-' | '–' | '—' | '/' | '.' | 'p' | 'P' | '頁' | 'ペ' | 'ー' | 'ジ'
        ) {
            continue;
        }
        return false;
    }
    digits > 0
}

fn is_stage_direction(text: &str) -> bool {
    let starts_bracketed = text.chars().next().is_some_and(|c| OPEN_BRACKETS.contains(&c));
    let ends_bracketed = text
        .chars()
        .next_back()
        .is_some_and(|c| CLOSE_BRACKETS.contains(&c));
    starts_bracketed && ends_bracketed && strip_bracketed(text).trim().is_empty()
}

fn is_scene_heading(text: &str) -> bool {
    text.chars()
        .next()
        .is_some_and(|c| SCENE_MARKERS.contains(&c))
}

/// Split an `ACTOR : TEXT` script line into its speaker label and dialogue.
pub fn split_actor(line: &str) -> (Option<String>, String) {
    let trimmed = line.trim();
    let Some(pos) = trimmed.find(|c: char| c == ':' || c == '：') else {
        return (None, trimmed.to_string());
    };
    let label = trimmed[..pos].trim();
    let sep_len = trimmed[pos..].chars().next().map_or(1, char::len_utf8);
    let text = trimmed[pos + sep_len..].trim();

    let looks_like_clock = label.chars().next_back().is_some_and(|c| c.is_ascii_digit())
        && text.chars().next().is_some_and(|c| c.is_ascii_digit());
    let valid_label = !label.is_empty()
        && label.chars().count() <= MAX_ACTOR_CHARS
        && !label.chars().any(is_sentence_punctuation)
        && !looks_like_clock;

    if valid_label && !text.is_empty() {
        (Some(label.to_string()), text.to_string())
    } else {
        (None, trimmed.to_string())
    }
}

fn is_sentence_punctuation(c: char) -> bool {
    matches!(c, '。' | '、' | '！' | '？' | '!' | '?' | '「' | '」' | '.' | ',')
}
