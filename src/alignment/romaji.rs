//! Romaji to hiragana transliteration for transcripts that come back in Latin script.

const VOWELS: [char; 5] = ['a', 'i', 'u', 'e', 'o'];

#[rustfmt::skip]
const SYLLABLES: &[(&str, &str)] = &[
    ("a", "あ"), ("i", "い"), ("u", "う"), ("e", "え"), ("o", "お"),
    ("ka", "か"), ("ki", "き"), ("ku", "く"), ("ke", "け"), ("ko", "こ"),
    ("kya", "きゃ"), ("kyu", "きゅ"), ("kyo", "きょ"),
    ("ga", "が"), ("gi", "ぎ"), ("gu", "ぐ"), ("ge", "げ"), ("go", "ご"),
    ("gya", "ぎゃ"), ("gyu", "ぎゅ"), ("gyo", "ぎょ"),
    ("sa", "さ"), ("shi", "し"), ("si", "し"), ("su", "す"), ("se", "せ"), ("so", "そ"),
    ("sha", "しゃ"), ("shu", "しゅ"), ("sho", "しょ"), ("she", "しぇ"),
    ("sya", "しゃ"), ("syu", "しゅ"), ("syo", "しょ"),
    ("za", "ざ"), ("ji", "じ"), ("zi", "じ"), ("zu", "ず"), ("ze", "ぜ"), ("zo", "ぞ"),
    ("ja", "じゃ"), ("ju", "じゅ"), ("jo", "じょ"), ("je", "じぇ"),
    ("zya", "じゃ"), ("zyu", "じゅ"), ("zyo", "じょ"),
    ("ta", "た"), ("chi", "ち"), ("ti", "ち"), ("tsu", "つ"), ("tu", "つ"), ("te", "て"), ("to", "と"),
    ("cha", "ちゃ"), ("chu", "ちゅ"), ("cho", "ちょ"), ("che", "ちぇ"),
    ("tya", "ちゃ"), ("tyu", "ちゅ"), ("tyo", "ちょ"),
    ("da", "だ"), ("di", "ぢ"), ("du", "づ"), ("de", "で"), ("do", "ど"),
    ("na", "な"), ("ni", "に"), ("nu", "ぬ"), ("ne", "ね"), ("no", "の"),
    ("nya", "にゃ"), ("nyu", "にゅ"), ("nyo", "にょ"),
    ("ha", "は"), ("hi", "ひ"), ("fu", "ふ"), ("hu", "ふ"), ("he", "へ"), ("ho", "ほ"),
    ("hya", "ひゃ"), ("hyu", "ひゅ"), ("hyo", "ひょ"),
    ("fa", "ふぁ"), ("fi", "ふぃ"), ("fe", "ふぇ"), ("fo", "ふぉ"),
    ("ba", "ば"), ("bi", "び"), ("bu", "ぶ"), ("be", "べ"), ("bo", "ぼ"),
    ("bya", "びゃ"), ("byu", "びゅ"), ("byo", "びょ"),
    ("pa", "ぱ"), ("pi", "ぴ"), ("pu", "ぷ"), ("pe", "ぺ"), ("po", "ぽ"),
    ("pya", "ぴゃ"), ("pyu", "ぴゅ"), ("pyo", "ぴょ"),
    ("ma", "ま"), ("mi", "み"), ("mu", "む"), ("me", "め"), ("mo", "も"),
    ("mya", "みゃ"), ("myu", "みゅ"), ("myo", "みょ"),
    ("ya", "や"), ("yu", "ゆ"), ("yo", "よ"),
    ("ra", "ら"), ("ri", "り"), ("ru", "る"), ("re", "れ"), ("ro", "ろ"),
    ("rya", "りゃ"), ("ryu", "りゅ"), ("ryo", "りょ"),
    ("wa", "わ"), ("wo", "を"),
];

/// Transliterate lowercase ASCII romaji to hiragana.
///
/// Characters that are not lowercase ASCII letters pass through unchanged, as do
/// letters that do not start a known syllable.
pub(crate) fn romaji_to_hiragana(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() * 2);
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if !c.is_ascii_lowercase() {
            out.push(c);
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).copied();

        // Syllabic n: not followed by a vowel or a palatal y.
        if c == 'n' && next.map_or(true, |n| !VOWELS.contains(&n) && n != 'y') {
            out.push('ん');
            i += if next == Some('\'') { 2 } else { 1 };
            continue;
        }

        // Sokuon: doubled consonant, or "tch".
        let doubled = next == Some(c) && !VOWELS.contains(&c);
        let tch = c == 't' && next == Some('c') && chars.get(i + 2) == Some(&'h');
        if doubled || tch {
            out.push('っ');
            i += 1;
            continue;
        }

        match lookup_syllable(&chars[i..]) {
            Some((kana, consumed)) => {
                out.push_str(kana);
                i += consumed;
            }
            None => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn lookup_syllable(rest: &[char]) -> Option<(&'static str, usize)> {
    for len in (1..=3).rev() {
        if rest.len() < len {
            continue;
        }
        let candidate: String = rest[..len].iter().collect();
        if let Some((_, kana)) = SYLLABLES.iter().find(|(romaji, _)| *romaji == candidate) {
            return Some((*kana, len));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_transliterates_exactly() {
        assert_eq!(romaji_to_hiragana("ohayou gozaimasu"), "おはよう ございます");
    }

    #[test]
    fn palatal_and_particles() {
        assert_eq!(
            romaji_to_hiragana("kyou wa ii tenki desu ne"),
            "きょう わ いい てんき です ね"
        );
    }

    #[test]
    fn syllabic_n_before_consonant_and_vowel() {
        assert_eq!(romaji_to_hiragana("konnichiwa"), "こんにちわ");
        assert_eq!(romaji_to_hiragana("shinbun"), "しんぶん");
        assert_eq!(romaji_to_hiragana("kan'i"), "かんい");
    }

    #[test]
    fn sokuon_from_doubled_consonant_and_tch() {
        assert_eq!(romaji_to_hiragana("gakkou"), "がっこう");
        assert_eq!(romaji_to_hiragana("matcha"), "まっちゃ");
    }

    #[test]
    fn non_romaji_passes_through() {
        assert_eq!(romaji_to_hiragana("今日は 3x"), "今日は 3x");
    }
}
