//! Korean particle selection.
//!
//! Precomposed Hangul syllables live in U+AC00..=U+D7A3 and are laid out as
//! `(initial * 21 + medial) * 28 + final`, so a syllable has a trailing
//! consonant (받침) exactly when its offset is not a multiple of 28.

const HANGUL_START: u32 = 0xAC00;
const HANGUL_END: u32 = 0xD7A3;
const FINAL_COUNT: u32 = 28;

/// `Some(true)` if the syllable ends in a consonant, `None` for non-Hangul input.
pub fn has_final_consonant(ch: char) -> Option<bool> {
    let code = ch as u32;
    if !(HANGUL_START..=HANGUL_END).contains(&code) {
        return None;
    }
    Some((code - HANGUL_START) % FINAL_COUNT != 0)
}

fn pick<'a>(word: &str, with_final: &'a str, without_final: &'a str, fallback: &'a str) -> &'a str {
    match word.chars().last().and_then(has_final_consonant) {
        Some(true) => with_final,
        Some(false) => without_final,
        None => fallback,
    }
}

/// Topic particle: 은 / 는.
pub fn topic_particle(word: &str) -> &'static str {
    pick(word, "은", "는", "은(는)")
}

/// Subject particle: 이 / 가.
pub fn subject_particle(word: &str) -> &'static str {
    pick(word, "이", "가", "이(가)")
}

/// `word` followed by its topic particle.
pub fn with_topic(word: &str) -> String {
    format!("{}{}", word, topic_particle(word))
}

/// Joins names with ", " and attaches the topic particle to the last one.
pub fn join_with_topic(names: &[String]) -> String {
    match names.split_last() {
        None => String::new(),
        Some((last, rest)) => {
            let mut parts: Vec<String> = rest.to_vec();
            parts.push(with_topic(last));
            parts.join(", ")
        }
    }
}
