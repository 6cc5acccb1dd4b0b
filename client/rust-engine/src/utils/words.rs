use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    // Words including internal apostrophes ("don't", "Sarah's").
    static ref WORD_RE: Regex = Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)*").unwrap();
}

/// Canonical form used for lookup counting: lowercased, punctuation stripped.
pub fn normalize(word: &str) -> String {
    WORD_RE
        .find(word)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}

/// The distinct selectable words of an article body, in reading order.
pub fn selectable_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut words = Vec::new();
    for m in WORD_RE.find_iter(text) {
        let word = m.as_str().to_lowercase();
        if seen.insert(word.clone()) {
            words.push(word);
        }
    }
    words
}
