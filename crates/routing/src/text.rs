//! Word-level matching shared by the analyzer and the selector.
//!
//! Text is lowercased and split into words made of alphanumerics,
//! apostrophes, and hyphens. A term (single word or phrase) matches when its
//! words appear contiguously. Matching is case-insensitive and never
//! matches inside a word ("team" does not match "teams").

/// Tokenized, lowercased text.
#[derive(Debug, Clone)]
pub struct Words {
    words: Vec<String>,
}

impl Words {
    pub fn new(text: &str) -> Self {
        Self {
            words: split_words(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether `term` occurs as a contiguous word sequence.
    pub fn contains(&self, term: &str) -> bool {
        let needle = split_words(term);
        if needle.is_empty() || needle.len() > self.words.len() {
            return false;
        }
        self.words
            .windows(needle.len())
            .any(|window| window == needle.as_slice())
    }
}

fn split_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['\u{2018}', '\u{2019}'], "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|w| w.trim_matches(|c| c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
