//! Text analyzers for the lexical index
//!
//! Pipeline for `standard`: UAX#29 word boundaries → strip non-alphanumeric
//! → lowercase. `english` additionally strips possessives and drops
//! stopwords. `whitespace` splits on whitespace and keeps case.

use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::StoreError;

/// Standard English stopwords (Lucene's default set).
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

#[inline]
fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Strip English possessive suffix (`'s` / `\u{2019}s`).
#[inline]
fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("\u{2019}s"))
        .unwrap_or(word)
}

/// Analyzer named in a collection's lexical options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyzer {
    /// Word boundaries, lowercase
    Standard,
    /// Standard plus possessive stripping and stopword removal
    English,
    /// Whitespace split, case preserved
    Whitespace,
}

impl FromStr for Analyzer {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "standard" => Ok(Analyzer::Standard),
            "english" => Ok(Analyzer::English),
            "whitespace" => Ok(Analyzer::Whitespace),
            other => Err(StoreError::InvalidQuery(format!(
                "unknown analyzer '{}'",
                other
            ))),
        }
    }
}

impl Analyzer {
    /// Tokenize text into index terms.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_storage::Analyzer;
    ///
    /// let tokens = Analyzer::English.tokenize("The Monkey's banana");
    /// assert_eq!(tokens, vec!["monkey", "banana"]);
    /// ```
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        match self {
            Analyzer::Whitespace => text.split_whitespace().map(String::from).collect(),
            Analyzer::Standard => text
                .unicode_words()
                .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
                .map(|w| w.to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Analyzer::English => text
                .unicode_words()
                .map(strip_possessive)
                .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
                .map(|w| w.to_lowercase())
                .filter(|s| !s.is_empty())
                .filter(|s| !is_stopword(s))
                .collect(),
        }
    }

    /// Tokenize and deduplicate, keeping first-seen order (query side).
    pub fn tokenize_unique(&self, text: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tokenize(text)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}
