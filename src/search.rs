//! Book title search: query tokenizing and result ranking.
//!
//! The database filters and ranks before applying the result limit, so a
//! large match set never drops a better-ranked title. The same ranking is
//! applied again in memory to order ties independently of collation.

use std::cmp::Reverse;

/// Tokens beyond this are ignored
pub const MAX_TOKENS: usize = 10;

/// A normalized title query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerms {
    phrase: String,
    tokens: Vec<String>,
}

impl SearchTerms {
    /// Lower-case the query, collapse whitespace and split it into unique
    /// tokens. Returns `None` when nothing searchable remains.
    pub fn parse(query: &str) -> Option<Self> {
        let phrase = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut tokens: Vec<String> = Vec::new();
        for token in phrase.split(' ').filter(|t| !t.is_empty()) {
            if tokens.len() == MAX_TOKENS {
                break;
            }
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }

        if tokens.is_empty() {
            None
        } else {
            Some(Self { phrase, tokens })
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// `LIKE` patterns matching each token anywhere in a lower-cased title
    pub fn like_patterns(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| format!("%{}%", escape_like(t)))
            .collect()
    }

    /// `LIKE` pattern for titles starting with the whole query
    pub fn phrase_prefix_pattern(&self) -> String {
        format!("{}%", escape_like(&self.phrase))
    }

    /// `LIKE` patterns for titles starting with each token
    pub fn prefix_patterns(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| format!("{}%", escape_like(t)))
            .collect()
    }

    /// Sort key for a title, smaller sorts first.
    ///
    /// Titles starting with the whole query come first, then titles starting
    /// with any single token, then the rest; ties go to the title matching
    /// more tokens.
    pub fn rank(&self, title: &str) -> (u8, Reverse<usize>) {
        let title = title.to_lowercase();

        let tier = if title.starts_with(&self.phrase) {
            0
        } else if self.tokens.iter().any(|t| title.starts_with(t.as_str())) {
            1
        } else {
            2
        };
        let matched = self
            .tokens
            .iter()
            .filter(|t| title.contains(t.as_str()))
            .count();

        (tier, Reverse(matched))
    }

    /// Order `items` by rank, then alphabetically by title
    pub fn sort_by_rank<T, F>(&self, items: &mut [T], title: F)
    where
        F: Fn(&T) -> &str,
    {
        items.sort_by_cached_key(|item| {
            let title = title(item);
            (self.rank(title), title.to_lowercase())
        });
    }
}

/// Escape `LIKE` metacharacters; patterns are used with `ESCAPE '\'`
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
