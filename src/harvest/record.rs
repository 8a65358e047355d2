use chrono::{DateTime, Utc};

pub const UNKNOWN_AUTHOR: &str = "Desconocido";

/// Characters of comment text compared under [`TextMatch::Prefix`] by default.
pub const TEXT_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub author: String,
    pub avatar_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// Set when the source date text could not be parsed and `timestamp`
    /// holds the extraction-time clock instead. Never persisted.
    pub degraded: bool,
}

/// How much of the comment body takes part in the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMatch {
    #[default]
    Exact,
    Prefix(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey<'a> {
    author: &'a str,
    timestamp: DateTime<Utc>,
    text: &'a str,
}

fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl CommentRecord {
    fn compared_text(&self, mode: TextMatch) -> &str {
        match mode {
            TextMatch::Exact => self.text.as_str(),
            TextMatch::Prefix(max_chars) => char_prefix(&self.text, max_chars),
        }
    }

    pub fn identity(&self, mode: TextMatch) -> IdentityKey<'_> {
        IdentityKey {
            author: &self.author,
            timestamp: self.timestamp,
            text: self.compared_text(mode),
        }
    }

    /// Same author and same compared text, whatever the timestamps say.
    pub fn same_content(&self, other: &CommentRecord, mode: TextMatch) -> bool {
        self.author == other.author && self.compared_text(mode) == other.compared_text(mode)
    }
}
