//! Termination sentinel detection.

/// Ends a conversation when a message's trailing word is the keyword.
///
/// Matching ignores trailing whitespace and ASCII case.
#[derive(Debug, Clone)]
pub struct TerminationSentinel {
    keyword: String,
}

impl TerminationSentinel {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Whether `content` ends with the keyword.
    pub fn matches(&self, content: &str) -> bool {
        if self.keyword.is_empty() {
            return false;
        }
        content
            .trim_end()
            .to_ascii_lowercase()
            .ends_with(&self.keyword)
    }
}

impl Default for TerminationSentinel {
    fn default() -> Self {
        Self::new("TERMINATE")
    }
}
