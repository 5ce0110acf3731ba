//! Bug-fix commit classification from commit message keywords.

use crate::mining::CommitInfo;

/// Flags commits whose message mentions any of a set of keywords.
///
/// Matching is a case-insensitive substring test, so `"FIX"` also matches
/// `"prefix"`. The keyword list comes from configuration.
///
/// # Examples
///
/// ```
/// use cochange_history::classify::BugFixClassifier;
///
/// let classifier = BugFixClassifier::new(["fix", "bug"]);
/// assert!(classifier.is_bug_fix("Fixed NPE in parser"));
/// assert!(!classifier.is_bug_fix("Add ISO chronology"));
/// ```
#[derive(Debug, Clone)]
pub struct BugFixClassifier {
    keywords: Vec<String>,
}

impl BugFixClassifier {
    /// Create a classifier for the given keywords. Blank keywords are ignored.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_uppercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Whether `message` marks a bug-fix commit.
    pub fn is_bug_fix(&self, message: &str) -> bool {
        let upper = message.to_uppercase();
        self.keywords.iter().any(|k| upper.contains(k.as_str()))
    }

    /// Classify a mined commit by its message.
    pub fn classify(&self, commit: &CommitInfo) -> bool {
        self.is_bug_fix(&commit.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive() {
        let classifier = BugFixClassifier::new(["FIX"]);
        assert!(classifier.is_bug_fix("fix typo"));
        assert!(classifier.is_bug_fix("HOTFIX for release"));
        assert!(classifier.is_bug_fix("Prefix handling"));
    }

    #[test]
    fn blank_keywords_never_match() {
        let classifier = BugFixClassifier::new(["", "  "]);
        assert!(!classifier.is_bug_fix("anything at all"));
    }

    #[test]
    fn default_keywords_cover_maintenance_verbs() {
        let classifier =
            BugFixClassifier::new(cochange_core::HistoryConfig::default().bug_fix_keywords);
        assert!(classifier.is_bug_fix("Update tz data to 2016a"));
        assert!(classifier.is_bug_fix("Remove deprecated method"));
        assert!(!classifier.is_bug_fix("Add Chronology docs"));
    }
}
