//! Input categories produced by the classifier.

use serde::{Deserialize, Serialize};

/// The five labels an input can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Alert,
    Ticket,
    LogQuery,
    Hybrid,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Alert,
        Category::Ticket,
        Category::LogQuery,
        Category::Hybrid,
        Category::Unknown,
    ];

    /// Stable lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Alert => "alert",
            Category::Ticket => "ticket",
            Category::LogQuery => "log_query",
            Category::Hybrid => "hybrid",
            Category::Unknown => "unknown",
        }
    }

    /// Map a free-form label onto a category.
    ///
    /// Matching is case-insensitive. `jira_issue` is accepted as an alias for
    /// [`Category::Ticket`]. Anything unrecognised maps to [`Category::Unknown`].
    pub fn from_label(label: &str) -> Category {
        match label.trim().to_ascii_lowercase().as_str() {
            "alert" => Category::Alert,
            "ticket" | "jira_issue" => Category::Ticket,
            "log_query" => Category::LogQuery,
            "hybrid" => Category::Hybrid,
            _ => Category::Unknown,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::domain::error::HeimdallrError;

    /// Strict parse used by the CLI; unlike [`Category::from_label`] it
    /// rejects unrecognised labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = Category::from_label(s);
        if category == Category::Unknown && !s.trim().eq_ignore_ascii_case("unknown") {
            return Err(crate::domain::error::HeimdallrError::InvalidConfig(format!(
                "unrecognised category: {s}"
            )));
        }
        Ok(category)
    }
}
