//! Input classification.
//!
//! - [`rules`]: deterministic keyword scoring
//! - [`engine`]: confidence-gated escalation to the task executor
//! - [`extract`]: post-classification pattern extraction

pub mod engine;
pub mod extract;
pub mod rules;

pub use engine::{Classifier, DEFAULT_ESCALATION_THRESHOLD};
pub use extract::{target_patterns, PatternExtractor};
pub use rules::{RuleClassifier, RuleScores};
