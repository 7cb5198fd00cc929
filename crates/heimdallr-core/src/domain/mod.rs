//! Heimdallr domain model.
//!
//! # Module layout
//!
//! - [`category`]: `Category`
//! - [`classification`]: `ClassificationResult`
//! - [`result`]: `AnalysisResult`
//! - [`error`]: `HeimdallrError`, `Result`

pub mod category;
pub mod classification;
pub mod error;
pub mod result;

pub use category::Category;
pub use classification::{clamp_confidence, ClassificationResult};
pub use error::{HeimdallrError, Result};
pub use result::AnalysisResult;
