//! Two-part response format: narrative text, the delimiter, then a JSON
//! array of A2UI messages.

pub mod codec;

pub use codec::{Candidate, DELIMITER, ExtractionError, extract, render};

/// MIME type tagging A2UI messages in outbound data parts.
pub const A2UI_MIME_TYPE: &str = "application/json+a2ui";
