//! # Temporal Filter Module
//!
//! ## Purpose
//! Point-in-time validity filtering: a statute section version is only a
//! valid answer if it was in force on the query's as-of date.
//!
//! ## Input/Output Specification
//! - **Input**: a document's validity window and an as-of ISO date string
//! - **Output**: eligible / ineligible
//!
//! Bounds are dates, not timestamps, and are compared lexicographically;
//! ISO-8601 dates sort correctly as strings. An absent bound is unbounded in
//! that direction.

use crate::Document;
use chrono::Local;

/// Today's date as an ISO string; the default as-of date.
pub fn today() -> String {
    Local::now().date_naive().to_string()
}

/// Whether a document's validity window admits the as-of date.
///
/// Ineligible when `valid_from` is set and later than `as_of`, or `valid_to`
/// is set and earlier than `as_of`. Both bounds are inclusive.
pub fn temporally_valid(doc: &Document, as_of: &str) -> bool {
    if let Some(valid_from) = &doc.valid_from {
        if valid_from.as_str() > as_of {
            return false;
        }
    }
    if let Some(valid_to) = &doc.valid_to {
        if valid_to.as_str() < as_of {
            return false;
        }
    }
    true
}
