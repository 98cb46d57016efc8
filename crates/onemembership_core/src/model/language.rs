//! Multilingual catalog records.

use serde::{Deserialize, Serialize};

/// Supported interface language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// ISO-like short code, e.g. `en`.
    pub code: String,
    /// Display name, unique across languages.
    pub name: String,
    /// Flag glyph shown next to the name.
    pub flag: String,
    /// Ascending sort key for language pickers.
    pub display_order: i64,
}

/// Translated value of one identifier in one language.
///
/// `(identifier, code)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub id: i64,
    pub identifier: String,
    pub code: String,
    pub value: String,
}
