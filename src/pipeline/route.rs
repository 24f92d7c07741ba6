//! Routing from classification to extractor variant.

use serde::Serialize;
use std::fmt;

use super::Classification;
use super::error::StageError;

/// Extraction strategy selected for a classified document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorVariant {
    /// Kindle annotation exports.
    KindleExport,
    /// Curated vocabulary lists.
    VocabularyList,
    /// Running prose.
    ArticleProse,
}

impl ExtractorVariant {
    /// Every variant in routing order.
    pub const ALL: [ExtractorVariant; 3] = [
        ExtractorVariant::VocabularyList,
        ExtractorVariant::KindleExport,
        ExtractorVariant::ArticleProse,
    ];

    /// Total mapping from classification to extractor.
    pub const fn for_classification(classification: Classification) -> Self {
        match classification {
            Classification::VocabList => Self::VocabularyList,
            Classification::KindleNotesExport => Self::KindleExport,
            Classification::ArticleProse => Self::ArticleProse,
        }
    }

    /// Stable kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KindleExport => "kindle-export",
            Self::VocabularyList => "vocabulary-list",
            Self::ArticleProse => "article-prose",
        }
    }
}

impl fmt::Display for ExtractorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route a record's classification. An unset classification is an unknown document type.
pub fn route(classification: Option<Classification>) -> Result<ExtractorVariant, StageError> {
    classification
        .map(ExtractorVariant::for_classification)
        .ok_or_else(|| StageError::UnknownDocType("<unset>".into()))
}

/// Route a raw label. Only exact enumeration members are routable.
pub fn route_label(label: &str) -> Result<ExtractorVariant, StageError> {
    label
        .parse::<Classification>()
        .map(ExtractorVariant::for_classification)
        .map_err(|error| StageError::UnknownDocType(error.0))
}
