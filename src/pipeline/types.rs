//! Core data types threaded through the extraction workflow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::store::PersistAck;

/// Locator of an uploaded object: container plus key.
///
/// The key is the idempotency key for persistence and the correlation key for every
/// checkpoint event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Bucket or container holding the object.
    pub bucket: String,
    /// Object key inside the bucket.
    pub key: String,
}

impl DocumentRef {
    /// Build a reference from a bucket and key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Partition key under which the result is persisted.
    pub fn pk(&self) -> &str {
        &self.key
    }

    /// Last path segment of the key, used as the document display name.
    pub fn file_name(&self) -> &str {
        self.key
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.key)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Closed set of document formats the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentFormat {
    /// HTML markup, including Kindle annotation exports.
    Html,
    /// Markdown source.
    Markdown,
    /// Plain text.
    Text,
    /// Portable Document Format.
    Pdf,
}

impl DocumentFormat {
    /// Canonical uppercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Markdown => "MARKDOWN",
            Self::Text => "TEXT",
            Self::Pdf => "PDF",
        }
    }

    /// Media type sent to generation providers.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::Markdown => "text/markdown",
            Self::Text => "text/plain",
            Self::Pdf => "application/pdf",
        }
    }

    /// Whether the content must be transported as binary rather than text.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominant structure of a document, as labelled by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// A curated list of terms, one entry per line.
    VocabList,
    /// Highlights and notes exported from a Kindle.
    KindleNotesExport,
    /// Continuous prose with vocabulary in context.
    ArticleProse,
}

impl Classification {
    /// Every member of the enumeration.
    pub const ALL: [Classification; 3] = [
        Classification::VocabList,
        Classification::KindleNotesExport,
        Classification::ArticleProse,
    ];

    /// Exact label the classifier must return.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VocabList => "VOCAB_LIST",
            Self::KindleNotesExport => "KINDLE_NOTES_EXPORT",
            Self::ArticleProse => "ARTICLE_PROSE",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label is not an exact enumeration member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl FromStr for Classification {
    type Err = UnknownLabel;

    /// Exact, case-sensitive match. Callers decide whether to trim first.
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == label)
            .ok_or_else(|| UnknownLabel(label.to_string()))
    }
}

/// Borrowed view of the document handed to the generation gateway.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    /// Derived format of the content.
    pub format: DocumentFormat,
    /// Display name of the document.
    pub name: &'a str,
    /// Raw document bytes.
    pub content: &'a [u8],
}

/// Accumulating record threaded through every workflow state.
///
/// Stages consume the record and return it with only their own fields overlaid. The
/// document reference cannot be changed after construction and the classification can be
/// written only once.
#[derive(Clone)]
pub struct WorkflowRecord {
    document_ref: DocumentRef,
    /// Uploader derived from the object key, when present.
    pub owner_id: Option<String>,
    /// Display name of the document.
    pub name: String,
    /// Derived format, set by the fetch stage.
    pub format: Option<DocumentFormat>,
    /// Raw content; emptied by `DropRawContent` once extraction consumed it.
    pub content: Vec<u8>,
    classification: Option<Classification>,
    /// Raw extractor output, replaced by the deduplicated list during post-processing.
    pub extracted_terms: Option<String>,
    /// Confirmation returned by the result store.
    pub persist_ack: Option<PersistAck>,
}

impl WorkflowRecord {
    /// Create the record for a freshly triggered workflow.
    pub fn new(document_ref: DocumentRef, owner_id: Option<String>) -> Self {
        let name = document_ref.file_name().to_string();
        Self {
            document_ref,
            owner_id,
            name,
            format: None,
            content: Vec::new(),
            classification: None,
            extracted_terms: None,
            persist_ack: None,
        }
    }

    /// Immutable document reference.
    pub fn document_ref(&self) -> &DocumentRef {
        &self.document_ref
    }

    /// Classification written by the classifier, if it ran.
    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    /// Overlay the fetched document.
    pub fn with_document(mut self, content: Vec<u8>, format: DocumentFormat, name: String) -> Self {
        self.content = content;
        self.format = Some(format);
        self.name = name;
        self
    }

    /// Overlay the classification. Returns the record unchanged in the error position when a
    /// classification is already present.
    pub fn with_classification(mut self, classification: Classification) -> Result<Self, Self> {
        if self.classification.is_some() {
            return Err(self);
        }
        self.classification = Some(classification);
        Ok(self)
    }

    /// Overlay the extracted (raw or clean) term string.
    pub fn with_extracted_terms(mut self, terms: String) -> Self {
        self.extracted_terms = Some(terms);
        self
    }

    /// Release the raw content after extraction.
    pub fn without_content(mut self) -> Self {
        self.content = Vec::new();
        self
    }

    /// Overlay the persistence confirmation.
    pub fn with_persist_ack(mut self, ack: PersistAck) -> Self {
        self.persist_ack = Some(ack);
        self
    }

    /// Document view for gateway calls. Format defaults to text until fetch has run.
    pub fn document_input(&self) -> DocumentInput<'_> {
        DocumentInput {
            format: self.format.unwrap_or(DocumentFormat::Text),
            name: &self.name,
            content: &self.content,
        }
    }
}

impl fmt::Debug for WorkflowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRecord")
            .field("document_ref", &self.document_ref)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("format", &self.format)
            .field("content_len", &self.content.len())
            .field("classification", &self.classification)
            .field("extracted_terms", &self.extracted_terms)
            .field("persist_ack", &self.persist_ack)
            .finish()
    }
}
