//! Extractor variants and the dispatch table the orchestrator selects them from.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::DocumentInput;
use super::error::StageError;
use super::prompts::{
    ARTICLE_PROSE_EXTRACTION, KINDLE_EXPORT_EXTRACTION, PromptPair, VOCAB_LIST_EXTRACTION,
};
use super::route::ExtractorVariant;
use crate::generation::{DecodingParams, GenerationError, GenerationRequest, TextGenerator};

/// Shared contract of every extraction strategy.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Variant this extractor implements.
    fn variant(&self) -> ExtractorVariant;

    /// Return the raw comma-separated term string. The output is untrusted and may be empty.
    async fn extract(&self, document: DocumentInput<'_>) -> Result<String, GenerationError>;
}

async fn prompted_extract(
    generator: &dyn TextGenerator,
    prompts: PromptPair,
    max_tokens: u32,
    document: DocumentInput<'_>,
) -> Result<String, GenerationError> {
    generator
        .generate(GenerationRequest {
            system: prompts.system,
            user: prompts.user,
            document,
            decoding: DecodingParams::greedy(max_tokens),
        })
        .await
}

macro_rules! prompted_extractor {
    ($(#[$doc:meta])* $name:ident, $variant:expr, $prompts:expr) => {
        $(#[$doc])*
        pub struct $name {
            generator: Arc<dyn TextGenerator>,
            max_tokens: u32,
        }

        impl $name {
            /// Build the extractor with the given output budget.
            pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
                Self {
                    generator,
                    max_tokens,
                }
            }
        }

        #[async_trait]
        impl Extractor for $name {
            fn variant(&self) -> ExtractorVariant {
                $variant
            }

            async fn extract(
                &self,
                document: DocumentInput<'_>,
            ) -> Result<String, GenerationError> {
                prompted_extract(self.generator.as_ref(), $prompts, self.max_tokens, document).await
            }
        }
    };
}

prompted_extractor!(
    /// Pulls highlighted words and idioms out of Kindle annotation exports.
    KindleExportExtractor,
    ExtractorVariant::KindleExport,
    KINDLE_EXPORT_EXTRACTION
);

prompted_extractor!(
    /// Lifts the listed terms verbatim, preserving order and casing.
    VocabularyListExtractor,
    ExtractorVariant::VocabularyList,
    VOCAB_LIST_EXTRACTION
);

prompted_extractor!(
    /// Picks in-context vocabulary and idioms out of prose.
    ArticleProseExtractor,
    ExtractorVariant::ArticleProse,
    ARTICLE_PROSE_EXTRACTION
);

/// Dispatch table from variant to extractor.
#[derive(Clone, Default)]
pub struct ExtractorTable {
    extractors: HashMap<ExtractorVariant, Arc<dyn Extractor>>,
}

impl ExtractorTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the three prompted extractors over one generator.
    pub fn standard(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self::new()
            .with(Arc::new(KindleExportExtractor::new(
                generator.clone(),
                max_tokens,
            )))
            .with(Arc::new(VocabularyListExtractor::new(
                generator.clone(),
                max_tokens,
            )))
            .with(Arc::new(ArticleProseExtractor::new(generator, max_tokens)))
    }

    /// Register an extractor under its own variant, replacing any previous entry.
    pub fn with(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.insert(extractor.variant(), extractor);
        self
    }

    /// Look up the extractor for a variant. A missing entry is an unknown document type.
    pub fn get(&self, variant: ExtractorVariant) -> Result<Arc<dyn Extractor>, StageError> {
        self.extractors
            .get(&variant)
            .cloned()
            .ok_or_else(|| StageError::UnknownDocType(variant.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DocumentFormat;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        systems: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
            self.systems
                .lock()
                .expect("lock")
                .push(request.system.to_string());
            assert_eq!(request.decoding.max_tokens, 4096);
            Ok("Alpha,beta,alpha".into())
        }
    }

    fn document() -> DocumentInput<'static> {
        DocumentInput {
            format: DocumentFormat::Html,
            name: "notes.html",
            content: b"<div class=\"noteText\">laconic</div>",
        }
    }

    #[tokio::test]
    async fn standard_table_covers_every_variant_with_its_own_prompt() {
        let generator = Arc::new(RecordingGenerator::default());
        let table = ExtractorTable::standard(generator.clone(), 4096);

        for variant in ExtractorVariant::ALL {
            let extractor = table.get(variant).expect("registered");
            assert_eq!(extractor.variant(), variant);
            let raw = extractor.extract(document()).await.expect("extracted");
            assert_eq!(raw, "Alpha,beta,alpha");
        }

        let systems = generator.systems.lock().expect("lock");
        assert_eq!(
            systems.as_slice(),
            [
                VOCAB_LIST_EXTRACTION.system,
                KINDLE_EXPORT_EXTRACTION.system,
                ARTICLE_PROSE_EXTRACTION.system,
            ]
        );
    }

    #[test]
    fn missing_entry_is_unknown_doc_type() {
        let table = ExtractorTable::new();
        let error = table
            .get(ExtractorVariant::KindleExport)
            .err()
            .expect("missing");
        assert!(matches!(error, StageError::UnknownDocType(name) if name == "kindle-export"));
    }
}
