//! Instruction sets for the classifier and the extractor variants.

/// System and user instructions for one prompted call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPair {
    /// System instruction set.
    pub system: &'static str,
    /// User instruction preceding the document.
    pub user: &'static str,
}

/// Labels the dominant structure of a document.
pub const CLASSIFICATION: PromptPair = PromptPair {
    system: "You label documents by their dominant structure.
Answer with the label alone: no explanation, no code fences, no punctuation.
Short introductory or closing prose does not change the label.

Labels:
- VOCAB_LIST: mostly a list of vocabulary words or idiomatic phrases, one short entry per line, \
possibly numbered, bulleted or dashed, possibly with brief definitions or parts of speech.
- KINDLE_NOTES_EXPORT: a Kindle highlights or annotations export, with repeating metadata blocks \
such as \"Your Highlight on page ... | location ...\", \"Added on ...\" timestamps, or sections \
separated by \"==========\".
- ARTICLE_PROSE: continuous prose (an article, essay, story or post) where vocabulary only \
appears in context.

Output exactly one of: VOCAB_LIST | KINDLE_NOTES_EXPORT | ARTICLE_PROSE",
    user: "Classify the attached document.",
};

/// Extracts highlighted words and idioms from a Kindle annotation export.
pub const KINDLE_EXPORT_EXTRACTION: PromptPair = PromptPair {
    system: "You extract vocabulary from documents and respond with data only.
Users collect words and phrases they want to remember. The most common input is a Kindle \
annotations export in HTML: decide which highlighted passages are the vocabulary terms the reader \
marked and extract them. Other layouts must work as well.",
    user: "Extract vocabulary from the attached document.
1. A term is either a single word of at least 4 letters, or a short idiomatic phrase or common \
collocation such as \"out of hand\" or \"fits and starts\". Ignore full sentences and passages.
2. Strip leading and trailing punctuation from every term, in ASCII and Unicode forms: \
\u{2014} \u{2013} - ? ! . , ; : ' \" \u{201c} \u{201d} \u{2018} \u{2019} ) ( ] [ \u{ab} \u{bb}
3. After stripping, lowercase each term only to detect duplicates. Keep the first occurrence of \
each term with its original casing and drop later repeats.
4. Join the terms with commas and no space after a comma. Keep the spaces inside a phrase.
5. Reply with that single line and nothing else.",
};

/// Lifts entries out of a curated vocabulary list.
pub const VOCAB_LIST_EXTRACTION: PromptPair = PromptPair {
    system: "You are an extraction engine.
Return only the vocabulary terms and phrases of the supplied text, without numbering, bullets, \
part-of-speech tags or definitions.
- Keep the order in which terms appear.
- Do not deduplicate, translate, stem or change capitalization.
- Reply with a single plain-text line of comma-separated terms.
- No extra words, line breaks or code fences.",
    user: "Extract the vocabulary terms from the attached list as one comma-separated line.",
};

/// Picks notable words and idioms out of running prose.
pub const ARTICLE_PROSE_EXTRACTION: PromptPair = PromptPair {
    system: "You are an extraction engine.
Return only the notable vocabulary words, phrases and idiomatic expressions of the supplied \
text, without numbering, bullets, part-of-speech tags or definitions.
- Keep the order in which terms appear.
- Do not deduplicate, translate, stem or change capitalization.
- Reply with a single plain-text line of comma-separated terms.
- No extra words, line breaks or code fences.",
    user: "Extract the vocabulary words and idiomatic phrases from the attached article or prose \
passage as one comma-separated line.",
};
