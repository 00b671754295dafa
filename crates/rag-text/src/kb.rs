//! Knowledge base parser.
//!
//! Reads the plain-text Q&A format the document store exports:
//!
//! ```text
//! Q: How do I reset my password?
//! A: Use the "Forgot password" link on the login page.
//!
//! Q: What payment methods are accepted?
//! A: Credit card and wire transfer.
//! ```
//!
//! A block starts at a line beginning with `Q:`; the answer starts at the
//! first `A:` in the block that begins a line or follows whitespace.

use std::path::Path;

use tracing::{debug, info};

use rag_core::{DocId, RagError, Result, SourceDocument};

/// One question/answer pair. Each pair is indexed as one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    /// Ordinal of the block in the file, starting at 0.
    pub id: u64,
    pub question: String,
    pub answer: String,
}

impl QaPair {
    /// Text indexed for this pair; both halves are searchable.
    pub fn to_text(&self) -> String {
        format!("Question: {}\nAnswer: {}", self.question, self.answer)
    }

    /// Convert into a document for the corpus index.
    pub fn to_source_document(&self) -> SourceDocument {
        SourceDocument::new(DocId(self.id), self.to_text())
            .with_metadata("question", self.question.as_str())
            .with_metadata("answer", self.answer.as_str())
    }
}

/// Parse knowledge base text into Q&A pairs.
///
/// Blocks with an empty question or answer are skipped but still consume an
/// id, so ids stay stable when a block is fixed later. Text with no usable
/// pair is an error.
pub fn parse_knowledge_base(content: &str) -> Result<Vec<QaPair>> {
    let mut pairs = Vec::new();

    for (ordinal, block) in split_blocks(content).into_iter().enumerate() {
        let Some((question, answer)) = split_answer(block) else {
            debug!("Skipping block {} without an answer", ordinal);
            continue;
        };

        let question = clean_text(question);
        let answer = clean_text(answer);
        if question.is_empty() || answer.is_empty() {
            debug!("Skipping incomplete block {}", ordinal);
            continue;
        }

        pairs.push(QaPair {
            id: ordinal as u64,
            question,
            answer,
        });
    }

    if pairs.is_empty() {
        return Err(RagError::parse("No Q&A pairs found in knowledge base"));
    }

    info!("Parsed {} Q&A pairs from knowledge base", pairs.len());
    Ok(pairs)
}

/// Read and parse a knowledge base file.
pub fn load_knowledge_base(path: impl AsRef<Path>) -> Result<Vec<QaPair>> {
    let path = path.as_ref();
    info!("Loading knowledge base from {:?}", path);
    let content = std::fs::read_to_string(path)?;
    parse_knowledge_base(&content)
}

/// Split into blocks, each holding the text after a line-leading `Q:`.
fn split_blocks(content: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if line[indent..].starts_with("Q:") {
            starts.push(offset + indent + 2);
        }
        offset += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            // The next block's "Q:" marker sits 2 bytes before its start.
            let end = starts.get(i + 1).map(|next| next - 2).unwrap_or(content.len());
            &content[start..end]
        })
        .collect()
}

/// Split a block at its first `A:` marker.
fn split_answer(block: &str) -> Option<(&str, &str)> {
    let mut search_from = 0;
    while let Some(pos) = block[search_from..].find("A:") {
        let at = search_from + pos;
        let boundary = block[..at]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if boundary {
            return Some((&block[..at], &block[at + 2..]));
        }
        search_from = at + 2;
    }
    None
}

/// Collapse all whitespace runs to single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Summary statistics of a parsed knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBaseStats {
    pub total_pairs: usize,
    pub total_characters: usize,
    pub average_question_length: usize,
    pub average_answer_length: usize,
}

impl KnowledgeBaseStats {
    /// Compute statistics; all zero for an empty slice.
    pub fn from_pairs(pairs: &[QaPair]) -> Self {
        if pairs.is_empty() {
            return Self {
                total_pairs: 0,
                total_characters: 0,
                average_question_length: 0,
                average_answer_length: 0,
            };
        }

        let n = pairs.len();
        let total_characters = pairs.iter().map(|p| p.to_text().chars().count()).sum();
        let questions: usize = pairs.iter().map(|p| p.question.chars().count()).sum();
        let answers: usize = pairs.iter().map(|p| p.answer.chars().count()).sum();

        Self {
            total_pairs: n,
            total_characters,
            average_question_length: (questions as f64 / n as f64).round() as usize,
            average_answer_length: (answers as f64 / n as f64).round() as usize,
        }
    }
}
