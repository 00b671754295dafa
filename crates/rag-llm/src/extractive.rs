//! Offline generator that quotes the best passage.

use async_trait::async_trait;

use rag_core::{ContextWindow, Generator, Result};

use crate::prompt::NO_INFORMATION;

/// Marker separating question and answer in knowledge-base passages.
const ANSWER_MARKER: &str = "\nAnswer: ";

/// Answers with the highest-ranked excerpt.
///
/// Knowledge-base passages (`Question: ...\nAnswer: ...`) are reduced to
/// their answer. An empty context yields [`NO_INFORMATION`].
#[derive(Debug, Clone, Default)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, _query: &str, context: &ContextWindow) -> Result<String> {
        let Some(best) = context.excerpts().first() else {
            return Ok(NO_INFORMATION.to_string());
        };

        let answer = match best.text.split_once(ANSWER_MARKER) {
            Some((_, answer)) => answer,
            None => best.text.as_str(),
        };
        Ok(answer.trim().to_string())
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::{Budget, DocId, Excerpt};

    fn window(texts: &[&str]) -> ContextWindow {
        let mut window = ContextWindow::new(Budget::chars(1000));
        for (i, text) in texts.iter().enumerate() {
            window.try_push(Excerpt {
                doc_id: DocId(i as u64),
                text: text.to_string(),
                score: 1.0,
            });
        }
        window
    }

    #[tokio::test]
    async fn test_quotes_answer_of_best_passage() {
        let context = window(&[
            "Question: How do refunds work?\nAnswer: Refunds are issued within 30 days.",
            "Question: Other?\nAnswer: Other.",
        ]);
        let answer = ExtractiveGenerator::new()
            .generate("refunds", &context)
            .await
            .unwrap();
        assert_eq!(answer, "Refunds are issued within 30 days.");
    }

    #[tokio::test]
    async fn test_plain_passage_returned_whole() {
        let context = window(&["cats are mammals"]);
        let answer = ExtractiveGenerator::new()
            .generate("mammals", &context)
            .await
            .unwrap();
        assert_eq!(answer, "cats are mammals");
    }

    #[tokio::test]
    async fn test_empty_context() {
        let answer = ExtractiveGenerator::new()
            .generate("anything", &window(&[]))
            .await
            .unwrap();
        assert_eq!(answer, NO_INFORMATION);
    }
}
