//! Prompt construction.

use rag_core::ContextWindow;

/// Reply the model is told to give when the context does not cover the
/// question.
pub const NO_INFORMATION: &str = "I don't have information about that in my knowledge base.";

/// Context block used when retrieval found nothing.
pub const EMPTY_CONTEXT: &str = "No relevant information found in the knowledge base.";

/// Sequences that end generation.
pub const STOP_SEQUENCES: &[&str] = &["Question:", "\n\n\n"];

const SYSTEM_PROMPT: &str = "You are a helpful support assistant.\n\n\
Answer the user's question based ONLY on the knowledge base passages below.\n\n\
RULES:\n\
1. Only use information from the passages below\n\
2. Be concise and direct\n\
3. If you are not sure, say so; never make up information\n\
4. If the passages do not cover the question, respond with: \"I don't have information about that in my knowledge base.\"";

/// Format the retrieved context for the model.
pub fn context_block(query: &str, context: &ContextWindow) -> String {
    if context.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }
    format!(
        "Here are the most relevant passages for the query '{}':\n\n{}",
        query,
        context.render()
    )
}

/// Full prompt: instructions, context block, then the question.
pub fn build_prompt(query: &str, context: &ContextWindow) -> String {
    format!(
        "{}\n\nKNOWLEDGE BASE:\n{}\n\nQuestion: {}\n\nAnswer:",
        SYSTEM_PROMPT,
        context_block(query, context),
        query.trim()
    )
}
