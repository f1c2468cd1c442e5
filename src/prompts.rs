//! Prompt templates for document chat and summaries.
//!
//! Every prompt sent to a backend is built here, so tests can inspect the
//! exact text without a live model.

/// Shown in place of the document body when no text was extracted.
pub const NO_CONTENT: &str = "No document content available.";

/// Shown in place of the tables section when the document has none.
pub const NO_TABLES: &str = "No tables available.";

/// Instruction placed in front of a summary excerpt.
pub const SUMMARY_INSTRUCTION: &str = "Summarize the following document content in 3-4 sentences:";

/// Prefix of every summary answer.
pub const SUMMARY_PREFIX: &str = "📝 **Summary:**";

/// Build the question-answering prompt.
///
/// `tables` is the already-rendered tables section; an empty string falls
/// back to [`NO_TABLES`].
pub fn build_chat_prompt(content: &str, tables: &str, question: &str) -> String {
    let content = if content.trim().is_empty() {
        NO_CONTENT
    } else {
        content
    };
    let tables = if tables.trim().is_empty() {
        NO_TABLES
    } else {
        tables
    };
    format!(
        "\nYou are a helpful assistant. Use the following document content to answer the question.\n\n\
Document Content:\n{content}\n\n\
Tables Extracted:\n{tables}\n\n\
User Question:\n{question}\n\n\
Answer the question based solely on the document above.\n"
    )
}

/// Build the summary prompt for an excerpt.
pub fn build_summary_prompt(excerpt: &str) -> String {
    format!("{SUMMARY_INSTRUCTION}\n\n{excerpt}")
}

/// Wrap a backend's summary text for display.
pub fn format_summary(text: &str) -> String {
    format!("{SUMMARY_PREFIX} {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_prompt_embeds_all_parts() {
        let p = build_chat_prompt("Revenue grew.", "[{\"0\":\"Q1\"}]", "How did revenue do?");
        assert!(p.contains("Document Content:\nRevenue grew."));
        assert!(p.contains("Tables Extracted:\n[{\"0\":\"Q1\"}]"));
        assert!(p.contains("User Question:\nHow did revenue do?"));
        assert!(p.contains("based solely on the document above"));
    }

    #[test]
    fn chat_prompt_falls_back_when_empty() {
        let p = build_chat_prompt("  ", "", "Anything?");
        assert!(p.contains(NO_CONTENT));
        assert!(p.contains(NO_TABLES));
    }

    #[test]
    fn summary_prompt_shape() {
        assert_eq!(
            build_summary_prompt("Abstract text"),
            "Summarize the following document content in 3-4 sentences:\n\nAbstract text"
        );
        assert_eq!(format_summary("Short."), "📝 **Summary:** Short.");
    }
}
