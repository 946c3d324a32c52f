//! Prompt assembly
//!
//! Builds the plain-text prompt sent to the completion server from the
//! persona, the context files and the conversation history.

use crate::providers::Message;
use std::path::Path;

/// Build the prompt for the next assistant turn
///
/// Context files are read on every call. A file that does not exist (or
/// cannot be read) at call time is skipped without a placeholder. The
/// prompt always ends with `"Assistant: "`, the generation cursor.
///
/// # Examples
///
/// ```
/// use stickllm::prompts::build_prompt;
/// use stickllm::providers::Message;
///
/// let history = vec![Message::user("hi"), Message::assistant("hello")];
/// let prompt = build_prompt("P", &[] as &[String], &history);
/// assert_eq!(prompt, "System: P\n\nUser: hi\n\nAssistant: hello\n\nAssistant: ");
/// ```
pub fn build_prompt<S: AsRef<str>>(persona: &str, context_files: &[S], history: &[Message]) -> String {
    let mut prompt = format!("System: {}\n\n", persona);

    if !context_files.is_empty() {
        prompt.push_str("Context Files:\n");
        for path in context_files {
            let path = path.as_ref();
            match std::fs::read_to_string(Path::new(path)) {
                Ok(contents) => {
                    prompt.push_str(&format!("\n--- {} ---\n{}\n", path, contents));
                }
                Err(e) => {
                    tracing::debug!("Skipping context file {}: {}", path, e);
                }
            }
        }
    }

    for message in history {
        prompt.push_str(&format!("{}: {}\n\n", message.role.label(), message.content));
    }

    prompt.push_str("Assistant: ");
    prompt
}
