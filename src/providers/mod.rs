//! Completion provider module for StickLLM
//!
//! This module contains the completion provider abstraction, the llama.cpp
//! implementation and [`complete`], the boundary that turns provider results
//! into terminal output and an optional reply.

pub mod base;
pub mod llama_cpp;

pub use base::{CompletionProvider, FragmentStream, HealthReport, Message, Role};
pub use llama_cpp::LlamaCppProvider;

use colored::Colorize;
use futures::StreamExt;
use std::io::Write;

/// Run one completion and write it to `out`
///
/// In streaming mode every fragment is written and flushed as soon as it
/// arrives, followed by a newline once the stream ends. Errors are reported
/// to `out` and turn into `None`; nothing is raised past this function.
///
/// # Returns
///
/// The full reply text, or `None` if the call failed
pub async fn complete<P, W>(provider: &P, prompt: &str, streaming: bool, out: &mut W) -> Option<String>
where
    P: CompletionProvider + ?Sized,
    W: Write,
{
    if !streaming {
        return match provider.complete_once(prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                report_error(out, &e);
                None
            }
        };
    }

    let mut stream = match provider.stream_completion(prompt).await {
        Ok(stream) => stream,
        Err(e) => {
            report_error(out, &e);
            return None;
        }
    };

    let mut full_response = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                let _ = write!(out, "{}", fragment);
                let _ = out.flush();
                full_response.push_str(&fragment);
            }
            Err(e) => {
                if !full_response.is_empty() {
                    let _ = writeln!(out);
                }
                report_error(out, &e);
                return None;
            }
        }
    }

    let _ = writeln!(out);
    tracing::debug!("Completion finished: {} bytes", full_response.len());
    Some(full_response)
}

fn report_error<W: Write>(out: &mut W, err: &anyhow::Error) {
    tracing::warn!("Completion failed: {}", err);
    let _ = writeln!(
        out,
        "{}",
        format!("Error communicating with server: {}", err).red()
    );
}
