//! Test utilities for StickLLM
//!
//! Temporary storage and a scripted completion provider so the chat
//! controller can be exercised without a terminal or a server.

use crate::error::{Result, StickllmError};
use crate::providers::{CompletionProvider, FragmentStream, HealthReport};
use crate::storage::SqliteStorage;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Create a storage instance inside a fresh temporary directory
pub fn temp_storage() -> (SqliteStorage, TempDir) {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    let storage =
        SqliteStorage::new_with_path(dir.path().join("sessions.db")).expect("storage init");
    (storage, dir)
}

/// One scripted server reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream these fragments, then end
    Fragments(Vec<&'static str>),
    /// Stream these fragments, then fail mid-stream
    BrokenAfter(Vec<&'static str>),
    /// Fail before any fragment
    Refused,
}

/// Provider that replays scripted replies and records every prompt
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    fn next_reply(&self, prompt: &str) -> Reply {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or(Reply::Refused)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn probe_health(&self, _retries: u32, _wait: Duration) -> HealthReport {
        HealthReport {
            healthy: true,
            attempts: 1,
            waits: 0,
        }
    }

    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream> {
        match self.next_reply(prompt) {
            Reply::Fragments(parts) => {
                Ok(futures::stream::iter(parts.into_iter().map(|p| Ok(p.to_string()))).boxed())
            }
            Reply::BrokenAfter(parts) => {
                let items: Vec<Result<String>> = parts
                    .into_iter()
                    .map(|p| Ok(p.to_string()))
                    .chain(std::iter::once(Err(StickllmError::Network(
                        "connection reset".to_string(),
                    )
                    .into())))
                    .collect();
                Ok(futures::stream::iter(items).boxed())
            }
            Reply::Refused => Err(StickllmError::Network("connection refused".to_string()).into()),
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        match self.next_reply(prompt) {
            Reply::Fragments(parts) => Ok(parts.concat()),
            _ => Err(StickllmError::Network("connection refused".to_string()).into()),
        }
    }
}
