//! Interactive chat state machine
//!
//! [`ChatController`] owns the active session, its in-memory history and
//! the context file list. It reads lines from a [`LineSource`], dispatches
//! special commands and turns everything else into a completion round trip
//! whose result is persisted through [`SqliteStorage`].

use crate::commands::special_commands::{help_text, parse_special_command, SpecialCommand};
use crate::context::ContextFiles;
use crate::error::{Result, StickllmError};
use crate::prompts::build_prompt;
use crate::providers::{self, CompletionProvider, Message, Role};
use crate::storage::SqliteStorage;
use chrono::Local;
use colored::Colorize;
use std::collections::VecDeque;
use std::io::Write;

/// One outcome of reading from the input source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line of input without its terminator
    Line(String),
    /// The user pressed Ctrl-C at the prompt
    Interrupted,
    /// Input is exhausted
    Eof,
}

/// Source of user input lines
pub trait LineSource {
    /// Show `prompt` and read one line
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;

    /// Record a submitted line in the editor history
    fn add_history(&mut self, _line: &str) {}
}

impl LineSource for rustyline::DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        use rustyline::error::ReadlineError;

        match self.readline(prompt) {
            Ok(line) => Ok(InputEvent::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(e) => Err(StickllmError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))
            .into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.add_history_entry(line) {
            tracing::debug!("Failed to record history entry: {}", e);
        }
    }
}

/// Fixed sequence of input events, ending in [`InputEvent::Eof`]
#[derive(Debug, Default)]
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
}

impl ScriptedInput {
    /// Build a script from plain lines
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            events: lines
                .into_iter()
                .map(|l| InputEvent::Line(l.into()))
                .collect(),
        }
    }

    /// Build a script from explicit events
    pub fn from_events(events: Vec<InputEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Result<InputEvent> {
        Ok(self.events.pop_front().unwrap_or(InputEvent::Eof))
    }
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// No session resolved yet
    NoSession,
    /// Waiting for the next input line
    AwaitingInput,
    /// A completion is in flight
    Processing,
    /// The loop has ended
    Exiting,
}

/// REPL state machine over a session store and a completion provider
pub struct ChatController<'a, P: CompletionProvider + ?Sized, W: Write> {
    storage: &'a SqliteStorage,
    provider: &'a P,
    persona: String,
    out: W,
    state: ChatState,
    session_id: Option<i64>,
    history: Vec<Message>,
    context: ContextFiles,
}

impl<'a, P: CompletionProvider + ?Sized, W: Write> ChatController<'a, P, W> {
    /// Create a controller in the [`ChatState::NoSession`] state
    pub fn new(storage: &'a SqliteStorage, provider: &'a P, persona: impl Into<String>, out: W) -> Self {
        Self {
            storage,
            provider,
            persona: persona.into(),
            out,
            state: ChatState::NoSession,
            session_id: None,
            history: Vec::new(),
            context: ContextFiles::new(),
        }
    }

    /// Resolve the active session and print the banner
    ///
    /// With `resume` the session's messages become the in-memory history;
    /// otherwise a new session is created, named `name` if given.
    ///
    /// # Errors
    ///
    /// Returns [`StickllmError::SessionNotFound`] if `resume` names a
    /// session that does not exist, or a storage error.
    pub fn start(&mut self, resume: Option<i64>, name: Option<&str>) -> Result<()> {
        match resume {
            Some(id) => {
                self.history = self.storage.load_messages(id)?;
                self.session_id = Some(id);
                tracing::info!("Resumed session {} ({} messages)", id, self.history.len());
                self.say(format!("Loaded session (ID: {})", id).green());
                self.say(format!("Previous messages: {}", self.history.len()).yellow());
            }
            None => {
                let id = self.storage.create_session(name, self.context.files())?;
                self.session_id = Some(id);
                self.history.clear();
                self.say(format!("Started new session (ID: {})", id).green());
                if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
                    self.say(format!("Name: {}", name).green());
                }
            }
        }

        self.state = ChatState::AwaitingInput;
        let _ = writeln!(self.out, "\n{}", "StickLLM Interactive Chat".bold());
        let _ = writeln!(
            self.out,
            "Type {} for commands, {} to quit\n",
            "/help".cyan(),
            "/exit".cyan()
        );
        Ok(())
    }

    /// Read and handle lines until `/exit` or end of input
    pub async fn run<L: LineSource + ?Sized>(&mut self, input: &mut L) -> Result<()> {
        let prompt = format!("{} ", "You:".blue());
        while self.state == ChatState::AwaitingInput {
            match input.read_line(&prompt)? {
                InputEvent::Line(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if !trimmed.starts_with('/') {
                        input.add_history(trimmed);
                    }
                    self.handle_line(trimmed).await;
                }
                InputEvent::Interrupted => {
                    self.say(format!("\n{}", "Use /exit to quit properly".yellow()));
                }
                InputEvent::Eof => {
                    tracing::debug!("End of input");
                    self.state = ChatState::Exiting;
                }
            }
        }
        Ok(())
    }

    /// Handle one non-empty input line
    pub async fn handle_line(&mut self, line: &str) {
        match parse_special_command(line) {
            Ok(SpecialCommand::None) => self.process_turn(line).await,
            Ok(cmd) => self.dispatch(cmd),
            Err(e) => self.say(e.to_string().red()),
        }
    }

    fn dispatch(&mut self, cmd: SpecialCommand) {
        tracing::debug!("Special command: {:?}", cmd);
        match cmd {
            SpecialCommand::Help => {
                let _ = writeln!(self.out, "{}", help_text());
            }
            SpecialCommand::Exit => {
                self.say("Goodbye!".yellow());
                self.state = ChatState::Exiting;
            }
            SpecialCommand::NewSession => {
                match self.storage.create_session(None, self.context.files()) {
                    Ok(id) => {
                        self.session_id = Some(id);
                        self.history.clear();
                        self.say(format!("Started new session (ID: {})", id).green());
                    }
                    Err(e) => self.report(&e),
                }
            }
            SpecialCommand::Rename(name) => {
                let Some(id) = self.session_id else {
                    return;
                };
                match self.storage.rename_session(id, &name) {
                    Ok(()) => self.say(format!("Session renamed to: {}", name).green()),
                    Err(e) => self.report(&e),
                }
            }
            SpecialCommand::ShowSession => {
                let Some(id) = self.session_id else {
                    return;
                };
                match self.storage.get_session(id) {
                    Ok(session) => {
                        self.say("Current Session:".cyan());
                        let _ = writeln!(self.out, "  ID: {}", session.id);
                        let _ = writeln!(self.out, "  Name: {}", session.name);
                        let _ = writeln!(
                            self.out,
                            "  Created: {}",
                            session
                                .created_at
                                .with_timezone(&Local)
                                .format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                    Err(e) => self.report(&e),
                }
            }
            SpecialCommand::ShowContext => {
                if self.context.is_empty() {
                    self.say("No context files loaded".yellow());
                } else {
                    self.say("Context files:".cyan());
                    for (i, path) in self.context.files().iter().enumerate() {
                        let _ = writeln!(self.out, "  {}. {}", i + 1, path);
                    }
                }
            }
            SpecialCommand::AddContext(path) => match self.context.add(&path) {
                Ok(added) => self.say(format!("Added to context: {}", added).green()),
                Err(e) => self.report(&e),
            },
            SpecialCommand::ClearContext => {
                self.context.clear();
                self.say("Context cleared".green());
            }
            SpecialCommand::None => {}
        }
    }

    /// Run one user turn
    ///
    /// The user message is stored before it joins the in-memory history; a
    /// storage failure there aborts the turn. A failed completion is never
    /// persisted.
    async fn process_turn(&mut self, text: &str) {
        let Some(id) = self.session_id else {
            return;
        };

        if let Err(e) = self.storage.append_message(id, Role::User, text) {
            self.report(&e);
            return;
        }
        self.history.push(Message::user(text));
        self.state = ChatState::Processing;

        let prompt = build_prompt(&self.persona, self.context.files(), &self.history);
        let _ = write!(self.out, "{} ", "Assistant:".green());
        let _ = self.out.flush();

        let reply = providers::complete(self.provider, &prompt, true, &mut self.out).await;
        match reply {
            Some(reply) if !reply.is_empty() => {
                if let Err(e) = self.storage.append_message(id, Role::Assistant, &reply) {
                    self.report(&e);
                }
                self.history.push(Message::assistant(reply));
            }
            Some(_) => tracing::debug!("Empty reply not stored"),
            None => tracing::debug!("Completion failed; turn not stored"),
        }

        let _ = writeln!(self.out);
        self.state = ChatState::AwaitingInput;
    }

    fn say(&mut self, line: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{}", line);
    }

    fn report(&mut self, err: &anyhow::Error) {
        tracing::warn!("Chat command failed: {}", err);
        self.say(err.to_string().red());
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Id of the active session
    pub fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    /// In-memory history of the active session
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Context files added in this process
    pub fn context_files(&self) -> &[String] {
        self.context.files()
    }

    /// The output sink
    pub fn output(&self) -> &W {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{temp_storage, Reply, ScriptedProvider};

    fn output_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).to_string()
    }

    #[tokio::test]
    async fn test_start_new_session_prints_banner() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        assert_eq!(ctl.state(), ChatState::NoSession);

        ctl.start(None, Some("Demo")).unwrap();

        assert_eq!(ctl.state(), ChatState::AwaitingInput);
        let id = ctl.session_id().unwrap();
        assert_eq!(storage.get_session(id).unwrap().name, "Demo");
        let out = output_text(ctl.output());
        assert!(out.contains(&format!("Started new session (ID: {})", id)));
        assert!(out.contains("Name: Demo"));
        assert!(out.contains("StickLLM Interactive Chat"));
    }

    #[tokio::test]
    async fn test_blank_name_gets_default_and_no_name_line() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());

        ctl.start(None, Some("  ")).unwrap();

        let id = ctl.session_id().unwrap();
        assert!(storage.get_session(id).unwrap().name.starts_with("Session "));
        assert!(!output_text(ctl.output()).contains("Name:"));
    }

    #[tokio::test]
    async fn test_show_session_prints_local_creation_time() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, Some("clock")).unwrap();
        let id = ctl.session_id().unwrap();

        ctl.handle_line("/session").await;

        let created = storage
            .get_session(id)
            .unwrap()
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        assert!(output_text(ctl.output()).contains(&format!("  Created: {}", created)));
    }

    #[tokio::test]
    async fn test_resume_loads_history() {
        let (storage, _dir) = temp_storage();
        let id = storage.create_session(Some("old"), &[]).unwrap();
        storage.append_message(id, Role::User, "hi").unwrap();
        storage.append_message(id, Role::Assistant, "hello").unwrap();

        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(Some(id), None).unwrap();

        assert_eq!(ctl.history(), &[Message::user("hi"), Message::assistant("hello")]);
        assert!(output_text(ctl.output()).contains("Previous messages: 2"));
    }

    #[tokio::test]
    async fn test_resume_missing_session_is_not_found() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());

        let err = ctl.start(Some(404), None).unwrap_err();
        assert!(StickllmError::is_not_found(&err));
        assert_eq!(ctl.state(), ChatState::NoSession);
    }

    #[tokio::test]
    async fn test_turn_streams_and_persists_both_messages() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::new(vec![Reply::Fragments(vec!["hel", "lo"])]);
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();
        let id = ctl.session_id().unwrap();

        let mut input = ScriptedInput::from_lines(["hi"]);
        ctl.run(&mut input).await.unwrap();

        assert_eq!(ctl.state(), ChatState::Exiting);
        assert_eq!(
            storage.load_messages(id).unwrap(),
            vec![Message::user("hi"), Message::assistant("hello")]
        );
        assert_eq!(provider.prompts(), vec!["System: P\n\nUser: hi\n\nAssistant: "]);
        assert!(output_text(ctl.output()).contains("hello"));
    }

    #[tokio::test]
    async fn test_second_turn_prompt_includes_previous_reply() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::new(vec![
            Reply::Fragments(vec!["hello"]),
            Reply::Fragments(vec!["fine"]),
        ]);
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();

        let mut input = ScriptedInput::from_lines(["hi", "how are you"]);
        ctl.run(&mut input).await.unwrap();

        let prompts = provider.prompts();
        assert_eq!(
            prompts[1],
            "System: P\n\nUser: hi\n\nAssistant: hello\n\nUser: how are you\n\nAssistant: "
        );
        assert_eq!(ctl.history().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_completion_keeps_user_message_only() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::new(vec![Reply::BrokenAfter(vec!["par"])]);
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();
        let id = ctl.session_id().unwrap();

        ctl.handle_line("hi").await;

        assert_eq!(ctl.state(), ChatState::AwaitingInput);
        assert_eq!(storage.load_messages(id).unwrap(), vec![Message::user("hi")]);
        assert_eq!(ctl.history(), &[Message::user("hi")]);
        assert!(output_text(ctl.output()).contains("Error communicating with server"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_not_persisted() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::new(vec![Reply::Fragments(vec![])]);
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();
        let id = ctl.session_id().unwrap();

        ctl.handle_line("hi").await;

        assert_eq!(storage.load_messages(id).unwrap().len(), 1);
        assert_eq!(ctl.history().len(), 1);
    }

    #[tokio::test]
    async fn test_exit_and_interrupt() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();

        let mut input = ScriptedInput::from_events(vec![
            InputEvent::Interrupted,
            InputEvent::Line("   ".to_string()),
            InputEvent::Line("/quit".to_string()),
            InputEvent::Line("/exit".to_string()),
            InputEvent::Line("never read".to_string()),
        ]);
        ctl.run(&mut input).await.unwrap();

        assert_eq!(ctl.state(), ChatState::Exiting);
        let out = output_text(ctl.output());
        assert!(out.contains("Use /exit to quit properly"));
        assert!(out.contains("Unknown command: /quit"));
        assert!(out.contains("Goodbye!"));
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_new_session_resets_history() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::new(vec![Reply::Fragments(vec!["ok"])]);
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();
        let first = ctl.session_id().unwrap();

        ctl.handle_line("hi").await;
        ctl.handle_line("/new").await;

        let second = ctl.session_id().unwrap();
        assert_ne!(first, second);
        assert!(ctl.history().is_empty());
        assert_eq!(storage.load_messages(first).unwrap().len(), 2);
        assert!(storage.load_messages(second).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_and_show_session() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, Some("before")).unwrap();
        let id = ctl.session_id().unwrap();

        ctl.handle_line("/rename \"\"").await;
        assert_eq!(storage.get_session(id).unwrap().name, "before");

        ctl.handle_line("/rename After Lunch").await;
        assert_eq!(storage.get_session(id).unwrap().name, "After Lunch");

        ctl.handle_line("/session").await;
        let out = output_text(ctl.output());
        assert!(out.contains("Usage: /rename <new session name>"));
        assert!(out.contains("Session renamed to: After Lunch"));
        assert!(out.contains("  Name: After Lunch"));
    }

    #[tokio::test]
    async fn test_context_commands() {
        let (storage, dir) = temp_storage();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "remember this").unwrap();

        let provider = ScriptedProvider::new(vec![Reply::Fragments(vec!["noted"])]);
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();

        ctl.handle_line("/context").await;
        ctl.handle_line("/context add missing-context-file.txt").await;
        assert!(ctl.context_files().is_empty());

        ctl.handle_line(&format!("/context add {}", notes.display())).await;
        assert_eq!(ctl.context_files().len(), 1);
        ctl.handle_line("/context").await;

        ctl.handle_line("hi").await;
        assert!(provider.prompts()[0].contains("remember this"));

        ctl.handle_line("/context clear").await;
        assert!(ctl.context_files().is_empty());

        let out = output_text(ctl.output());
        assert!(out.contains("No context files loaded"));
        assert!(out.contains("File not found: missing-context-file.txt"));
        assert!(out.contains("  1. "));
        assert!(out.contains("Context cleared"));
    }

    #[tokio::test]
    async fn test_unknown_command_does_not_reach_provider() {
        let (storage, _dir) = temp_storage();
        let provider = ScriptedProvider::default();
        let mut ctl = ChatController::new(&storage, &provider, "P", Vec::new());
        ctl.start(None, None).unwrap();

        ctl.handle_line("/summarize").await;

        assert_eq!(ctl.state(), ChatState::AwaitingInput);
        assert!(provider.prompts().is_empty());
        assert!(output_text(ctl.output()).contains("Unknown command: /summarize"));
    }
}
