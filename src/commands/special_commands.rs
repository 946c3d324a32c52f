//! Special commands parser for interactive chat mode
//!
//! Input lines starting with `/` are parsed into a [`SpecialCommand`]
//! instead of being sent to the completion server. Command words match
//! exactly, so `/EXIT` is an unknown command. Arguments keep their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}. Type /help for available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}. Type /help to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Usage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Start a new session and make it active
    NewSession,

    /// Rename the active session
    Rename(String),

    /// Show id, name and creation time of the active session
    ShowSession,

    /// List the context files
    ShowContext,

    /// Add a file to the context list
    AddContext(String),

    /// Empty the context list
    ClearContext,

    /// Not a special command
    ///
    /// The input should be sent to the completion server as a user message.
    None,
}

const RENAME_USAGE: &str = "/rename <new session name>";
const CONTEXT_ADD_USAGE: &str = "/context add <file>";

/// Strip one pair of matching surrounding quotes
fn unquote(arg: &str) -> &str {
    let arg = arg.trim();
    for quote in ['"', '\''] {
        if arg.len() >= 2 && arg.starts_with(quote) && arg.ends_with(quote) {
            return arg[1..arg.len() - 1].trim();
        }
    }
    arg
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn no_argument(command: &str, rest: &str, cmd: SpecialCommand) -> Result<SpecialCommand, CommandError> {
    if rest.is_empty() {
        Ok(cmd)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: rest.to_string(),
        })
    }
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is
/// not a valid command, `CommandError::MissingArgument` if a required
/// argument is empty, and `CommandError::UnsupportedArgument` for extra or
/// invalid arguments.
///
/// # Examples
///
/// ```
/// use stickllm::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/rename Design notes").unwrap();
/// assert_eq!(cmd, SpecialCommand::Rename("Design notes".to_string()));
///
/// let cmd = parse_special_command("hello there").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/rename \"\"").is_err());
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (word, rest) = split_word(trimmed);

    match word {
        "/help" => no_argument("/help", rest, SpecialCommand::Help),
        "/exit" => no_argument("/exit", rest, SpecialCommand::Exit),
        "/new" => no_argument("/new", rest, SpecialCommand::NewSession),
        "/session" => no_argument("/session", rest, SpecialCommand::ShowSession),

        "/rename" => {
            let name = unquote(rest);
            if name.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/rename".to_string(),
                    usage: RENAME_USAGE.to_string(),
                })
            } else {
                Ok(SpecialCommand::Rename(name.to_string()))
            }
        }

        "/context" => {
            if rest.is_empty() {
                return Ok(SpecialCommand::ShowContext);
            }
            let (sub, sub_rest) = split_word(rest);
            match sub {
                "add" => {
                    let path = sub_rest;
                    if path.is_empty() {
                        Err(CommandError::MissingArgument {
                            command: "/context add".to_string(),
                            usage: CONTEXT_ADD_USAGE.to_string(),
                        })
                    } else {
                        Ok(SpecialCommand::AddContext(path.to_string()))
                    }
                }
                "clear" => no_argument("/context clear", sub_rest, SpecialCommand::ClearContext),
                _ => Err(CommandError::UnsupportedArgument {
                    command: "/context".to_string(),
                    arg: sub.to_string(),
                }),
            }
        }

        _ => Err(CommandError::UnknownCommand(word.to_string())),
    }
}

/// Help text for special commands
pub fn help_text() -> &'static str {
    r#"
StickLLM Commands:

/help                    - Show this help message
/exit                    - Exit the chat
/new                     - Start a new chat session
/rename <name>           - Rename current session
/session                 - Show current session info
/context                 - Show current context files
/context add <file>      - Add file to context
/context clear           - Clear all context files

Just type your message and press Enter to chat with the AI.
"#
}
