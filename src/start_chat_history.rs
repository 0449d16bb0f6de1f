//! Startup helpers for the `chat-history` binary.
//!
//! Loads configuration, opens the store, and answers one read command:
//!
//! ```text
//! chat-history conversations <owner>
//! chat-history messages <owner> <conversation-id> [--merge]
//! chat-history dump
//! ```

use std::io::Write;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::history::core::config::{CONFIG_ENV, HistoryConfig};
use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::{ConversationId, OwnerId};
use crate::history::engine::ConversationService;

/// Config file used when `CONFIG` does not name one.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const USAGE: &str = "usage: chat-history conversations <owner>\n       \
     chat-history messages <owner> <conversation-id> [--merge]\n       \
     chat-history dump";

/// A read command taken from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the owner's conversations.
    Conversations(OwnerId),
    /// List one conversation's messages.
    Messages {
        /// Owner the conversation must belong to.
        owner_id: OwnerId,
        /// Conversation to read.
        conversation_id: ConversationId,
        /// Reduce to the latest branch.
        merge: bool,
    },
    /// Dump every message in the store.
    Dump,
}

/// Parse the arguments following the program name.
///
/// # Errors
/// Returns a validation error for unknown commands or bad arguments.
pub fn parse_command(args: &[String]) -> HistoryResult<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["conversations", owner] => Ok(Command::Conversations(OwnerId::new(*owner)?)),
        ["messages", owner, conversation, rest @ ..] => {
            let merge = match rest {
                [] => false,
                ["--merge"] => true,
                _ => {
                    return Err(HistoryError::Validation(format!(
                        "unexpected arguments: {}",
                        rest.join(" ")
                    )));
                }
            };
            Ok(Command::Messages {
                owner_id: OwnerId::new(*owner)?,
                conversation_id: ConversationId::parse(conversation)?,
                merge,
            })
        }
        ["dump"] => Ok(Command::Dump),
        _ => Err(HistoryError::Validation("unrecognized command".to_string())),
    }
}

/// Execute `command` and write its JSON result to `out`.
///
/// # Errors
/// Returns storage, serialization, or I/O errors.
pub fn execute(
    service: &ConversationService,
    command: &Command,
    out: &mut impl Write,
) -> HistoryResult<()> {
    match command {
        Command::Conversations(owner_id) => {
            serde_json::to_writer_pretty(&mut *out, &service.list_conversations(owner_id)?)?;
        }
        Command::Messages {
            owner_id,
            conversation_id,
            merge,
        } => {
            let messages = service.get_conversation(owner_id, *conversation_id, *merge)?;
            serde_json::to_writer_pretty(&mut *out, &messages)?;
        }
        Command::Dump => {
            serde_json::to_writer_pretty(&mut *out, &service.list_all_messages()?)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Run the binary.
///
/// # Returns
/// `ExitCode::SUCCESS` on success, `1` on failure, `2` on a usage error.
#[must_use]
pub fn run() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match HistoryConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::from(1);
        }
    };

    init_tracing(&config);
    tracing::info!("Starting chat-history v{}", env!("CARGO_PKG_VERSION"));

    let service = match ConversationService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to open store: {e}");
            return ExitCode::from(1);
        }
    };

    let stdout = std::io::stdout();
    if let Err(e) = execute(&service, &command, &mut stdout.lock()) {
        tracing::error!("Command failed: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
///
/// Call once per process.
pub fn init_tracing(config: &HistoryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::history::core::message::NewMessage;
    use crate::history::storage::SqliteConversationStore;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command(&args(&["dump"])).unwrap(),
            Command::Dump
        );
        let id = ConversationId::new().to_string();
        let parsed = parse_command(&args(&["messages", "sam_pull", &id, "--merge"])).unwrap();
        assert!(matches!(parsed, Command::Messages { merge: true, .. }));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command(&args(&[])).is_err());
        assert!(parse_command(&args(&["messages", "sam_pull", "nope"])).is_err());
        let id = ConversationId::new().to_string();
        assert!(parse_command(&args(&["messages", "sam_pull", &id, "--fast"])).is_err());
    }

    #[test]
    fn test_init_tracing_installs_global_subscriber() {
        init_tracing(&HistoryConfig::default());
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_execute_writes_json() {
        let service =
            ConversationService::new(Arc::new(SqliteConversationStore::in_memory().unwrap()));
        let owner = OwnerId::new("sam_pull").unwrap();
        let root = NewMessage::new(ConversationId::new(), None);
        service.new_conversation(&owner, "conv1", root).unwrap();

        let mut out = Vec::new();
        execute(&service, &Command::Conversations(owner), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["name"], "conv1");
        assert_eq!(value[0]["user_id"], "sam_pull");
    }
}
