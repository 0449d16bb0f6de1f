//! Binary entrypoint for the chat history command-line tool.

use std::process::ExitCode;

use chat_history::start_chat_history;

/// Load config, open the store, and run one read command.
fn main() -> ExitCode {
    start_chat_history::run()
}
