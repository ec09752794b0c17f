//! Operator input for the interactive auth menu.

use crate::error::auth::AuthError;

use std::io::IsTerminal;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, stdin, stdout};

/// Line-oriented question/answer channel with the operator.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask a question and wait for one line. `None` means input is closed.
    async fn ask(&mut self, question: &str) -> Result<Option<String>, AuthError>;

    /// Show an informational line.
    async fn say(&mut self, line: &str) -> Result<(), AuthError>;
}

/// Whether stdin is attached to a terminal someone can type into.
pub fn stdin_is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Prompter over the process's own stdin/stdout.
pub struct StdinPrompter {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(stdin()).lines(),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn ask(&mut self, question: &str) -> Result<Option<String>, AuthError> {
        let mut out = stdout();
        out.write_all(question.as_bytes()).await?;
        out.flush().await?;

        Ok(self.lines.next_line().await?)
    }

    async fn say(&mut self, line: &str) -> Result<(), AuthError> {
        let mut out = stdout();
        out.write_all(format!("{line}\n").as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}
