//! Line-oriented operator prompts

use crate::worker::Interrupted;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

/// Source of operator answers and sink for console messages
#[async_trait]
pub trait Prompter: Send {
    /// Show `label` and read one line. `None` means input is closed.
    async fn read_line(&mut self, label: &str) -> Result<Option<String>>;

    /// Print a message to the operator
    fn say(&mut self, text: &str);
}

/// Prompter reading lines from stdin (or any async reader) and printing to stdout
pub struct TerminalPrompter<R = Stdin> {
    lines: Lines<BufReader<R>>,
    cancel: CancellationToken,
}

impl TerminalPrompter {
    /// Reads are abandoned with [`Interrupted`] once `cancel` fires.
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_reader(tokio::io::stdin(), cancel)
    }
}

impl<R: AsyncRead + Unpin + Send> TerminalPrompter<R> {
    pub fn with_reader(reader: R, cancel: CancellationToken) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            cancel,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Prompter for TerminalPrompter<R> {
    async fn read_line(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}: ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        // Once cancelled, buffered input is never consumed
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted.into()),
            line = self.lines.next_line() => line.context("Failed to read from stdin"),
        }
    }

    fn say(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Ask the operator to pick one of `options` by number.
///
/// Returns the zero-based index, or `None` when input is closed.
pub async fn choose(
    prompter: &mut dyn Prompter,
    title: &str,
    options: &[String],
) -> Result<Option<usize>> {
    prompter.say(title);
    for (i, option) in options.iter().enumerate() {
        prompter.say(&format!("  {}) {option}", i + 1));
    }

    loop {
        let Some(answer) = prompter.read_line("Choice").await? else {
            return Ok(None);
        };
        match answer.trim().parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(n - 1)),
            _ => prompter.say(&format!(
                "Enter a number between 1 and {}.",
                options.len()
            )),
        }
    }
}

/// Yes/No question. Closed input counts as "No".
pub async fn confirm(prompter: &mut dyn Prompter, question: &str) -> Result<bool> {
    let options = ["Yes".to_string(), "No".to_string()];
    Ok(choose(prompter, question, &options).await? == Some(0))
}

#[cfg(test)]
#[path = "prompt_test.rs"]
mod tests;
