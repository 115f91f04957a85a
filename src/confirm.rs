use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// The only input that lets a run write anything.
pub const AFFIRMATIVE: &str = "yes";

/// Source of the single go/no-go decision before a run mutates files.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Prompts on `output` and reads one line from `input`.
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptConfirm<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{prompt} Type '{AFFIRMATIVE}' to continue: ")
            .context("writing confirmation prompt")?;
        self.output.flush().context("flushing confirmation prompt")?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("reading confirmation")?;
        if read == 0 {
            // EOF counts as a refusal
            writeln!(self.output).ok();
            return Ok(false);
        }
        Ok(line.trim() == AFFIRMATIVE)
    }
}
