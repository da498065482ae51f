//! `diffscribe commit`: commit messages for staged changes.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::debug;

use super::{output, GenerationArgs};
use crate::git::GitRepository;
use crate::summary::Summarizer;

/// Commit command options.
#[derive(Parser)]
pub struct CommitCommand {
    /// Provider, model and config selection.
    #[command(flatten)]
    pub generation: GenerationArgs,

    /// Copies the chosen message to the clipboard.
    #[arg(long)]
    pub copy: bool,

    /// Commits the staged changes with the chosen message.
    #[arg(long, visible_alias = "apply")]
    pub commit: bool,
}

impl CommitCommand {
    /// Executes the commit command.
    pub async fn execute(self) -> Result<()> {
        let repo = GitRepository::open()?;
        let diff = repo.staged_diff()?;
        if diff.trim().is_empty() {
            bail!("No staged changes; stage files with `git add` first");
        }

        let resolved = self.generation.resolve()?;
        let streaming = resolved.settings.stream_output;
        let summarizer = Summarizer::new(&resolved.gateway, resolved.settings).with_fragment_sink(
            |fragment| {
                print!("{fragment}");
                let _ = io::stdout().flush();
            },
        );

        let result = summarizer.generate_commit(&diff).await?;
        if streaming {
            println!();
            println!();
        }
        output::print_variations(&result.variations)?;

        if !self.copy && !self.commit {
            return Ok(());
        }

        let stdin = io::stdin();
        let Some(index) = choose_variation(
            &result.variations,
            stdin.is_terminal(),
            &mut stdin.lock(),
        )?
        else {
            output::note("Cancelled")?;
            return Ok(());
        };
        let message = &result.variations[index];
        debug!(index, "Selected commit message");

        if self.copy {
            output::copy_to_clipboard(message)?;
            output::note("Copied to clipboard")?;
        }
        if self.commit {
            let oid = repo.commit_staged(message)?;
            output::note(&format!("Committed {}", &oid[..oid.len().min(8)]))?;
        }
        Ok(())
    }
}

/// Asks which variation to use when there is more than one.
///
/// `is_terminal` and `reader` are injected so tests can drive the function
/// without blocking on real stdin. Returns `None` when the user quits.
pub(crate) fn choose_variation(
    variations: &[String],
    is_terminal: bool,
    reader: &mut dyn BufRead,
) -> Result<Option<usize>> {
    if variations.len() <= 1 {
        return Ok(Some(0));
    }
    if !is_terminal {
        eprintln!("warning: stdin is not interactive, using the first message");
        return Ok(Some(0));
    }

    loop {
        print!("Use which message? [1-{}, q to quit] ", variations.len());
        io::stdout().flush()?;

        let mut input = String::new();
        if reader.read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim();
        if input.is_empty() {
            return Ok(Some(0));
        }
        if input.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match input.parse::<usize>() {
            Ok(n) if (1..=variations.len()).contains(&n) => return Ok(Some(n - 1)),
            _ => println!("Please enter a number between 1 and {}.", variations.len()),
        }
    }
}
