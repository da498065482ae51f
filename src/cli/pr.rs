//! `diffscribe pr`: pull request title and description from recent commits.

use std::io::{self, Write};

use anyhow::{bail, Result};
use clap::builder::TypedValueParser;
use clap::Parser;
use tracing::{debug, info};

use super::{output, GenerationArgs};
use crate::git::GitRepository;
use crate::summary::{PrInput, Summarizer};

/// PR command options.
#[derive(Parser)]
pub struct PrCommand {
    /// Provider, model and config selection.
    #[command(flatten)]
    pub generation: GenerationArgs,

    /// Number of most recent commits to describe.
    #[arg(
        long,
        short = 'n',
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize)
    )]
    pub commits: usize,

    /// Opens the pull request with the GitHub CLI.
    #[arg(long)]
    pub create: bool,

    /// Copies the rendered pull request to the clipboard.
    #[arg(long)]
    pub copy: bool,
}

impl PrCommand {
    /// Executes the PR command.
    pub async fn execute(self) -> Result<()> {
        let repo = GitRepository::open()?;
        let input = PrInput {
            commit_messages: repo.commit_messages(self.commits)?,
            diffs: repo.commit_diffs(self.commits)?,
        };
        if input.commit_messages.is_empty() {
            bail!("No commits found on the current branch");
        }
        debug!(commits = input.commit_messages.len(), "Collected commits");

        let resolved = self.generation.resolve()?;
        let streaming = resolved.settings.stream_output;
        let summarizer = Summarizer::new(&resolved.gateway, resolved.settings).with_fragment_sink(
            |fragment| {
                print!("{fragment}");
                let _ = io::stdout().flush();
            },
        );

        let pr = summarizer.generate_pr(&input).await?;
        if streaming {
            println!();
            println!();
        }
        output::print_pr(&pr)?;

        if self.copy {
            output::copy_to_clipboard(&output::format_pr(&pr))?;
            output::note("Copied to clipboard")?;
        }
        if self.create {
            let url = output::create_github_pr(&pr)?;
            info!(url = %url, "Opened pull request");
            output::note(&format!("Created {url}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        pr: PrCommand,
    }

    #[test]
    fn defaults_to_one_commit() {
        let parsed = Harness::try_parse_from(["pr"]).unwrap();
        assert_eq!(parsed.pr.commits, 1);
        assert!(!parsed.pr.create);
        assert!(!parsed.pr.copy);
    }

    #[test]
    fn short_commit_count() {
        let parsed = Harness::try_parse_from(["pr", "-n", "4", "--copy"]).unwrap();
        assert_eq!(parsed.pr.commits, 4);
        assert!(parsed.pr.copy);
    }
}
