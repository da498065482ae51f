//! Terminal output, clipboard and GitHub CLI helpers.

use std::io::{IsTerminal, Write};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::debug;

use crate::summary::PrResult;

fn stdout() -> StandardStream {
    let choice = if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Prints `text` as a coloured heading.
pub fn heading(text: &str) -> Result<()> {
    let mut out = stdout();
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    writeln!(out, "{text}")?;
    out.reset()?;
    Ok(())
}

/// Prints a dimmed note.
pub fn note(text: &str) -> Result<()> {
    let mut out = stdout();
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(out, "{text}")?;
    out.reset()?;
    Ok(())
}

/// Renders commit message variations; numbered when there is more than one.
pub fn format_variations(variations: &[String]) -> String {
    if let [only] = variations {
        return only.clone();
    }
    variations
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let mut lines = v.lines();
            let mut block = format!("[{}] {}", i + 1, lines.next().unwrap_or_default());
            for line in lines {
                block.push('\n');
                if !line.is_empty() {
                    block.push_str("    ");
                    block.push_str(line);
                }
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prints commit message variations under a heading.
pub fn print_variations(variations: &[String]) -> Result<()> {
    heading("Commit message")?;
    println!("{}", format_variations(variations));
    Ok(())
}

/// Renders a pull request as `# title` followed by its description.
pub fn format_pr(pr: &PrResult) -> String {
    if pr.description.is_empty() {
        format!("# {}", pr.title)
    } else {
        format!("# {}\n\n{}", pr.title, pr.description)
    }
}

/// Prints a pull request title and description.
pub fn print_pr(pr: &PrResult) -> Result<()> {
    heading(&pr.title)?;
    if !pr.description.is_empty() {
        println!();
        println!("{}", pr.description);
    }
    Ok(())
}

/// Clipboard programs to try, in order, on this platform.
fn clipboard_commands() -> Vec<(&'static str, Vec<&'static str>)> {
    if cfg!(target_os = "macos") {
        vec![("pbcopy", vec![])]
    } else if cfg!(windows) {
        vec![("clip", vec![])]
    } else {
        vec![
            ("wl-copy", vec![]),
            ("xclip", vec!["-selection", "clipboard"]),
            ("xsel", vec!["--clipboard", "--input"]),
        ]
    }
}

/// Copies `text` to the system clipboard through the platform's clipboard
/// program.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    for (program, args) in clipboard_commands() {
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                debug!(program, error = %e, "Clipboard program unavailable");
                continue;
            }
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .with_context(|| format!("Failed to write to {program}"))?;
        }
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {program}"))?;
        if status.success() {
            debug!(program, "Copied to clipboard");
            return Ok(());
        }
        debug!(program, %status, "Clipboard program failed");
    }
    bail!("No working clipboard program found (tried pbcopy, wl-copy, xclip, xsel, clip)")
}

/// Opens a pull request for the current branch with the GitHub CLI and
/// returns its URL.
pub fn create_github_pr(pr: &PrResult) -> Result<String> {
    let output = Command::new("gh")
        .args([
            "pr",
            "create",
            "--title",
            pr.title.as_str(),
            "--body",
            pr.description.as_str(),
        ])
        .output()
        .context("Failed to run the GitHub CLI (`gh`); is it installed?")?;

    if !output.status.success() {
        let error_msg = String::from_utf8_lossy(&output.stderr);
        bail!("Failed to create pull request: {}", error_msg.trim());
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(url = %url, "Pull request created");
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn single_variation_is_unnumbered() {
        assert_eq!(format_variations(&["feat: x".to_string()]), "feat: x");
    }

    #[test]
    fn variations_are_numbered_and_indented() {
        let rendered = format_variations(&[
            "feat: a\n\nbody".to_string(),
            "fix: b".to_string(),
        ]);
        assert_eq!(rendered, "[1] feat: a\n\n    body\n\n[2] fix: b");
    }

    #[test]
    fn pr_markdown() {
        let pr = PrResult {
            title: "Add chunker".into(),
            description: "Details".into(),
        };
        assert_eq!(format_pr(&pr), "# Add chunker\n\nDetails");
        let bare = PrResult {
            title: "Tiny".into(),
            description: String::new(),
        };
        assert_eq!(format_pr(&bare), "# Tiny");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_prefers_wayland_then_x11() {
        let programs: Vec<&str> = clipboard_commands().iter().map(|(p, _)| *p).collect();
        assert_eq!(programs, vec!["wl-copy", "xclip", "xsel"]);
    }
}
