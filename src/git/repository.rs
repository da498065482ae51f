//! Git repository operations

use std::path::Path;

use anyhow::{Context, Result};
use git2::{Commit, Diff, DiffFormat, DiffOptions, Repository, Sort};
use tracing::debug;

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open repository at current directory
    pub fn open() -> Result<Self> {
        let repo = Repository::discover(".").context("Not in a git repository")?;

        Ok(Self { repo })
    }

    /// Open repository at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path).context("Failed to open git repository")?;

        Ok(Self { repo })
    }

    /// Get workdir path
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Returns the patch of everything staged in the index against HEAD.
    ///
    /// In a repository without commits the whole index is the diff.
    pub fn staged_diff(&self) -> Result<String> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree().context("Failed to peel HEAD to tree")?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e).context("Failed to get HEAD reference"),
        };
        let index = self.repo.index().context("Failed to read index")?;

        let mut opts = DiffOptions::new();
        opts.show_binary(false);
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), Some(&mut opts))
            .context("Failed to diff index against HEAD")?;

        let text = patch_text(&diff)?;
        debug!(diff_len = text.len(), "Read staged diff");
        Ok(text)
    }

    /// Returns one patch per commit for the last `count` commits on the
    /// first-parent history of HEAD, oldest first.
    pub fn commit_diffs(&self, count: usize) -> Result<Vec<String>> {
        self.recent_commits(count)?
            .iter()
            .map(|commit| self.commit_patch(commit))
            .collect()
    }

    /// Returns the messages of the last `count` commits, oldest first.
    pub fn commit_messages(&self, count: usize) -> Result<Vec<String>> {
        Ok(self
            .recent_commits(count)?
            .iter()
            .map(|commit| commit.message().unwrap_or_default().trim_end().to_string())
            .collect())
    }

    /// Commits the current index on HEAD with `message` and returns the new
    /// commit id.
    pub fn commit_staged(&self, message: &str) -> Result<String> {
        let signature = self
            .repo
            .signature()
            .context("No git identity configured (set user.name and user.email)")?;

        let mut index = self.repo.index().context("Failed to read index")?;
        let tree_id = index.write_tree().context("Failed to write index tree")?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .context("Failed to find index tree")?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit().context("Failed to peel HEAD to commit")?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e).context("Failed to get HEAD reference"),
        };
        let parents: Vec<&Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .context("Failed to create commit")?;
        debug!(commit = %oid, "Created commit");
        Ok(oid.to_string())
    }

    fn recent_commits(&self, count: usize) -> Result<Vec<Commit<'_>>> {
        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker
            .push_head()
            .context("Failed to read HEAD; does the repository have commits?")?;
        walker.simplify_first_parent()?;
        walker.set_sorting(Sort::TOPOLOGICAL)?;

        let mut commits = Vec::with_capacity(count);
        for oid in walker.take(count) {
            let oid = oid.context("Failed to get commit OID from walker")?;
            commits.push(
                self.repo
                    .find_commit(oid)
                    .context("Failed to find commit")?,
            );
        }

        // Reverse to get chronological order (oldest first)
        commits.reverse();
        Ok(commits)
    }

    fn commit_patch(&self, commit: &Commit<'_>) -> Result<String> {
        let commit_tree = commit.tree().context("Failed to get commit tree")?;

        let parent_tree = if commit.parent_count() > 0 {
            Some(
                commit
                    .parent(0)
                    .context("Failed to get parent commit")?
                    .tree()
                    .context("Failed to get parent tree")?,
            )
        } else {
            None
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)
            .context("Failed to create diff")?;
        patch_text(&diff)
    }
}

/// Renders a diff as unified patch text.
fn patch_text(diff: &Diff<'_>) -> Result<String> {
    let mut text = String::new();

    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            '+' | '-' | ' ' => text.push(line.origin()),
            _ => {}
        }
        text.push_str(&content);
        true
    })
    .context("Failed to format diff")?;

    Ok(text)
}
