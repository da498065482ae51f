//! Unified diff parsing into per-file change records.
//!
//! The parser is a single forward pass over the diff lines. A `diff --git`
//! header starts a new file record and flushes the previous one; mode lines
//! set the status; `+`/`-` lines (excluding the `+++`/`---` file markers)
//! feed the counters and the content buffer.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::ai::error::GenerationError;

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git ";

/// Change status of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// File was created by the change.
    Added,
    /// File existed before and after the change.
    Modified,
    /// File was removed by the change.
    Deleted,
}

impl FileStatus {
    /// Returns the lowercase label used in chunk blocks.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file's change within a diff.
///
/// Only the parser builds these, which keeps `additions` and `deletions`
/// consistent with the `+`/`-` lines stored in `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffFileChange {
    filename: String,
    status: FileStatus,
    additions: usize,
    deletions: usize,
    content: String,
}

impl DiffFileChange {
    fn new(filename: String) -> Self {
        Self {
            filename,
            status: FileStatus::Modified,
            additions: 0,
            deletions: 0,
            content: String::new(),
        }
    }

    /// Path of the file as it appears on the `b/` side of the header.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Change status.
    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// Number of added lines.
    pub fn additions(&self) -> usize {
        self.additions
    }

    /// Number of removed lines.
    pub fn deletions(&self) -> usize {
        self.deletions
    }

    /// Added and removed lines, each keeping its `+`/`-` prefix.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Renders the block that the chunker packs into chunks.
    pub fn to_block(&self) -> String {
        format!(
            "File: {}\nStatus: {}\n{}",
            self.filename, self.status, self.content
        )
    }

    fn push_line(&mut self, line: &str) {
        self.content.push_str(line);
        self.content.push('\n');
    }
}

/// Ordered list of file changes, in order of appearance in the raw diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Parsed files.
    pub files: Vec<DiffFileChange>,
}

impl DiffSummary {
    /// Returns `true` when the diff contained no parseable files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total added lines across all files.
    pub fn total_additions(&self) -> usize {
        self.files.iter().map(DiffFileChange::additions).sum()
    }

    /// Total removed lines across all files.
    pub fn total_deletions(&self) -> usize {
        self.files.iter().map(DiffFileChange::deletions).sum()
    }
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)] // literal pattern, covered by tests
    HEADER.get_or_init(|| Regex::new(r"^diff --git a/(.+) b/(.+)$").expect("valid header regex"))
}

/// Parser state for the file currently being read.
enum Current {
    /// No header seen yet.
    None,
    /// Inside a file whose header did not match; lines are ignored.
    Skipped,
    /// Inside a recognised file.
    File(DiffFileChange),
}

/// Parses unified diff text into a [`DiffSummary`].
///
/// Never fails: an unrecognised header skips that file, binary files yield
/// a record with zero counts and empty content, and input without any
/// header yields an empty summary.
pub fn parse(diff_text: &str) -> DiffSummary {
    let mut files = Vec::new();
    let mut current = Current::None;

    for line in diff_text.lines() {
        if line.starts_with(FILE_DIFF_MARKER) {
            if let Current::File(file) = current {
                files.push(file);
            }
            current = match header_regex().captures(line) {
                Some(caps) => Current::File(DiffFileChange::new(caps[2].to_string())),
                None => {
                    let err = GenerationError::ParseFailure(line.to_string());
                    debug!(error = %err, "Skipping file with unrecognised diff header");
                    Current::Skipped
                }
            };
            continue;
        }

        let Current::File(file) = &mut current else {
            continue;
        };

        if line.starts_with("new file mode") {
            file.status = FileStatus::Added;
        } else if line.starts_with("deleted file mode") {
            file.status = FileStatus::Deleted;
        } else if line.starts_with("+++") || line.starts_with("---") {
            // File name markers, not content.
        } else if line.starts_with('+') {
            file.additions += 1;
            file.push_line(line);
        } else if line.starts_with('-') {
            file.deletions += 1;
            file.push_line(line);
        }
    }

    if let Current::File(file) = current {
        files.push(file);
    }

    debug!(file_count = files.len(), "Parsed diff");
    DiffSummary { files }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // ── test helpers ────────────────────────────────────────────

    fn make_file_header(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n\
             index abc1234..def5678 100644\n\
             --- a/{path}\n\
             +++ b/{path}\n"
        )
    }

    fn make_single_file_diff(path: &str, hunk_body: &str) -> String {
        format!("{}@@ -1,3 +1,4 @@\n{hunk_body}", make_file_header(path))
    }

    // ── parse ──────────────────────────────────────────────────

    #[test]
    fn parse_empty_input() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn parse_text_without_headers() {
        assert!(parse("some random text\n+ not a diff\n").is_empty());
    }

    #[test]
    fn parse_single_modified_file() {
        let diff = make_single_file_diff(
            "src/main.rs",
            " fn main() {\n+    println!(\"hello\");\n-    todo!();\n }\n",
        );
        let summary = parse(&diff);
        assert_eq!(summary.files.len(), 1);
        let file = &summary.files[0];
        assert_eq!(file.filename(), "src/main.rs");
        assert_eq!(file.status(), FileStatus::Modified);
        assert_eq!(file.additions(), 1);
        assert_eq!(file.deletions(), 1);
        assert_eq!(
            file.content(),
            "+    println!(\"hello\");\n-    todo!();\n"
        );
    }

    #[test]
    fn parse_ignores_file_name_markers() {
        let diff = make_single_file_diff("a.rs", "+x\n");
        let file = &parse(&diff).files[0];
        assert!(!file.content().contains("+++"));
        assert!(!file.content().contains("---"));
        assert_eq!(file.additions(), 1);
    }

    #[test]
    fn parse_new_and_deleted_files() {
        let diff = "diff --git a/new.rs b/new.rs\n\
                    new file mode 100644\n\
                    index 0000000..abc1234\n\
                    --- /dev/null\n\
                    +++ b/new.rs\n\
                    @@ -0,0 +1,2 @@\n\
                    +fn a() {}\n\
                    +fn b() {}\n\
                    diff --git a/old.rs b/old.rs\n\
                    deleted file mode 100644\n\
                    index abc1234..0000000\n\
                    --- a/old.rs\n\
                    +++ /dev/null\n\
                    @@ -1 +0,0 @@\n\
                    -fn c() {}\n";
        let summary = parse(diff);
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.files[0].status(), FileStatus::Added);
        assert_eq!(summary.files[0].additions(), 2);
        assert_eq!(summary.files[1].status(), FileStatus::Deleted);
        assert_eq!(summary.files[1].deletions(), 1);
        assert_eq!(summary.total_additions(), 2);
        assert_eq!(summary.total_deletions(), 1);
    }

    #[test]
    fn parse_binary_file_has_no_content() {
        let diff = "diff --git a/image.png b/image.png\n\
                    new file mode 100644\n\
                    index 0000000..abc1234\n\
                    Binary files /dev/null and b/image.png differ\n";
        let summary = parse(diff);
        assert_eq!(summary.files.len(), 1);
        let file = &summary.files[0];
        assert_eq!(file.filename(), "image.png");
        assert_eq!(file.additions(), 0);
        assert_eq!(file.deletions(), 0);
        assert!(file.content().is_empty());
    }

    #[test]
    fn parse_preserves_file_order() {
        let diff = format!(
            "{}{}{}",
            make_single_file_diff("c.rs", "+1\n"),
            make_single_file_diff("a.rs", "+2\n"),
            make_single_file_diff("b.rs", "+3\n")
        );
        let names: Vec<_> = parse(&diff)
            .files
            .iter()
            .map(|f| f.filename().to_string())
            .collect();
        assert_eq!(names, vec!["c.rs", "a.rs", "b.rs"]);
    }

    #[test]
    fn parse_skips_unrecognised_header() {
        let diff = format!(
            "diff --git broken-header\n+ignored line\n{}",
            make_single_file_diff("ok.rs", "+kept\n")
        );
        let summary = parse(&diff);
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].filename(), "ok.rs");
        assert_eq!(summary.files[0].content(), "+kept\n");
    }

    #[test]
    fn parse_rename_uses_new_path() {
        let diff = "diff --git a/old_name.rs b/new_name.rs\n\
                    similarity index 95%\n\
                    rename from old_name.rs\n\
                    rename to new_name.rs\n\
                    --- a/old_name.rs\n\
                    +++ b/new_name.rs\n\
                    @@ -1,3 +1,3 @@\n\
                    -// old\n\
                    +// new\n";
        let summary = parse(diff);
        assert_eq!(summary.files[0].filename(), "new_name.rs");
    }

    #[test]
    fn counts_match_prefixed_lines() {
        let diff = make_single_file_diff("lib.rs", "+a\n+b\n-c\n context\n+d\n");
        let file = &parse(&diff).files[0];
        let plus = file.content().lines().filter(|l| l.starts_with('+')).count();
        let minus = file.content().lines().filter(|l| l.starts_with('-')).count();
        assert_eq!(file.additions(), plus);
        assert_eq!(file.deletions(), minus);
    }

    #[test]
    fn block_rendering() {
        let diff = make_single_file_diff("a.rs", "+x\n");
        let block = parse(&diff).files[0].to_block();
        assert_eq!(block, "File: a.rs\nStatus: modified\n+x\n");
    }
}
