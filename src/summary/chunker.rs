//! Size admission and chunking of diffs and commit corpora.
//!
//! Three splitters share one budget rule: a chunk never exceeds
//! `max_chunk_size` bytes unless it consists of a single line that is
//! itself longer than the budget. Lines are never split.
//!
//! - [`chunk`] packs whole per-file blocks from a parsed diff.
//! - [`chunk_diff_string`] walks the raw text in overlapping windows.
//! - [`chunk_commits`] packs whole commit entries into groups.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::git::diff;

/// Fraction of the window below which a newline is too early to back off to.
const NEWLINE_BACKOFF_FLOOR: f64 = 0.8;

/// Outcome of the size admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Fits in one request; no chunking.
    Small,
    /// Needs chunking and a merge pass.
    Large,
}

/// Threshold-based classifier separating single-pass inputs from inputs
/// that go through chunking.
#[derive(Debug, Clone, Copy)]
pub struct SizeAdmissionPolicy {
    threshold: usize,
}

impl SizeAdmissionPolicy {
    /// Creates a policy admitting inputs up to `threshold` bytes as small.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Classifies `text` by its length in bytes.
    pub fn classify(&self, text: &str) -> Admission {
        if text.len() <= self.threshold {
            Admission::Small
        } else {
            Admission::Large
        }
    }
}

/// Which splitter to use for commit-message generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// File-aware packing via [`chunk`].
    #[default]
    Files,
    /// Raw overlapping windows via [`chunk_diff_string`].
    Window,
}

/// Splits a diff into chunks made of whole per-file blocks.
///
/// Blank input yields no chunks; input within the budget is returned as
/// one unmodified chunk. A file block larger than the budget is split at
/// line boundaries and consecutive pieces of that file share up to
/// `overlap` lines of context. Input with no recognisable file headers
/// falls back to [`chunk_diff_string`].
pub fn chunk(diff: &str, max_chunk_size: usize, overlap: usize) -> Vec<String> {
    if diff.trim().is_empty() {
        return Vec::new();
    }
    if diff.len() <= max_chunk_size {
        return vec![diff.to_string()];
    }

    let summary = diff::parse(diff);
    if summary.is_empty() {
        debug!("No file headers found, falling back to window chunking");
        return chunk_diff_string(diff, max_chunk_size, overlap);
    }

    let mut packer = Packer::new(max_chunk_size);
    for file in &summary.files {
        let rendered = file.to_block();
        let block = rendered.strip_suffix('\n').unwrap_or(rendered.as_str());
        if block.len() <= max_chunk_size {
            packer.push(block);
        } else {
            packer.flush();
            let mut pieces = split_lines(block, max_chunk_size, overlap);
            // Full pieces become chunks; the tail stays open for packing.
            if let Some(tail) = pieces.pop() {
                for piece in pieces {
                    packer.emit(piece);
                }
                packer.push(&tail);
            }
        }
    }

    let chunks = packer.finish();
    debug!(
        file_count = summary.files.len(),
        chunk_count = chunks.len(),
        max_chunk_size,
        "Chunked diff by file"
    );
    chunks
}

/// Splits raw text into fixed windows with a shared boundary region.
///
/// Each window is at most `max_chunk_size` bytes. When a window would end
/// mid-text and the last newline inside it lies in the final 20% of the
/// window, the window ends right after that newline. The next window
/// starts `overlap` bytes before the previous end, but always at least one
/// byte after the previous start. Window edges are moved to UTF-8 character
/// boundaries.
pub fn chunk_diff_string(diff: &str, max_chunk_size: usize, overlap: usize) -> Vec<String> {
    if diff.len() <= max_chunk_size {
        return vec![diff.to_string()];
    }

    let max = max_chunk_size.max(1);
    let floor = (max as f64 * NEWLINE_BACKOFF_FLOOR) as usize;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = floor_char_boundary(diff, (start + max).min(diff.len()));
        if end <= start {
            end = ceil_char_boundary(diff, start + 1);
        }

        if end < diff.len() {
            if let Some(newline) = diff[start..end].rfind('\n') {
                if newline > floor {
                    end = start + newline + 1;
                }
            }
        }

        chunks.push(diff[start..end].to_string());
        if end >= diff.len() {
            break;
        }

        let mut next = floor_char_boundary(diff, end.saturating_sub(overlap));
        if next <= start {
            next = ceil_char_boundary(diff, start + 1);
        }
        start = next;
    }

    debug!(
        chunk_count = chunks.len(),
        max_chunk_size, overlap, "Chunked diff by window"
    );
    chunks
}

/// Groups commit entries into budget-bounded groups, preserving order.
///
/// A group's size is the length of its entries joined by newlines. An
/// entry larger than the budget is split at its internal newlines and the
/// pieces are packed like ordinary entries.
pub fn chunk_commits(commits: &[String], max_chunk_size: usize) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0;

    for commit in commits {
        let pieces = if commit.len() > max_chunk_size {
            split_lines(commit, max_chunk_size, 0)
        } else {
            vec![commit.clone()]
        };

        for piece in pieces {
            let joined = if current.is_empty() {
                piece.len()
            } else {
                current_len + 1 + piece.len()
            };
            if !current.is_empty() && joined > max_chunk_size {
                groups.push(std::mem::take(&mut current));
                current_len = piece.len();
            } else {
                current_len = joined;
            }
            current.push(piece);
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    debug!(
        commit_count = commits.len(),
        group_count = groups.len(),
        "Chunked commits"
    );
    groups
}

/// Greedy buffer that joins blocks with newlines under a byte budget.
struct Packer {
    max: usize,
    buffer: String,
    chunks: Vec<String>,
}

impl Packer {
    fn new(max: usize) -> Self {
        Self {
            max,
            buffer: String::new(),
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, block: &str) {
        if !self.buffer.is_empty() && self.buffer.len() + 1 + block.len() > self.max {
            self.flush();
        }
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(block);
    }

    fn emit(&mut self, chunk: String) {
        self.chunks.push(chunk);
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.chunks.push(std::mem::take(&mut self.buffer));
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Splits text into newline-joined pieces of whole lines, each within
/// `max` bytes unless a single line is longer.
///
/// Every piece after the first begins with up to `overlap` trailing lines
/// of its predecessor, dropped from the front as needed to fit the budget.
/// Each piece contains at least one line not present in its predecessor.
fn split_lines(text: &str, max: usize, overlap: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut pieces = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let mut piece: Vec<&str> = Vec::new();
        let mut len = 0;

        if !pieces.is_empty() && overlap > 0 {
            let context_start = i.saturating_sub(overlap);
            let mut context = &lines[context_start..i];
            while !context.is_empty() && joined_len(context) + 1 + lines[i].len() > max {
                context = &context[1..];
            }
            piece.extend_from_slice(context);
            len = joined_len(context);
        }

        // At least one new line per piece.
        len += if piece.is_empty() {
            lines[i].len()
        } else {
            lines[i].len() + 1
        };
        piece.push(lines[i]);
        i += 1;

        while i < lines.len() && len + 1 + lines[i].len() <= max {
            len += 1 + lines[i].len();
            piece.push(lines[i]);
            i += 1;
        }

        pieces.push(piece.join("\n"));
    }

    pieces
}

fn joined_len(lines: &[&str]) -> usize {
    if lines.is_empty() {
        return 0;
    }
    lines.iter().map(|l| l.len()).sum::<usize>() + lines.len() - 1
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index.min(s.len())
}
