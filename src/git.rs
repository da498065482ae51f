//! Git access and unified diff parsing.

pub mod diff;
pub mod repository;

pub use diff::{DiffFileChange, DiffSummary, FileStatus};
pub use repository::GitRepository;
