//! # diffscribe
//!
//! Commit messages and pull request descriptions from git diffs, written by
//! hosted language models.
//!
//! Small diffs go to the model in one request. Large ones are split into
//! chunks that are summarised concurrently and then merged by a final call.
//!
//! ## Quick Start
//!
//! ```rust
//! use diffscribe::summary::chunker::{SizeAdmissionPolicy, Admission};
//!
//! let policy = SizeAdmissionPolicy::new(10);
//! assert_eq!(policy.classify("tiny"), Admission::Small);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod cli;
pub mod config;
pub mod git;
pub mod summary;

pub use crate::cli::Cli;

/// The current version of diffscribe.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
