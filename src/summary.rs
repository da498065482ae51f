//! Diff chunking and multi-pass summarization.
//!
//! Inputs under the size threshold go to the model in one request. Larger
//! inputs are split by [`chunker`], each chunk is summarised on its own, and
//! [`reducer`] merges the partial summaries with one more request.

pub mod chunker;
pub mod output;
pub mod reducer;
pub mod template;

pub use reducer::{PrInput, PrResult, StructuredCommitResult, Summarizer, SummarySettings};
