//! Single-pass and chunk-then-merge generation of commit messages and pull
//! request descriptions.

use std::collections::HashMap;

use anyhow::{bail, Result};
use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::chunker::{self, Admission, ChunkStrategy, SizeAdmissionPolicy};
use super::output::{parse_structured, ParseOutcome};
use super::template::render;
use crate::ai::{GenerationError, GenerationGateway, GenerationRequest, Provider};
use crate::config::Config;

/// Commit message proposals; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredCommitResult {
    /// Alternative messages, best first.
    pub variations: Vec<String>,
}

/// Pull request title and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrResult {
    /// Single-line title without Markdown heading markers.
    pub title: String,
    /// Markdown body.
    pub description: String,
}

/// Commits a pull request description is generated from.
#[derive(Debug, Clone, Default)]
pub struct PrInput {
    /// Commit messages, oldest first.
    pub commit_messages: Vec<String>,
    /// One diff per commit, same order as `commit_messages`.
    pub diffs: Vec<String>,
}

/// Everything the reducer needs from the configuration, resolved for one
/// provider and model.
#[derive(Debug, Clone)]
#[allow(missing_docs)] // mirrors `Config`
pub struct SummarySettings {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub max_commit_tokens: u32,
    pub max_pr_tokens: u32,
    pub commit_variations: u32,
    pub size_threshold: usize,
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_strategy: ChunkStrategy,
    pub concurrency: usize,
    pub stream_output: bool,
    pub commit_prompt: String,
    pub merge_commit_prompt: String,
    pub pr_prompt: String,
    pub pr_chunk_prompt: String,
    pub merge_pr_prompt: String,
}

impl SummarySettings {
    /// Resolves settings from `config` for `provider` and `model`.
    pub fn from_config(config: &Config, provider: Provider, model: String) -> Self {
        Self {
            provider,
            model,
            temperature: config.temperature,
            max_commit_tokens: config.max_commit_tokens,
            max_pr_tokens: config.max_pr_tokens,
            commit_variations: config.commit_variations,
            size_threshold: config.size_threshold,
            max_chunk_size: config.max_chunk_size,
            chunk_overlap: config.chunk_overlap,
            chunk_strategy: config.chunk_strategy,
            concurrency: config.concurrency,
            stream_output: config.stream_output,
            commit_prompt: config.commit_prompt.clone(),
            merge_commit_prompt: config.merge_commit_prompt.clone(),
            pr_prompt: config.pr_prompt.clone(),
            pr_chunk_prompt: config.pr_chunk_prompt().to_string(),
            merge_pr_prompt: config.merge_pr_prompt().to_string(),
        }
    }
}

/// Receives streamed fragments of the final response as they arrive.
pub type FragmentSink<'a> = Box<dyn Fn(&str) + Send + Sync + 'a>;

/// Drives generation through a [`GenerationGateway`].
pub struct Summarizer<'a> {
    gateway: &'a dyn GenerationGateway,
    settings: SummarySettings,
    sink: Option<FragmentSink<'a>>,
}

impl<'a> Summarizer<'a> {
    /// Creates a summarizer over `gateway`.
    pub fn new(gateway: &'a dyn GenerationGateway, settings: SummarySettings) -> Self {
        Self {
            gateway,
            settings,
            sink: None,
        }
    }

    /// Forwards fragments of streamed final responses to `sink`.
    ///
    /// Only used when `stream_output` is set.
    pub fn with_fragment_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Generates commit message proposals for `diff`.
    pub async fn generate_commit(&self, diff: &str) -> Result<StructuredCommitResult> {
        if diff.trim().is_empty() {
            bail!("Nothing to summarise: the diff is empty");
        }
        let n_commit = self.settings.commit_variations.to_string();

        let policy = SizeAdmissionPolicy::new(self.settings.size_threshold);
        if policy.classify(diff) == Admission::Small {
            debug!(diff_len = diff.len(), "Generating commit message in one pass");
            let prompt = render(
                &self.settings.commit_prompt,
                &HashMap::from([("diff", diff), ("n_commit", n_commit.as_str())]),
            );
            let request = self.request(prompt, self.settings.max_commit_tokens)?;
            let response = self.final_call(&request).await?;
            return final_results(&response);
        }

        let chunks = match self.settings.chunk_strategy {
            ChunkStrategy::Files => chunker::chunk(
                diff,
                self.settings.max_chunk_size,
                self.settings.chunk_overlap,
            ),
            ChunkStrategy::Window => chunker::chunk_diff_string(
                diff,
                self.settings.max_chunk_size,
                self.settings.chunk_overlap,
            ),
        };
        info!(
            diff_len = diff.len(),
            chunk_count = chunks.len(),
            strategy = ?self.settings.chunk_strategy,
            "Diff exceeds size threshold; summarising in chunks"
        );

        let prompts = chunks
            .iter()
            .map(|chunk| {
                render(
                    &self.settings.commit_prompt,
                    &HashMap::from([("diff", chunk.as_str()), ("n_commit", n_commit.as_str())]),
                )
            })
            .collect();
        let outcomes = self.fan_out(prompts, self.settings.max_commit_tokens).await?;
        let partials = collect_partials(outcomes, |index, text| {
            match parse_structured(&text) {
                ParseOutcome::Structured(results) => results,
                ParseOutcome::Fallback(raw) => {
                    warn!(
                        index,
                        "Chunk response was not structured; keeping its raw text"
                    );
                    // A blank reply has no text to stand in for the chunk; the
                    // merge prompt would only get an empty bullet.
                    if raw.is_empty() {
                        Vec::new()
                    } else {
                        vec![raw]
                    }
                }
            }
        })?;

        let messages = bullet_list(&partials);
        let prompt = render(
            &self.settings.merge_commit_prompt,
            &HashMap::from([("messages", messages.as_str()), ("n_commit", n_commit.as_str())]),
        );
        debug!(partial_count = partials.len(), "Merging chunk results");
        let request = self.request(prompt, self.settings.max_commit_tokens)?;
        let response = self.final_call(&request).await?;
        final_results(&response)
    }

    /// Generates a pull request title and description for `input`.
    pub async fn generate_pr(&self, input: &PrInput) -> Result<PrResult> {
        if input.commit_messages.is_empty() {
            bail!("Nothing to summarise: no commits given");
        }
        if input.commit_messages.len() != input.diffs.len() {
            bail!(
                "Mismatched input: {} commit messages but {} diffs",
                input.commit_messages.len(),
                input.diffs.len()
            );
        }

        let entries: Vec<String> = input
            .commit_messages
            .iter()
            .zip(&input.diffs)
            .map(|(message, diff)| format!("Commit: {}\n{}", message.trim(), diff))
            .collect();
        let corpus = entries.join("\n");
        let commits = commit_list(&input.commit_messages);

        let policy = SizeAdmissionPolicy::new(self.settings.size_threshold);
        if policy.classify(&corpus) == Admission::Small {
            debug!(
                commit_count = entries.len(),
                corpus_len = corpus.len(),
                "Generating PR description in one pass"
            );
            let diff = input.diffs.join("\n");
            let count = entries.len().to_string();
            let prompt = render(
                &self.settings.pr_prompt,
                &HashMap::from([
                    ("diff", diff.as_str()),
                    ("commits", commits.as_str()),
                    ("n_commit", count.as_str()),
                ]),
            );
            let request = self.request(prompt, self.settings.max_pr_tokens)?;
            let response = self.final_call(&request).await?;
            return split_title(&response);
        }

        let groups = chunker::chunk_commits(&entries, self.settings.max_chunk_size);
        info!(
            commit_count = entries.len(),
            group_count = groups.len(),
            "Commit range exceeds size threshold; summarising in groups"
        );

        let prompts = groups
            .iter()
            .map(|group| {
                let text = group.join("\n");
                render(
                    &self.settings.pr_chunk_prompt,
                    &HashMap::from([("diff", text.as_str())]),
                )
            })
            .collect();
        let outcomes = self.fan_out(prompts, self.settings.max_pr_tokens).await?;
        let partials = collect_partials(outcomes, |_, text| {
            let text = text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        })?;

        let messages = bullet_list(&partials);
        let prompt = render(
            &self.settings.merge_pr_prompt,
            &HashMap::from([("messages", messages.as_str()), ("commits", commits.as_str())]),
        );
        debug!(partial_count = partials.len(), "Merging group summaries");
        let request = self.request(prompt, self.settings.max_pr_tokens)?;
        let response = self.final_call(&request).await?;
        split_title(&response)
    }

    fn request(&self, prompt: String, max_output_tokens: u32) -> Result<GenerationRequest> {
        GenerationRequest::new(
            prompt,
            max_output_tokens,
            self.settings.temperature,
            self.settings.model.clone(),
            self.settings.provider,
        )
    }

    /// Runs one request per prompt, at most `concurrency` at a time, and
    /// returns the outcomes in prompt order.
    ///
    /// Requests are validated before any is sent.
    async fn fan_out(&self, prompts: Vec<String>, max_tokens: u32) -> Result<Vec<Result<String>>> {
        let requests = prompts
            .into_iter()
            .map(|prompt| self.request(prompt, max_tokens))
            .collect::<Result<Vec<_>>>()?;

        let semaphore = Semaphore::new(self.settings.concurrency.max(1));
        let calls = requests.iter().enumerate().map(|(index, request)| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await?;
                debug!(index, prompt_len = request.prompt.len(), "Dispatching chunk request");
                self.gateway.complete(request).await
            }
        });
        Ok(join_all(calls).await)
    }

    /// Runs the last call of a generation, streaming it when configured.
    async fn final_call(&self, request: &GenerationRequest) -> Result<String> {
        if !self.settings.stream_output {
            return self.gateway.complete(request).await;
        }

        let mut fragments = self.gateway.stream(request);
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if let Some(sink) = &self.sink {
                sink(&fragment);
            }
            text.push_str(&fragment);
        }
        debug!(response_len = text.len(), "Stream finished");
        Ok(text)
    }
}

/// Turns per-chunk outcomes into partial results, in chunk order.
///
/// Failed chunks are logged and skipped. When every chunk failed, the
/// first failure is returned.
fn collect_partials(
    outcomes: Vec<Result<String>>,
    mut extract: impl FnMut(usize, String) -> Vec<String>,
) -> Result<Vec<String>> {
    let mut partials = Vec::new();
    let mut first_error = None;
    let mut succeeded = 0;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(text) => {
                succeeded += 1;
                partials.extend(extract(index, text));
            }
            Err(e) => {
                let failure = GenerationError::ChunkGenerationFailure {
                    index,
                    reason: format!("{e:#}"),
                };
                warn!(error = %failure, "Skipping failed chunk");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if succeeded == 0 {
        if let Some(e) = first_error {
            return Err(e);
        }
    }
    if partials.is_empty() {
        return Err(GenerationError::InvalidModelOutput(
            "every chunk response was empty".to_string(),
        )
        .into());
    }
    Ok(partials)
}

/// Parses the final commit response; anything but a structured answer is
/// fatal.
fn final_results(response: &str) -> Result<StructuredCommitResult> {
    match parse_structured(response) {
        ParseOutcome::Structured(variations) => Ok(StructuredCommitResult { variations }),
        ParseOutcome::Fallback(raw) => Err(GenerationError::InvalidModelOutput(format!(
            "expected {{\"results\": [...]}}, got: {}",
            truncate(&raw, 200)
        ))
        .into()),
    }
}

/// Renders items as a Markdown bullet list, indenting continuation lines.
fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| {
            let mut lines = item.lines();
            let first = lines.next().unwrap_or_default();
            let mut bullet = format!("- {first}");
            for line in lines {
                bullet.push('\n');
                if !line.is_empty() {
                    bullet.push_str("  ");
                    bullet.push_str(line);
                }
            }
            bullet
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn commit_list(messages: &[String]) -> String {
    messages
        .iter()
        .map(|m| format!("- {}", m.lines().next().unwrap_or_default().trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a response into a title (first line, heading markers removed)
/// and a description (the rest, trimmed).
fn split_title(response: &str) -> Result<PrResult> {
    let text = response.trim();
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let title = first.trim_start_matches('#').trim();
    if title.is_empty() {
        return Err(GenerationError::InvalidModelOutput(format!(
            "no title in response: {}",
            truncate(text, 200)
        ))
        .into());
    }
    Ok(PrResult {
        title: title.to_string(),
        description: rest.trim().to_string(),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
