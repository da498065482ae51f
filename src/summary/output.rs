//! Structured-output parsing for model responses.
//!
//! Models are asked to answer with `{"results": ["...", ...]}` but often
//! wrap the object in a markdown fence or surround it with prose that has
//! braces of its own. Candidates are tried in order: the whole response,
//! each fenced block, then every balanced `{...}`. The first one that reads
//! as a results payload wins.

use serde::Deserialize;
use tracing::debug;

/// Wire shape of a structured commit response.
#[derive(Debug, Deserialize)]
struct ResultsPayload {
    results: Vec<String>,
}

/// Result of attempting to read a structured response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Well-formed payload with at least one non-blank result.
    Structured(Vec<String>),
    /// Anything else; carries the raw (trimmed) response text.
    Fallback(String),
}

/// Parses a model response as `{"results": [...]}`.
pub fn parse_structured(response: &str) -> ParseOutcome {
    let trimmed = response.trim();
    let found = std::iter::once(trimmed)
        .chain(fence_bodies(trimmed))
        .chain(brace_objects(trimmed))
        .find_map(read_results);

    match found {
        Some(results) => ParseOutcome::Structured(results),
        None => {
            debug!("Response holds no usable results object");
            ParseOutcome::Fallback(trimmed.to_string())
        }
    }
}

/// Reads `candidate` as a payload with at least one non-blank result.
fn read_results(candidate: &str) -> Option<Vec<String>> {
    let payload: ResultsPayload = serde_json::from_str(candidate).ok()?;
    let results: Vec<String> = payload
        .results
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    (!results.is_empty()).then_some(results)
}

/// Bodies of the markdown fences in `text`, in order, without the info
/// string (`json`, `rust`, ...) on the opening line.
fn fence_bodies(text: &str) -> Vec<&str> {
    let mut bodies = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        let block = &after[..close];
        let body = match block.split_once('\n') {
            Some((info, body)) if !info.trim_start().starts_with('{') => body,
            _ => block,
        };
        bodies.push(body.trim());
        rest = &after[close + 3..];
    }
    bodies
}

/// Every balanced `{...}` in `text`, by position of its opening brace.
fn brace_objects(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_braces(&text[start..]))
}

/// Returns the prefix of `text` up to the brace closing its first `{`,
/// ignoring braces inside JSON string literals.
fn balanced_braces(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        assert_eq!(
            parse_structured(r#"{"results":["feat: add x"]}"#),
            ParseOutcome::Structured(vec!["feat: add x".to_string()])
        );
    }

    #[test]
    fn fenced_object() {
        let response = "Here you go:\n```json\n{\"results\": [\"fix: a\", \"fix: b\"]}\n```\nEnjoy";
        assert_eq!(
            parse_structured(response),
            ParseOutcome::Structured(vec!["fix: a".to_string(), "fix: b".to_string()])
        );
    }

    fn structured(results: &[&str]) -> ParseOutcome {
        ParseOutcome::Structured(results.iter().map(|r| r.to_string()).collect())
    }

    #[test]
    fn bare_fence() {
        let response = "```\n{\"results\": [\"docs: update readme\"]}\n```";
        assert_eq!(parse_structured(response), structured(&["docs: update readme"]));
    }

    #[test]
    fn single_line_fence() {
        let response = "```{\"results\": [\"chore: bump\"]}```";
        assert_eq!(parse_structured(response), structured(&["chore: bump"]));
    }

    #[test]
    fn empty_braces_in_prose_are_skipped() {
        let response = "The change empties `fn noop() {}` bodies.\n\
                        {\"results\": [\"refactor: drop noop bodies\"]}";
        assert_eq!(
            parse_structured(response),
            structured(&["refactor: drop noop bodies"])
        );
    }

    #[test]
    fn earlier_unrelated_json_fence_is_skipped() {
        let response = "```json\n{\"note\": \"x\"}\n```\n{\"results\": [\"fix: y\"]}";
        assert_eq!(parse_structured(response), structured(&["fix: y"]));
    }

    #[test]
    fn code_fence_with_braces_is_skipped() {
        let response = "```rust\nif x {}\n```\nAnswer: {\"results\": [\"feat: z\"]}";
        assert_eq!(parse_structured(response), structured(&["feat: z"]));
    }

    #[test]
    fn later_fence_holds_the_answer() {
        let response = "```rust\nfn f() {}\n```\n```json\n{\"results\": [\"feat: w\"]}\n```";
        assert_eq!(parse_structured(response), structured(&["feat: w"]));
    }

    #[test]
    fn object_in_prose_with_braces_in_strings() {
        let response =
            r#"Sure! {"results": ["refactor: use { and } in fmt"]} Let me know if that helps."#;
        assert_eq!(
            parse_structured(response),
            structured(&["refactor: use { and } in fmt"])
        );
    }

    #[test]
    fn escaped_quotes() {
        let response = r#"{"results": ["fix: handle \"quoted\" names"]}"#;
        assert_eq!(
            parse_structured(response),
            structured(&[r#"fix: handle "quoted" names"#])
        );
    }

    #[test]
    fn prose_is_fallback() {
        assert_eq!(
            parse_structured("  feat: something free-form  "),
            ParseOutcome::Fallback("feat: something free-form".to_string())
        );
    }

    #[test]
    fn empty_results_is_fallback() {
        let raw = r#"{"results": []}"#;
        assert_eq!(parse_structured(raw), ParseOutcome::Fallback(raw.to_string()));
    }

    #[test]
    fn blank_results_is_fallback() {
        assert!(matches!(
            parse_structured(r#"{"results": ["  "]}"#),
            ParseOutcome::Fallback(_)
        ));
    }

    #[test]
    fn wrong_shape_is_fallback() {
        assert!(matches!(
            parse_structured(r#"{"messages": ["a"]}"#),
            ParseOutcome::Fallback(_)
        ));
        assert!(matches!(
            parse_structured(r#"{"results": [1, 2]}"#),
            ParseOutcome::Fallback(_)
        ));
    }
}
