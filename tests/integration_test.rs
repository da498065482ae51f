use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use diffscribe::ai::openai::OpenAiClient;
use diffscribe::ai::{Provider, ProviderGateway};
use diffscribe::config::Config;
use diffscribe::git::{diff, FileStatus, GitRepository};
use diffscribe::summary::{PrInput, Summarizer, SummarySettings};
use git2::{Repository, Signature};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test setup that creates a temporary git repository
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().to_path_buf();
        let repo = Repository::init(&repo_path)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok(TestRepo {
            _temp_dir: temp_dir,
            repo_path,
            repo,
        })
    }

    fn stage(&self, file: &str, content: &str) -> Result<()> {
        fs::write(self.repo_path.join(file), content)?;
        let mut index = self.repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;
        Ok(())
    }

    fn add_commit(&self, message: &str, file: &str, content: &str) -> Result<git2::Oid> {
        self.stage(file, content)?;
        let mut index = self.repo.index()?;
        let signature = Signature::now("Test User", "test@example.com")?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        Ok(self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?)
    }

    fn open(&self) -> Result<GitRepository> {
        GitRepository::open_at(&self.repo_path)
    }
}

fn settings(base: Config) -> SummarySettings {
    SummarySettings::from_config(&base, Provider::OpenAi, "gpt-4o-mini".to_string())
}

#[test]
fn staged_diff_in_unborn_repository() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.stage("hello.txt", "hello\nworld\n")?;

    let patch = test_repo.open()?.staged_diff()?;
    let summary = diff::parse(&patch);

    assert_eq!(summary.files.len(), 1);
    assert_eq!(summary.files[0].filename(), "hello.txt");
    assert_eq!(summary.files[0].status(), FileStatus::Added);
    assert!(summary.files[0].content().contains("+hello"));
    Ok(())
}

#[test]
fn staged_diff_against_head() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.add_commit("feat: add notes", "notes.txt", "one\ntwo\n")?;
    test_repo.stage("notes.txt", "one\nthree\n")?;

    let patch = test_repo.open()?.staged_diff()?;
    assert!(patch.contains("-two"));
    assert!(patch.contains("+three"));

    let summary = diff::parse(&patch);
    assert_eq!(summary.files[0].status(), FileStatus::Modified);
    Ok(())
}

#[test]
fn nothing_staged_is_empty() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.add_commit("chore: init", "a.txt", "a\n")?;
    assert!(test_repo.open()?.staged_diff()?.trim().is_empty());
    Ok(())
}

#[test]
fn recent_commits_are_oldest_first() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.add_commit("feat: first", "a.txt", "1\n")?;
    test_repo.add_commit("fix: second", "a.txt", "2\n")?;
    test_repo.add_commit("docs: third\n\nLonger body.", "b.txt", "3\n")?;

    let repo = test_repo.open()?;
    assert_eq!(
        repo.commit_messages(2)?,
        vec!["fix: second", "docs: third\n\nLonger body."]
    );

    let diffs = repo.commit_diffs(2)?;
    assert_eq!(diffs.len(), 2);
    assert!(diffs[0].contains("+2"));
    assert!(diffs[1].contains("b.txt"));

    // Asking for more commits than exist returns them all.
    assert_eq!(repo.commit_messages(10)?.len(), 3);
    Ok(())
}

#[test]
fn commit_staged_creates_commit_on_head() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.stage("new.rs", "fn main() {}\n")?;

    let repo = test_repo.open()?;
    let oid = repo.commit_staged("feat: add entry point")?;

    let head = test_repo.repo.head()?.peel_to_commit()?;
    assert_eq!(head.id().to_string(), oid);
    assert_eq!(head.message(), Some("feat: add entry point"));
    assert!(repo.staged_diff()?.trim().is_empty());
    Ok(())
}

#[tokio::test]
async fn commit_message_for_staged_diff_over_http() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.stage("lib.rs", "pub fn answer() -> u32 { 42 }\n")?;
    let diff = test_repo.open()?.staged_diff()?;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "{\"results\": [\"feat: add answer\"]}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(Provider::OpenAi, "test-key".into(), server.uri())?;
    let gateway = ProviderGateway::new().with_client(Box::new(client));
    let summarizer = Summarizer::new(&gateway, settings(Config::default()));

    let result = summarizer.generate_commit(&diff).await?;
    assert_eq!(result.variations, vec!["feat: add answer"]);
    Ok(())
}

#[tokio::test]
async fn large_pr_is_chunked_and_merged_over_http() -> Result<()> {
    let test_repo = TestRepo::new()?;
    for i in 0..4 {
        let content = format!("{}\n", "line of text ".repeat(20 + i));
        test_repo.add_commit(&format!("feat: part {i}"), &format!("f{i}.txt"), &content)?;
    }
    let repo = test_repo.open()?;
    let input = PrInput {
        commit_messages: repo.commit_messages(4)?,
        diffs: repo.commit_diffs(4)?,
    };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "# Add parts\n\nFour parts were added."}}]
        })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(Provider::OpenAi, "test-key".into(), server.uri())?;
    let gateway = ProviderGateway::new().with_client(Box::new(client));
    let config = Config {
        size_threshold: 100,
        max_chunk_size: 400,
        ..Config::default()
    };
    let summarizer = Summarizer::new(&gateway, settings(config));

    let pr = summarizer.generate_pr(&input).await?;
    assert_eq!(pr.title, "Add parts");
    assert_eq!(pr.description, "Four parts were added.");

    // More than one chunk call plus the merge call.
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.len() >= 3, "got {} requests", requests.len());
    Ok(())
}
