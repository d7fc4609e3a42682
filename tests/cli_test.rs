//! CLI contract tests
//!
//! Runs the built binary against a small repository: chain selection output,
//! statistics, and the startup checks of the corpus command.

use git2::{Repository, Signature, Time};
use std::path::Path;
use std::process::Command;

const DAY: i64 = 24 * 60 * 60;

fn tangle_bin() -> &'static str {
    env!("CARGO_BIN_EXE_tangle-pdg")
}

fn commit(repo: &Repository, author: &str, path: &str, content: &str, message: &str, day: i64) {
    let full = repo.workdir().unwrap().join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(&full, content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::new(author, "dev@example.com", &Time::new(1_600_000_000 + day * DAY, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
}

fn setup_test_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit(&repo, "Owner", "A.java", "class A {\n}\n", "Initial import", 0);
    commit(&repo, "Dev", "A.java", "class A {\n  int x;\n}\n", "Add field", 1);
    commit(&repo, "Dev", "A.java", "class A {\n  int x;\n  int y;\n}\n", "Second field", 2);
    commit(&repo, "Dev", "A.java", "class A {\n  // fields\n  int x;\n  int y;\n}\n", "Fix and update docs", 3);
    dir
}

fn run(args: &[&str], cwd: &Path) -> (i32, String, String) {
    let output = Command::new(tangle_bin())
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run tangle-pdg");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn test_select_writes_chain_list() {
    let repo = setup_test_repo();
    let work = tempfile::tempdir().unwrap();
    let out = work.path().join("chains.json");

    let (code, _, stderr) = run(
        &["select", repo.path().to_str().unwrap(), "-o", out.to_str().unwrap()],
        work.path(),
    );
    assert_eq!(code, 0, "stderr: {}", stderr);

    let chains: Vec<Vec<String>> = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    // "Fix and update docs" names two intents and cannot extend the chain
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].len(), 2);
}

#[test]
fn test_stats_json() {
    let repo = setup_test_repo();
    let (code, stdout, stderr) = run(&["stats", repo.path().to_str().unwrap(), "--json"], repo.path());
    assert_eq!(code, 0, "stderr: {}", stderr);

    let v: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON");
    assert_eq!(v["project"]["commits"], 4);
    assert_eq!(v["project"]["source_files"], 1);
    assert_eq!(v["project"]["code_lines"], 4);
    assert!(v["chains"].is_null());
}

#[test]
fn test_corpus_rejects_zero_workers() {
    let repo = setup_test_repo();
    let (code, _, stderr) = run(
        &["corpus", "chains.json", repo.path().to_str().unwrap(), "tmp", "x.jar", "0", "0"],
        repo.path(),
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("workers must be at least 1"), "stderr: {}", stderr);
}

#[test]
fn test_corpus_requires_extractor() {
    let repo = setup_test_repo();
    let work = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run(
        &[
            "corpus",
            "chains.json",
            repo.path().to_str().unwrap(),
            "tmp",
            "/nonexistent/extractor.jar",
            "0",
            "2",
        ],
        work.path(),
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("Extractor not found"), "stderr: {}", stderr);
    assert!(!work.path().join("chains.json").exists());
}

#[test]
fn test_corpus_requires_git_repository() {
    let not_repo = tempfile::tempdir().unwrap();
    let jar = not_repo.path().join("extractor.jar");
    std::fs::write(&jar, "").unwrap();
    let (code, _, stderr) = run(
        &[
            "corpus",
            "chains.json",
            not_repo.path().to_str().unwrap(),
            "tmp",
            jar.to_str().unwrap(),
            "0",
            "1",
        ],
        not_repo.path(),
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("Not a git repository"), "stderr: {}", stderr);
}
