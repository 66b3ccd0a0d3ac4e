// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Integration tests for self-review-git
//!
//! These tests build real repositories on disk with controlled timestamps
//! and exercise discovery, identity resolution and extraction end to end.

mod common;

use std::collections::BTreeSet;

use common::{RepoBuilder, TempTestDir, date};
use self_review_git::{
    AuthorFilter, AuthorMatchMode, Commit, Cursor, GitError, GitRepo, Locator, RepoIdentity,
    WalkOptions,
};
use similar_asserts::assert_eq;

fn jane() -> AuthorFilter {
    AuthorFilter::new("jane", AuthorMatchMode::Token).expect("valid author")
}

fn collect(repo: &GitRepo, options: &WalkOptions) -> Vec<Commit> {
    repo.commits(options)
        .expect("walk")
        .collect::<Result<Vec<_>, _>>()
        .expect("extract")
}

fn hashes(commits: &[Commit]) -> Vec<String> {
    commits.iter().map(|c| c.hash.clone()).collect()
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_extracts_only_matching_author_oldest_first() {
    let dir = TempTestDir::new("extract-author");
    let builder = RepoBuilder::init(&dir.join("proj"));
    let a = builder.jane("a.txt", "Add a", date(2025, 1, 15));
    builder.commit_at(
        "b.txt",
        "b",
        "Bob's change",
        ("Bob Smith", "bob@co.com"),
        date(2025, 2, 1),
    );
    let c = builder.jane("src/c.rs", "Add c\n\nWith a body", date(2025, 2, 20));

    let repo = GitRepo::open(builder.path()).expect("open");
    let commits = collect(&repo, &WalkOptions::default().by(jane()));

    assert_eq!(hashes(&commits), vec![a.to_string(), c.to_string()]);
    assert_eq!(commits[0].files_changed, vec!["a.txt".to_string()]);
    assert_eq!(commits[1].files_changed, vec!["src/c.rs".to_string()]);
    assert_eq!(commits[1].subject(), "Add c");
    assert_eq!(commits[1].message, "Add c\n\nWith a body");
    assert_eq!(commits[1].timestamp, date(2025, 2, 20));
    assert_eq!(commits[1].author_name, "Jane Doe");
    assert_eq!(commits[1].author_email, "jane@co.com");
    assert!(commits[0].parents.is_empty());
}

#[test]
fn test_token_and_substring_modes_differ() {
    let dir = TempTestDir::new("extract-modes");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 1, 15));

    let repo = GitRepo::open(builder.path()).expect("open");

    let token = AuthorFilter::new("jan", AuthorMatchMode::Token).expect("author");
    assert!(collect(&repo, &WalkOptions::default().by(token)).is_empty());

    let substring = AuthorFilter::new("jan", AuthorMatchMode::Substring).expect("author");
    assert_eq!(collect(&repo, &WalkOptions::default().by(substring)).len(), 1);
}

#[test]
fn test_cursor_hides_ancestors_not_older_timestamps() {
    let dir = TempTestDir::new("extract-cursor");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 1, 10));
    builder.jane("b.txt", "Add b", date(2025, 2, 10));

    let repo = GitRepo::open(builder.path()).expect("open");
    let first = collect(&repo, &WalkOptions::default().by(jane()));
    let cursor = Cursor::newest(&first).expect("cursor");

    let c = builder.jane("c.txt", "Add c", date(2025, 3, 10));
    // Committed after the cursor but carrying an older timestamp
    let backdated = builder.jane("d.txt", "Backdated", date(2025, 1, 5));

    let repo = GitRepo::open(builder.path()).expect("reopen");
    let second = collect(&repo, &WalkOptions::default().by(jane()).after(Some(cursor)));

    let got: BTreeSet<String> = hashes(&second).into_iter().collect();
    let want: BTreeSet<String> = [c.to_string(), backdated.to_string()].into();
    assert_eq!(got, want);
}

#[test]
fn test_refetch_with_newest_cursor_is_empty() {
    let dir = TempTestDir::new("extract-refetch");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 1, 10));
    builder.jane("b.txt", "Add b", date(2025, 2, 10));

    let repo = GitRepo::open(builder.path()).expect("open");
    let all = collect(&repo, &WalkOptions::default().by(jane()));
    let cursor = Cursor::newest(&all);

    assert!(collect(&repo, &WalkOptions::default().by(jane()).after(cursor)).is_empty());
}

#[test]
fn test_rewritten_history_falls_back_to_timestamp() {
    let dir = TempTestDir::new("extract-rewrite");
    let builder = RepoBuilder::init(&dir.join("proj"));
    let a = builder.jane("a.txt", "Add a", date(2025, 1, 10));
    builder.jane("b.txt", "Add b", date(2025, 1, 20));

    let repo = GitRepo::open(builder.path()).expect("open");
    let cursor = Cursor::newest(&collect(&repo, &WalkOptions::default())).expect("cursor");

    // Drop b from history and build on a instead
    builder.reset_hard(a);
    let c = builder.jane("c.txt", "Add c", date(2025, 1, 25));
    let d = builder.jane("d.txt", "Add d", date(2025, 2, 1));

    let repo = GitRepo::open(builder.path()).expect("reopen");
    let commits = collect(&repo, &WalkOptions::default().by(jane()).after(Some(cursor)));

    assert_eq!(hashes(&commits), vec![c.to_string(), d.to_string()]);
}

#[test]
fn test_merge_commit_reports_diff_against_first_parent() {
    let dir = TempTestDir::new("extract-merge");
    let builder = RepoBuilder::init(&dir.join("proj"));
    let a = builder.jane("a.txt", "Add a", date(2025, 1, 1));
    let b = builder.jane("b.txt", "Add b", date(2025, 1, 2));
    builder.branch("feature", b);
    builder.reset_hard(a);
    builder.jane("c.txt", "Add c", date(2025, 1, 3));
    let merge = builder.merge_at("b.txt", "Add b", "Merge feature", b, date(2025, 1, 4));

    let repo = GitRepo::open(builder.path()).expect("open");
    let commits = collect(&repo, &WalkOptions::default());
    let commit = commits
        .iter()
        .find(|c| c.hash == merge.to_string())
        .expect("merge commit");

    assert_eq!(commit.parents.len(), 2);
    assert_eq!(commit.files_changed, vec!["b.txt".to_string()]);
}

#[test]
fn test_since_until_window_and_limit() {
    let dir = TempTestDir::new("extract-window");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2024, 12, 31));
    let b = builder.jane("b.txt", "Add b", date(2025, 1, 1));
    let c = builder.jane("c.txt", "Add c", date(2025, 6, 30));
    builder.jane("d.txt", "Add d", date(2026, 1, 1));

    let repo = GitRepo::open(builder.path()).expect("open");
    let window = WalkOptions::default()
        .since(date(2025, 1, 1))
        .until(date(2026, 1, 1));
    assert_eq!(
        hashes(&collect(&repo, &window)),
        vec![b.to_string(), c.to_string()]
    );

    let first = WalkOptions::first(1).since(date(2025, 1, 1)).without_files();
    let commits = collect(&repo, &first);
    assert_eq!(hashes(&commits), vec![b.to_string()]);
    assert!(commits[0].files_changed.is_empty());
}

#[test]
fn test_empty_repository_yields_nothing() {
    let dir = TempTestDir::new("extract-empty");
    let builder = RepoBuilder::init(&dir.join("proj"));

    let repo = GitRepo::open(builder.path()).expect("open");
    assert!(collect(&repo, &WalkOptions::default()).is_empty());
    assert!(!repo.has_commits_by(&jane(), date(2025, 1, 1), date(2026, 1, 1)).expect("scan"));
    assert!(matches!(
        repo.resolve_identity(),
        Err(GitError::Unidentifiable { .. })
    ));
}

#[test]
fn test_has_commits_by_respects_window() {
    let dir = TempTestDir::new("has-commits");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2024, 6, 1));
    builder.commit_at("b.txt", "b", "Bob", ("Bob Smith", "bob@co.com"), date(2025, 3, 1));

    let repo = GitRepo::open(builder.path()).expect("open");
    let bob = AuthorFilter::new("bob", AuthorMatchMode::Token).expect("author");

    assert!(!repo.has_commits_by(&jane(), date(2025, 1, 1), date(2026, 1, 1)).expect("scan"));
    assert!(repo.has_commits_by(&jane(), date(2024, 1, 1), date(2025, 1, 1)).expect("scan"));
    assert!(repo.has_commits_by(&bob, date(2025, 1, 1), date(2026, 1, 1)).expect("scan"));
}

#[test]
fn test_has_commits_by_sees_past_skewed_clock() {
    let dir = TempTestDir::new("has-commits-skew");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 6, 1));
    // Child committed on a machine whose clock was a year behind.
    builder.commit_at("b.txt", "b", "Bob", ("Bob Smith", "bob@co.com"), date(2024, 1, 1));

    let repo = GitRepo::open(builder.path()).expect("open");
    assert!(repo.has_commits_by(&jane(), date(2025, 1, 1), date(2026, 1, 1)).expect("scan"));
}

#[test]
fn test_open_non_repository() {
    let dir = TempTestDir::new("open-missing");
    assert!(matches!(
        GitRepo::open(dir.path()),
        Err(GitError::RepositoryNotFound { .. })
    ));
}

// ============================================================================
// Identity and worktrees
// ============================================================================

#[test]
fn test_identity_prefers_remote_then_root_commit() {
    let dir = TempTestDir::new("identity");
    let builder = RepoBuilder::init(&dir.join("proj"));
    let root = builder.jane("a.txt", "Add a", date(2025, 1, 1));

    let repo = GitRepo::open(builder.path()).expect("open");
    assert_eq!(
        repo.resolve_identity().expect("identity"),
        RepoIdentity::from_root_commit(&root.to_string())
    );

    builder.set_origin("git@github.com:Acme/Proj.git");
    let repo = GitRepo::open(builder.path()).expect("reopen");
    let identity = repo.resolve_identity().expect("identity");
    assert_eq!(identity.as_str(), "github.com/acme/proj");
}

#[test]
fn test_worktree_resolves_to_primary_identity() {
    let dir = TempTestDir::new("worktree-identity");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 1, 1));
    let wt_path = builder.add_worktree("feature", &dir.join("proj-feature"));

    let primary = GitRepo::open(builder.path()).expect("open primary");
    let worktree = GitRepo::open(&wt_path).expect("open worktree");

    assert!(!primary.is_worktree());
    assert!(worktree.is_worktree());
    assert!(worktree.primary_workdir().is_some());
    assert_eq!(
        worktree.resolve_identity().expect("worktree identity"),
        primary.resolve_identity().expect("primary identity")
    );
}

#[test]
fn test_worktree_commits_visible_from_primary() {
    let dir = TempTestDir::new("worktree-commits");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 1, 1));
    let wt_path = builder.add_worktree("feature", &dir.join("proj-feature"));

    let wt = RepoBuilder::open(&wt_path);
    let on_branch = wt.jane("f.txt", "Feature work", date(2025, 1, 5));

    let primary = GitRepo::open(builder.path()).expect("open primary");
    let commits = collect(&primary, &WalkOptions::default().by(jane()));
    assert!(hashes(&commits).contains(&on_branch.to_string()));
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_locator_collapses_worktrees_to_primary() {
    let dir = TempTestDir::new("locate-worktrees");
    let builder = RepoBuilder::init(&dir.join("proj"));
    builder.jane("a.txt", "Add a", date(2025, 1, 1));
    builder.set_origin("git@github.com:acme/proj.git");
    builder.add_worktree("wt1", &dir.join("proj-wt1"));
    builder.add_worktree("wt2", &dir.join("proj-wt2"));

    let discovery = Locator::new(dir.path()).locate().expect("locate");

    assert_eq!(discovery.repos.len(), 1);
    let located = &discovery.repos[0];
    assert_eq!(located.identity.as_str(), "github.com/acme/proj");
    assert_eq!(
        located.path,
        builder.path().canonicalize().expect("canonical")
    );
    assert!(!located.is_worktree);
    assert_eq!(located.duplicates.len(), 2);
}

#[test]
fn test_locator_collapses_clones_with_equivalent_remotes() {
    let dir = TempTestDir::new("locate-clones");
    let one = RepoBuilder::init(&dir.join("one"));
    one.jane("a.txt", "Add a", date(2025, 1, 1));
    one.set_origin("https://github.com/acme/proj.git");
    let two = RepoBuilder::init(&dir.join("two"));
    two.jane("b.txt", "Add b", date(2025, 1, 2));
    two.set_origin("git@github.com:acme/proj");

    let discovery = Locator::new(dir.path()).locate().expect("locate");

    assert_eq!(discovery.repos.len(), 1);
    assert_eq!(discovery.repos[0].duplicates.len(), 1);
}

#[test]
fn test_locator_org_filter() {
    let dir = TempTestDir::new("locate-org");
    let acme = RepoBuilder::init(&dir.join("acme-proj"));
    acme.jane("a.txt", "Add a", date(2025, 1, 1));
    acme.set_origin("git@github.com:acme/proj.git");
    let other = RepoBuilder::init(&dir.join("other-tool"));
    other.jane("a.txt", "Add a", date(2025, 1, 1));
    other.set_origin("https://github.com/other/tool.git");
    let local = RepoBuilder::init(&dir.join("scratch"));
    local.jane("a.txt", "Add a", date(2025, 1, 1));

    let all = Locator::new(dir.path()).locate().expect("locate");
    assert_eq!(all.repos.len(), 3);

    let filtered = Locator::new(dir.path())
        .org(Some("acme"))
        .locate()
        .expect("locate");
    assert_eq!(filtered.repos.len(), 1);
    assert_eq!(filtered.repos[0].identity.as_str(), "github.com/acme/proj");
}

#[test]
fn test_locator_does_not_descend_into_repositories() {
    let dir = TempTestDir::new("locate-nested");
    let outer = RepoBuilder::init(&dir.join("outer"));
    outer.jane("a.txt", "Add a", date(2025, 1, 1));
    let inner = RepoBuilder::init(&dir.join("outer/vendor/inner"));
    inner.jane("b.txt", "Add b", date(2025, 1, 1));

    let discovery = Locator::new(dir.path()).locate().expect("locate");

    assert_eq!(discovery.repos.len(), 1);
    assert!(discovery.repos[0].path.ends_with("outer"));
}

#[test]
fn test_locator_skips_broken_and_empty_repositories() {
    let dir = TempTestDir::new("locate-broken");
    let good = RepoBuilder::init(&dir.join("good"));
    good.jane("a.txt", "Add a", date(2025, 1, 1));
    std::fs::create_dir_all(dir.join("broken/.git")).expect("create broken repo");
    RepoBuilder::init(&dir.join("empty"));

    let discovery = Locator::new(dir.path()).locate().expect("locate");

    assert_eq!(discovery.repos.len(), 1);
    assert!(discovery.repos[0].path.ends_with("good"));
    let skipped: Vec<_> = discovery
        .skipped
        .iter()
        .filter_map(|s| s.path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert!(skipped.contains(&"broken".to_string()));
    assert!(skipped.contains(&"empty".to_string()));
}

#[test]
fn test_locator_respects_max_depth() {
    let dir = TempTestDir::new("locate-depth");
    let deep = RepoBuilder::init(&dir.join("a/b/c/deep"));
    deep.jane("a.txt", "Add a", date(2025, 1, 1));

    let shallow = Locator::new(dir.path()).max_depth(2).locate().expect("locate");
    assert!(shallow.repos.is_empty());

    let full = Locator::new(dir.path()).max_depth(4).locate().expect("locate");
    assert_eq!(full.repos.len(), 1);
}
