//! GitHub import contract.
//!
//! Fetching is done by an external client; this module owns the pieces that
//! must behave identically for every client: URL parsing, ref fallback,
//! HTTP status mapping and re-rooting a fetched tree at a subdirectory.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::snapshot::Snapshot;

pub const DEFAULT_REF: &str = "main";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitHubImportError {
    #[error("Not a GitHub repository URL: {0}")]
    UrlInvalidFormat(String),

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("Authentication required to access {0}")]
    AuthRequired(String),

    #[error("GitHub rate limit exceeded")]
    RateLimited,

    #[error("Ref not found: {0}")]
    RefNotFound(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),
}

impl GitHubImportError {
    pub fn code(&self) -> &'static str {
        match self {
            GitHubImportError::UrlInvalidFormat(_) => "E_GITHUB_URL_INVALID_FORMAT",
            GitHubImportError::NotFound(_) => "E_GITHUB_NOT_FOUND",
            GitHubImportError::AuthRequired(_) => "E_GITHUB_AUTH_REQUIRED",
            GitHubImportError::RateLimited => "E_GITHUB_RATE_LIMITED",
            GitHubImportError::RefNotFound(_) => "E_GITHUB_REF_NOT_FOUND",
            GitHubImportError::FetchFailed(_) => "E_GITHUB_FETCH_FAILED",
        }
    }
}

/// A parsed `github.com/<owner>/<repo>[/tree/<ref>[/<subdir>]]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepoRef {
    pub owner: String,
    pub repo: String,
    pub git_ref: Option<String>,
    pub subdir: Option<String>,
}

impl GitHubRepoRef {
    /// The ref to fetch: the explicit one, else the repository default
    /// branch, else `main`.
    pub fn resolve_ref<'a>(&'a self, default_branch: Option<&'a str>) -> &'a str {
        self.git_ref
            .as_deref()
            .or(default_branch.filter(|b| !b.trim().is_empty()))
            .unwrap_or(DEFAULT_REF)
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn repo_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:/tree/([^/]+)((?:/[^/]+)*))?/?$",
        )
        .expect("repository URL pattern is valid")
    })
}

pub fn parse_github_repo_url(url: &str) -> Result<GitHubRepoRef, GitHubImportError> {
    let invalid = || GitHubImportError::UrlInvalidFormat(url.to_string());
    let trimmed = url.trim();

    let caps = repo_url_regex().captures(trimmed).ok_or_else(invalid)?;
    let owner = &caps[1];
    let repo = &caps[2];
    if [owner, repo].iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return Err(invalid());
    }

    let git_ref = caps.get(3).map(|m| m.as_str().to_string());
    let subdir_segments: Vec<&str> = caps
        .get(4)
        .map(|m| m.as_str().split('/').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if git_ref.as_deref() == Some("..") || subdir_segments.iter().any(|s| *s == ".." || *s == ".") {
        return Err(invalid());
    }

    Ok(GitHubRepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
        subdir: (!subdir_segments.is_empty()).then(|| subdir_segments.join("/")),
    })
}

/// Map a non-success HTTP status from the GitHub API to an import error.
pub fn classify_github_status(
    status: u16,
    rate_limit_remaining: Option<u64>,
    repo: &GitHubRepoRef,
) -> GitHubImportError {
    match status {
        401 => GitHubImportError::AuthRequired(repo.full_name()),
        403 if rate_limit_remaining == Some(0) => GitHubImportError::RateLimited,
        429 => GitHubImportError::RateLimited,
        403 => GitHubImportError::AuthRequired(repo.full_name()),
        404 => match &repo.git_ref {
            Some(git_ref) => GitHubImportError::RefNotFound(git_ref.clone()),
            None => GitHubImportError::NotFound(repo.full_name()),
        },
        other => GitHubImportError::FetchFailed(format!("HTTP {other} from GitHub for {}", repo.full_name())),
    }
}

/// Re-root a fetched repository at `subdir`. Files outside it are dropped.
pub fn scope_to_subdir(snapshot: &Snapshot, subdir: &str) -> Result<Snapshot, GitHubImportError> {
    let subdir = subdir.trim_matches('/');
    if subdir.is_empty() {
        return Ok(snapshot.clone());
    }

    let prefix = format!("{subdir}/");
    let mut scoped = Snapshot::new();
    for dir in snapshot.dirs() {
        if let Some(rest) = dir.strip_prefix(&prefix) {
            scoped.insert_dir(rest);
        }
    }
    for (path, bytes) in snapshot.iter() {
        if let Some(rest) = path.strip_prefix(&prefix) {
            scoped.insert(rest, bytes);
        }
    }

    if scoped.is_empty() && !snapshot.has_dir(subdir) {
        return Err(GitHubImportError::NotFound(subdir.to_string()));
    }
    Ok(scoped)
}

/// Source of repository snapshots. Network clients implement this; the
/// core only consumes the result.
pub trait SnapshotFetcher {
    /// The repository default branch, when the host reports one.
    fn default_branch(&self, repo: &GitHubRepoRef) -> Result<Option<String>, GitHubImportError>;

    /// Every file of `repo` at `git_ref`.
    fn fetch(&self, repo: &GitHubRepoRef, git_ref: &str) -> Result<Snapshot, GitHubImportError>;
}

/// Parse `url`, resolve its ref, fetch and scope to the requested subdirectory.
pub fn import_github_snapshot<F: SnapshotFetcher>(
    fetcher: &F,
    url: &str,
) -> Result<Snapshot, GitHubImportError> {
    let repo = parse_github_repo_url(url)?;
    let default_branch = match repo.git_ref {
        Some(_) => None,
        None => fetcher.default_branch(&repo)?,
    };
    let git_ref = repo.resolve_ref(default_branch.as_deref());

    log::debug!("Fetching {} at {git_ref}", repo.full_name());
    let snapshot = fetcher.fetch(&repo, git_ref)?;

    match &repo.subdir {
        Some(subdir) => scope_to_subdir(&snapshot, subdir),
        None => Ok(snapshot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::car_dataset;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn repo(git_ref: Option<&str>) -> GitHubRepoRef {
        GitHubRepoRef {
            owner: "foo".into(),
            repo: "bar".into(),
            git_ref: git_ref.map(str::to_string),
            subdir: None,
        }
    }

    #[test]
    fn test_parse_plain_urls() {
        for url in [
            "https://github.com/foo/bar",
            "http://github.com/foo/bar",
            "github.com/foo/bar",
            "https://www.github.com/foo/bar/",
            "https://github.com/foo/bar.git",
            "  https://github.com/foo/bar  ",
        ] {
            assert_eq!(parse_github_repo_url(url).unwrap(), repo(None), "{url}");
        }
    }

    #[test]
    fn test_parse_tree_urls() {
        let parsed = parse_github_repo_url("https://github.com/foo/bar/tree/dev").unwrap();
        assert_eq!(parsed.git_ref.as_deref(), Some("dev"));
        assert_eq!(parsed.subdir, None);

        let parsed = parse_github_repo_url("https://github.com/foo/bar/tree/v1.2/data/cars/").unwrap();
        assert_eq!(parsed.git_ref.as_deref(), Some("v1.2"));
        assert_eq!(parsed.subdir.as_deref(), Some("data/cars"));
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        for url in [
            "https://github.com/foo/bar/tree/main/../secrets",
            "https://github.com/foo/bar/tree/main/data/../../x",
            "https://github.com/foo",
            "https://github.com/foo/bar/blob/main/README.md",
            "https://gitlab.com/foo/bar",
            "https://github.com//bar",
            "https://github.com/foo/bar/tree/",
            "",
        ] {
            let err = parse_github_repo_url(url).unwrap_err();
            assert_eq!(err.code(), "E_GITHUB_URL_INVALID_FORMAT", "{url}");
        }
    }

    #[test]
    fn test_resolve_ref_fallbacks() {
        assert_eq!(repo(Some("dev")).resolve_ref(Some("trunk")), "dev");
        assert_eq!(repo(None).resolve_ref(Some("trunk")), "trunk");
        assert_eq!(repo(None).resolve_ref(None), "main");
        assert_eq!(repo(None).resolve_ref(Some(" ")), "main");
    }

    #[test]
    fn test_classify_github_status() {
        let plain = repo(None);
        let pinned = repo(Some("dev"));

        assert_eq!(classify_github_status(401, None, &plain).code(), "E_GITHUB_AUTH_REQUIRED");
        assert_eq!(classify_github_status(403, Some(0), &plain).code(), "E_GITHUB_RATE_LIMITED");
        assert_eq!(classify_github_status(403, Some(12), &plain).code(), "E_GITHUB_AUTH_REQUIRED");
        assert_eq!(classify_github_status(429, None, &plain).code(), "E_GITHUB_RATE_LIMITED");
        assert_eq!(classify_github_status(404, None, &plain).code(), "E_GITHUB_NOT_FOUND");
        assert_eq!(classify_github_status(404, None, &pinned).code(), "E_GITHUB_REF_NOT_FOUND");
        assert_eq!(classify_github_status(500, None, &plain).code(), "E_GITHUB_FETCH_FAILED");
    }

    #[test]
    fn test_scope_to_subdir() {
        let mut snapshot = Snapshot::new();
        for (path, bytes) in car_dataset().build().iter() {
            snapshot.insert(&format!("data/cars/{path}"), bytes);
        }
        snapshot.insert_dir("data/cars/records");
        snapshot.insert("README.md", "# top");

        let scoped = scope_to_subdir(&snapshot, "data/cars/").unwrap();
        assert_eq!(scoped.get("records/car/1.md"), car_dataset().build().get("records/car/1.md"));
        assert!(scoped.has_dir("records"));
        assert!(!scoped.contains("README.md"));

        assert_eq!(scope_to_subdir(&snapshot, "").unwrap(), snapshot);
        assert_eq!(
            scope_to_subdir(&snapshot, "nope").unwrap_err().code(),
            "E_GITHUB_NOT_FOUND"
        );
    }

    struct FakeFetcher {
        default_branch: Option<String>,
        fetched: RefCell<Vec<String>>,
        result: Result<Snapshot, GitHubImportError>,
    }

    impl SnapshotFetcher for FakeFetcher {
        fn default_branch(&self, _repo: &GitHubRepoRef) -> Result<Option<String>, GitHubImportError> {
            Ok(self.default_branch.clone())
        }

        fn fetch(&self, _repo: &GitHubRepoRef, git_ref: &str) -> Result<Snapshot, GitHubImportError> {
            self.fetched.borrow_mut().push(git_ref.to_string());
            self.result.clone()
        }
    }

    #[test]
    fn test_import_uses_default_branch_and_subdir() {
        let mut tree = Snapshot::new();
        tree.insert("sub/types/car.md", "x");
        let fetcher = FakeFetcher {
            default_branch: Some("trunk".into()),
            fetched: RefCell::new(Vec::new()),
            result: Ok(tree),
        };

        // no /tree/ segment means no subdir either
        let snapshot = import_github_snapshot(&fetcher, "github.com/foo/bar").unwrap();
        assert!(snapshot.contains("sub/types/car.md"));

        let snapshot = import_github_snapshot(&fetcher, "github.com/foo/bar/tree/dev/sub").unwrap();
        assert!(snapshot.contains("types/car.md"));
        assert_eq!(*fetcher.fetched.borrow(), vec!["trunk", "dev"]);
    }

    #[test]
    fn test_import_surfaces_fetch_errors() {
        let fetcher = FakeFetcher {
            default_branch: None,
            fetched: RefCell::new(Vec::new()),
            result: Err(GitHubImportError::RateLimited),
        };
        assert_eq!(
            import_github_snapshot(&fetcher, "https://github.com/foo/bar"),
            Err(GitHubImportError::RateLimited)
        );
        assert_eq!(*fetcher.fetched.borrow(), vec!["main"]);
    }
}
