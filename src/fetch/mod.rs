//! Fetching documentation sources
//!
//! Repositories are shallow-cloned into the cache directory with the `git`
//! binary and refreshed with a fast-forward pull on later runs.

use crate::error::{Error, Result};
use async_trait::async_trait;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Makes a source available on the local filesystem
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url`, returning the directory holding its files
    async fn fetch(&self, url: &str) -> Result<PathBuf>;
}

/// Clones and updates git repositories under a cache directory
#[derive(Debug, Clone)]
pub struct GitFetcher {
    cache_dir: PathBuf,
    depth: u32,
}

impl GitFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>, depth: u32) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            depth,
        }
    }

    /// Where a repository url is checked out
    pub fn local_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(url_to_path(url))
    }

    /// `git clone` arguments; the url always follows `--`
    fn clone_args(&self, url: &str, target: &Path) -> Vec<String> {
        vec![
            "clone".to_string(),
            "--quiet".to_string(),
            "--depth".to_string(),
            self.depth.max(1).to_string(),
            "--".to_string(),
            url.to_string(),
            target.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    /// Clone or update the repository, returning its checkout directory
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let local = self.local_path(url);

        if local.join(".git").exists() {
            debug!("Updating {} in {:?}", url, local);
            if let Err(e) = run_git(&["pull", "--ff-only", "--quiet"], Some(&local)).await {
                warn!("Pull failed for {}, using existing checkout: {}", url, e);
            }
            return Ok(local);
        }

        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Cloning {}", url);
        let args = self.clone_args(url, &local);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_git(&args, None).await?;

        Ok(local)
    }
}

async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<()> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| Error::Fetch(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Fetch(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Filesystem-safe cache path for a git url
///
/// `https://github.com/golang/go.wiki.git` becomes `github.com/golang/go.wiki`
/// and `git@github.com:user/repo.git` becomes `github.com/user/repo`.
pub fn url_to_path(url: &str) -> PathBuf {
    let trimmed = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("ssh://")
        .trim_start_matches("git@");
    let trimmed = trimmed.replacen(':', "/", 1);
    let trimmed = trimmed.trim_end_matches('/').trim_end_matches(".git");

    trimmed
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect()
}

/// Files under `root` matching any of `patterns`, as sorted relative paths
///
/// With `subpaths` set, only those subdirectories are walked. Hidden
/// entries are skipped.
pub fn list_files(root: &Path, subpaths: &[String], patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in patterns {
        builder
            .add(pattern)
            .map_err(|e| Error::Config(format!("invalid pattern '{}': {}", pattern, e)))?;
    }
    let overrides = builder
        .build()
        .map_err(|e| Error::Config(format!("invalid patterns: {}", e)))?;

    let starts: Vec<PathBuf> = if subpaths.is_empty() {
        vec![root.to_path_buf()]
    } else {
        subpaths.iter().map(|p| root.join(p)).collect()
    };

    let mut files = Vec::new();
    for start in starts {
        if !start.exists() {
            warn!("Path {:?} does not exist, skipping", start);
            continue;
        }

        let walker = WalkBuilder::new(&start)
            .hidden(true)
            .git_ignore(false)
            .git_exclude(false)
            .build();

        for entry in walker {
            match entry {
                Ok(e) if e.file_type().map(|t| t.is_file()).unwrap_or(false) => {
                    let Ok(relative) = e.path().strip_prefix(root) else {
                        continue;
                    };
                    if patterns.is_empty() || overrides.matched(relative, false).is_whitelist() {
                        files.push(relative.to_path_buf());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Error walking {:?}: {}", start, e),
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "# x").unwrap();
    }

    #[test]
    fn test_url_to_path() {
        assert_eq!(
            url_to_path("https://github.com/golang/go.wiki.git"),
            PathBuf::from("github.com/golang/go.wiki")
        );
        assert_eq!(
            url_to_path("git@github.com:uber-go/guide.git"),
            PathBuf::from("github.com/uber-go/guide")
        );
        assert_eq!(
            url_to_path("https://example.com/../etc/"),
            PathBuf::from("example.com/etc")
        );
    }

    #[test]
    fn test_clone_url_is_never_an_option() {
        let fetcher = GitFetcher::new("/cache", 0);
        let args = fetcher.clone_args("--upload-pack=touch x", Path::new("/cache/x"));

        let dashes = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[dashes + 1], "--upload-pack=touch x");
        assert_eq!(args[..dashes], ["clone", "--quiet", "--depth", "1"]);
        assert_eq!(args.last().unwrap(), "/cache/x");
    }

    #[test]
    fn test_list_files_with_patterns() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "README.md");
        touch(root, "docs/guide.md");
        touch(root, "docs/deep/more.md");
        touch(root, "docs/image.png");
        touch(root, ".github/notes.md");

        let files = list_files(root, &[], &["**/*.md".to_string()]).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("docs/deep/more.md"),
                PathBuf::from("docs/guide.md"),
            ]
        );
    }

    #[test]
    fn test_list_files_subpaths() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "README.md");
        touch(root, "src/a.md");
        touch(root, "src/b.txt");

        let files = list_files(
            root,
            &["src".to_string(), "missing".to_string()],
            &["*.md".to_string()],
        )
        .unwrap();
        assert_eq!(files, vec![PathBuf::from("src/a.md")]);
    }

    #[tokio::test]
    async fn test_fetch_reuses_existing_checkout() {
        let tmp = TempDir::new().unwrap();
        let fetcher = GitFetcher::new(tmp.path(), 1);
        let url = "https://example.invalid/team/repo.git";

        // a checkout that cannot pull is still returned
        let local = fetcher.local_path(url);
        std::fs::create_dir_all(local.join(".git")).unwrap();

        assert_eq!(fetcher.fetch(url).await.unwrap(), local);
    }
}
