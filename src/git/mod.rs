//! Local git operations.
//!
//! Everything here drives the `git` executable as a subprocess through a
//! [`Pipeline`], with an explicit working directory on every invocation:
//!
//! - [`pipeline`]: fail-fast command sequencing with accumulated diagnostics
//! - [`workspace`]: per-repository checkouts (clone-if-missing, PR mirror branches)
//! - [`squash`]: the squash-merge transaction and commit message construction

pub mod pipeline;
pub mod squash;
pub mod workspace;

pub use pipeline::{Invocation, Pipeline, PipelineError, PipelineFailure};
pub use squash::{MessageOverride, SquashError, SquashRequest, build_commit_message, reflow, squash};
pub use workspace::{DEFAULT_CLONE_URL_TEMPLATE, WorkspaceConfig, WorkspaceError, Workspaces};

/// Author and committer identity for a commit.
///
/// Passed to git as per-invocation environment variables rather than `-c`
/// flags or process-wide environment, so concurrent merges can never see each
/// other's identity and author and committer can differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
}

impl CommitIdentity {
    /// Applies this identity to a git invocation.
    pub fn apply(&self, invocation: Invocation) -> Invocation {
        invocation
            .env("GIT_AUTHOR_NAME", &self.author_name)
            .env("GIT_AUTHOR_EMAIL", &self.author_email)
            .env("GIT_COMMITTER_NAME", &self.committer_name)
            .env("GIT_COMMITTER_EMAIL", &self.committer_email)
    }
}

/// Test helpers for building throwaway repositories with a bare origin.
#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};
    use std::process::Command;

    use tempfile::TempDir;

    /// Runs git in `dir` with a fixed identity, panicking on failure.
    pub fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_AUTHOR_NAME", "Setup")
            .env("GIT_AUTHOR_EMAIL", "setup@example.com")
            .env("GIT_COMMITTER_NAME", "Setup")
            .env("GIT_COMMITTER_EMAIL", "setup@example.com")
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// A bare "origin" with a `main` branch, plus a scratch clone for authoring commits.
    pub struct TestRemote {
        pub root: TempDir,
        pub origin: PathBuf,
        pub scratch: PathBuf,
    }

    impl TestRemote {
        /// Creates `<root>/origin/<owner>/<repo>.git` with one commit on main.
        pub fn new(owner: &str, repo: &str) -> Self {
            let root = TempDir::new().unwrap();
            let origin = root.path().join("origin").join(owner).join(format!("{}.git", repo));
            std::fs::create_dir_all(&origin).unwrap();
            git(&origin, &["init", "--bare", "--initial-branch=main"]);

            let scratch = root.path().join("scratch");
            std::fs::create_dir_all(&scratch).unwrap();
            git(&scratch, &["init", "--initial-branch=main"]);
            git(&scratch, &["remote", "add", "origin", origin.to_str().unwrap()]);
            std::fs::write(scratch.join("README.md"), "# Test\n").unwrap();
            git(&scratch, &["add", "."]);
            git(&scratch, &["commit", "-m", "Initial commit"]);
            git(&scratch, &["push", "origin", "HEAD:refs/heads/main"]);

            TestRemote {
                root,
                origin,
                scratch,
            }
        }

        /// Clone URL template resolving `{repo}` under this remote's origin root.
        pub fn url_template(&self) -> String {
            format!("{}/{{repo}}.git", self.root.path().join("origin").display())
        }

        /// Commits `files` on a new branch from `base` as `author`, and publishes
        /// it as `refs/pull/<pr>/head` on origin. Returns the head SHA.
        pub fn open_pr(
            &self,
            pr: u64,
            base: &str,
            commits: &[(&str, &str, &str)],
            author: (&str, &str),
        ) -> String {
            git(&self.scratch, &["fetch", "origin", &format!("+refs/heads/{}:refs/remotes/origin/{}", base, base)]);
            git(&self.scratch, &["checkout", "-B", &format!("work-{}", pr), &format!("origin/{}", base)]);
            for (file, content, message) in commits {
                std::fs::write(self.scratch.join(file), content).unwrap();
                git(&self.scratch, &["add", file]);
                let status = Command::new("git")
                    .args(["commit", "-m", message])
                    .current_dir(&self.scratch)
                    .env("GIT_CONFIG_NOSYSTEM", "1")
                    .env("GIT_CONFIG_GLOBAL", "/dev/null")
                    .env("GIT_AUTHOR_NAME", author.0)
                    .env("GIT_AUTHOR_EMAIL", author.1)
                    .env("GIT_COMMITTER_NAME", author.0)
                    .env("GIT_COMMITTER_EMAIL", author.1)
                    .status()
                    .unwrap();
                assert!(status.success());
            }
            git(&self.scratch, &["push", "-f", "origin", &format!("HEAD:refs/pull/{}/head", pr)]);
            git(&self.scratch, &["rev-parse", "HEAD"])
        }

        /// Pushes one more commit directly onto `branch` of origin.
        pub fn advance(&self, branch: &str, file: &str, content: &str) -> String {
            git(&self.scratch, &["fetch", "origin", &format!("+refs/heads/{}:refs/remotes/origin/{}", branch, branch)]);
            git(&self.scratch, &["checkout", "-B", "advance", &format!("origin/{}", branch)]);
            std::fs::write(self.scratch.join(file), content).unwrap();
            git(&self.scratch, &["add", file]);
            git(&self.scratch, &["commit", "-m", &format!("Update {}", file)]);
            git(&self.scratch, &["push", "origin", &format!("HEAD:refs/heads/{}", branch)]);
            git(&self.scratch, &["rev-parse", "HEAD"])
        }

        /// Resolves a ref in the bare origin.
        pub fn origin_rev(&self, rev: &str) -> String {
            git(&self.origin, &["rev-parse", rev])
        }

        /// Returns true if origin has the given branch.
        pub fn origin_has_branch(&self, branch: &str) -> bool {
            Command::new("git")
                .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
                .current_dir(&self.origin)
                .status()
                .unwrap()
                .success()
        }
    }
}
