//! Sparse checkout extraction
//!
//! Clones a repository once with a sparse working tree limited to its test
//! directory, then walks the revision list, checking out each revision and
//! moving its artifacts into `<out>/<version>/<category>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, instrument, trace, warn};

use itr_common::error::IoResultExt;
use itr_common::sync::accept_all;
use itr_common::{empty_dir, sync_tree, ArtifactCategory, TransferMode, DEVELOPMENT_BRANCH};

use crate::descriptor;
use crate::git::{CloneSource, VersionControl};
use crate::revisions::{DuplicateVersionPolicy, Revision};
use crate::{Error, Result};

/// Paths materialized by the sparse checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseScope {
    /// Test directory relative to the repository root
    pub test_dir: String,
    /// Additional directories to materialize
    pub extra_paths: Vec<String>,
}

impl SparseScope {
    /// Scope covering only `test_dir`
    pub fn new(test_dir: impl Into<String>) -> Self {
        Self {
            test_dir: test_dir.into(),
            extra_paths: Vec::new(),
        }
    }

    /// Directories handed to `sparse-checkout set`
    pub fn relative_dirs(&self) -> Vec<String> {
        std::iter::once(&self.test_dir)
            .chain(self.extra_paths.iter())
            .map(|p| p.trim_matches('/').to_string())
            .collect()
    }
}

/// Harvests the test artifacts of repository revisions
pub struct Extractor {
    vcs: Arc<dyn VersionControl>,
    source: CloneSource,
    work_root: PathBuf,
    branch: String,
    policy: DuplicateVersionPolicy,
}

impl Extractor {
    /// Create an extractor cloning from `source` into the system temp directory
    pub fn new(vcs: Arc<dyn VersionControl>, source: CloneSource) -> Self {
        Self {
            vcs,
            source,
            work_root: std::env::temp_dir(),
            branch: DEVELOPMENT_BRANCH.to_string(),
            policy: DuplicateVersionPolicy::default(),
        }
    }

    /// Policy for a development version read from the checkout that collides
    /// with a listed release
    pub fn with_policy(mut self, policy: DuplicateVersionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create temporary clones below `work_root` instead
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    /// Harvest `revisions` of `repository` into `out_path`.
    ///
    /// Releases are processed in list order, the development tip last. A
    /// revision whose checkout lacks the test directory is skipped. The
    /// temporary clone is removed whether or not extraction succeeds.
    #[instrument(skip_all, fields(repository = %repository))]
    pub async fn extract(
        &self,
        repository: &str,
        revisions: &[Revision],
        out_path: &Path,
        scope: &SparseScope,
    ) -> Result<()> {
        if revisions.is_empty() {
            info!("No versions found, skipping");
            return Ok(());
        }
        info!(
            versions = %revisions.iter().map(|r| r.version.as_str()).collect::<Vec<_>>().join(", "),
            "Collecting tests"
        );

        fs::create_dir_all(&self.work_root)
            .await
            .at_path(&self.work_root)?;
        let clone_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", repository))
            .tempdir_in(&self.work_root)
            .at_path(&self.work_root)?;

        let result = self
            .harvest_all(repository, clone_dir.path(), revisions, out_path, scope)
            .await;

        trace!(path = %clone_dir.path().display(), "Removing temporary clone");
        let path = clone_dir.path().to_path_buf();
        if let Err(e) = clone_dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary clone");
            if result.is_ok() {
                return Err(itr_common::Error::io(path, e).into());
            }
        }
        result
    }

    async fn harvest_all(
        &self,
        repository: &str,
        workdir: &Path,
        revisions: &[Revision],
        out_path: &Path,
        scope: &SparseScope,
    ) -> Result<()> {
        let url = self.source.url_for(repository)?;
        debug!(path = %workdir.display(), "Cloning");
        self.vcs.clone_no_checkout(workdir, &url).await?;
        self.vcs
            .sparse_checkout(workdir, scope.relative_dirs())
            .await?;

        for revision in revisions.iter().filter(|r| !r.is_development()) {
            debug!(version = %revision.version, commit = %revision.commit_ref, "Checking out");
            self.vcs.checkout(workdir, &revision.commit_ref).await?;
            harvest_version(workdir, scope, out_path, &revision.version).await?;
        }

        let development = revisions.iter().find(|r| r.is_development());
        let branch = development.map_or(self.branch.as_str(), |r| r.commit_ref.as_str());
        debug!(branch, "Checking out development branch");
        self.vcs.checkout(workdir, branch).await?;

        let version = match development {
            Some(revision) => revision.version.clone(),
            None => {
                let version = descriptor::local_version(workdir).await?.ok_or_else(|| {
                    Error::DevelopmentVersionUnresolved {
                        repository: repository.to_string(),
                    }
                })?;
                if revisions.iter().any(|r| r.version == version) {
                    match self.policy {
                        DuplicateVersionPolicy::Error => {
                            return Err(Error::DuplicateVersion {
                                repository: repository.to_string(),
                                version,
                            })
                        }
                        DuplicateVersionPolicy::KeepFirst => {
                            warn!(version = %version, branch, "Development version already released, keeping release");
                            return Ok(());
                        }
                        DuplicateVersionPolicy::KeepLast => {
                            warn!(version = %version, branch, "Development version already released, replacing release");
                        }
                    }
                }
                version
            }
        };
        harvest_version(workdir, scope, out_path, &version).await
    }
}

/// Move the artifacts of the current checkout into `out_path/version`
async fn harvest_version(
    workdir: &Path,
    scope: &SparseScope,
    out_path: &Path,
    version: &str,
) -> Result<()> {
    let tests = workdir.join(&scope.test_dir);
    if !fs::try_exists(&tests).await.at_path(&tests)? {
        debug!(version, "No e2e tests in this version, skipping");
        return Ok(());
    }

    let version_dir = out_path.join(version);
    empty_dir(&version_dir).await?;

    for category in ArtifactCategory::ALL {
        let from = tests.join(category.project_path());
        let to = version_dir.join(category.harvest_dir());
        trace!(%category, from = %from.display(), "Moving artifacts");
        sync_tree(&from, &to, TransferMode::Move, accept_all).await?;
    }
    debug!(version, "Harvested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockVersionControl;
    use mockall::predicate::{always, eq};
    use mockall::Sequence;

    const TESTS: &str = "cypress";

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn source() -> CloneSource {
        CloneSource {
            base_url: "https://github.com".to_string(),
            organization: "scm-manager".to_string(),
            token: None,
        }
    }

    fn extractor(vcs: MockVersionControl, work_root: &Path) -> Extractor {
        Extractor::new(Arc::new(vcs), source()).with_work_root(work_root)
    }

    fn expect_clone(vcs: &mut MockVersionControl, seq: &mut Sequence) {
        vcs.expect_clone_no_checkout()
            .with(always(), eq("https://github.com/scm-manager/scm-review-plugin"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
        vcs.expect_sparse_checkout()
            .withf(|_, paths| paths == &vec![TESTS.to_string()])
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
    }

    #[tokio::test]
    async fn harvests_release_and_skips_development_without_tests() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();

        expect_clone(&mut vcs, &mut seq);
        vcs.expect_checkout()
            .with(always(), eq("abc123"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|dir, _| {
                write(dir, "cypress/integration/login.feature", "Feature: login");
                Ok(())
            });
        vcs.expect_checkout()
            .with(always(), eq("develop"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|dir, _| {
                let _ = std::fs::remove_dir_all(dir.join(TESTS));
                Ok(())
            });

        let revisions = vec![
            Revision::release("1.0.0", "abc123"),
            Revision::development("1.1.0-SNAPSHOT", "develop"),
        ];
        extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &revisions,
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(out.path().join("1.0.0/features/login.feature")).unwrap(),
            "Feature: login"
        );
        assert!(!out.path().join("1.1.0-SNAPSHOT").exists());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn every_category_lands_in_its_harvest_dir() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();

        expect_clone(&mut vcs, &mut seq);
        vcs.expect_checkout()
            .with(always(), eq("develop"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|dir, _| {
                write(dir, "cypress/integration/review/create.feature", "Feature: create");
                write(dir, "cypress/support/step_definitions/review.js", "// steps");
                write(dir, "cypress/support/commands/review.js", "// commands");
                write(dir, "cypress/fixtures/review.json", "{}");
                Ok(())
            });

        let revisions = vec![Revision::development("2.1.0-SNAPSHOT", "develop")];
        extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &revisions,
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap();

        let version = out.path().join("2.1.0-SNAPSHOT");
        assert!(version.join("features/review/create.feature").is_file());
        assert!(version.join("steps/review.js").is_file());
        assert!(version.join("commands/review.js").is_file());
        assert!(version.join("fixtures/review.json").is_file());
    }

    #[tokio::test]
    async fn development_version_read_from_checkout_when_not_listed() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();

        expect_clone(&mut vcs, &mut seq);
        vcs.expect_checkout()
            .with(always(), eq("abc123"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        vcs.expect_checkout()
            .with(always(), eq("develop"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|dir, _| {
                write(dir, "gradle.properties", "version=9.9.9-SNAPSHOT\n");
                write(dir, "cypress/fixtures/user.json", "{}");
                Ok(())
            });

        extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &[Revision::release("1.0.0", "abc123")],
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap();

        assert!(out.path().join("9.9.9-SNAPSHOT/fixtures/user.json").is_file());
        assert!(!out.path().join("1.0.0").exists());
    }

    #[tokio::test]
    async fn stale_version_directory_is_replaced() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(out.path(), "1.0.0/features/removed.feature", "Feature: gone");

        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();
        expect_clone(&mut vcs, &mut seq);
        vcs.expect_checkout()
            .with(always(), eq("develop"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|dir, _| {
                write(dir, "cypress/integration/login.feature", "Feature: login");
                Ok(())
            });

        extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &[Revision::development("1.0.0", "develop")],
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap();

        assert!(!out.path().join("1.0.0/features/removed.feature").exists());
        assert!(out.path().join("1.0.0/features/login.feature").is_file());
    }

    #[tokio::test]
    async fn clone_failure_aborts_and_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();

        vcs.expect_clone_no_checkout().times(1).returning(|_, _| {
            Err(Error::Git {
                args: "clone --no-checkout".to_string(),
                code: Some(128),
                stderr: "repository not found".to_string(),
            })
        });
        vcs.expect_sparse_checkout().times(0);
        vcs.expect_checkout().times(0);

        let err = extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &[Revision::release("1.0.0", "abc123")],
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Git { code: Some(128), .. }));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn checkout_failure_stops_remaining_revisions() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();

        expect_clone(&mut vcs, &mut seq);
        vcs.expect_checkout()
            .with(always(), eq("abc123"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(Error::Git {
                    args: "checkout -f abc123".to_string(),
                    code: Some(1),
                    stderr: "reference is not a tree".to_string(),
                })
            });
        vcs.expect_checkout().with(always(), eq("def456")).times(0);
        vcs.expect_checkout().with(always(), eq("develop")).times(0);

        let revisions = vec![
            Revision::release("1.0.0", "abc123"),
            Revision::release("1.1.0", "def456"),
            Revision::development("1.2.0-SNAPSHOT", "develop"),
        ];
        let result = extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &revisions,
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_revision_list_never_clones() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_no_checkout().times(0);

        extractor(vcs, work.path())
            .extract("scm-review-plugin", &[], out.path(), &SparseScope::new(TESTS))
            .await
            .unwrap();

        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    fn expect_release_then_develop(vcs: &mut MockVersionControl, seq: &mut Sequence) {
        expect_clone(vcs, seq);
        vcs.expect_checkout()
            .with(always(), eq("aaa"))
            .times(1)
            .in_sequence(seq)
            .returning(|dir, _| {
                write(dir, "cypress/integration/aaa.feature", "Feature: aaa");
                Ok(())
            });
        vcs.expect_checkout()
            .with(always(), eq("bbb"))
            .times(1)
            .in_sequence(seq)
            .returning(|dir, _| {
                write(dir, "cypress/integration/bbb.feature", "Feature: bbb");
                Ok(())
            });
        vcs.expect_checkout()
            .with(always(), eq("develop"))
            .times(1)
            .in_sequence(seq)
            .returning(|dir, _| {
                write(dir, "gradle.properties", "version=1.1.0\n");
                write(dir, "cypress/integration/develop.feature", "Feature: develop");
                Ok(())
            });
    }

    fn colliding_revisions(policy: DuplicateVersionPolicy) -> crate::Result<Vec<Revision>> {
        policy.apply(
            "scm-review-plugin",
            vec![
                Revision::release("1.0.0", "aaa"),
                Revision::release("1.1.0", "bbb"),
                Revision::development("1.1.0", "develop"),
            ],
        )
    }

    fn feature_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn keep_first_preserves_release_over_development_checkout() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();
        expect_release_then_develop(&mut vcs, &mut seq);

        let revisions = colliding_revisions(DuplicateVersionPolicy::KeepFirst).unwrap();
        assert!(revisions.iter().all(|r| !r.is_development()));

        extractor(vcs, work.path())
            .with_policy(DuplicateVersionPolicy::KeepFirst)
            .extract(
                "scm-review-plugin",
                &revisions,
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap();

        assert_eq!(feature_names(&out.path().join("1.0.0/features")), vec!["aaa.feature"]);
        assert_eq!(feature_names(&out.path().join("1.1.0/features")), vec!["bbb.feature"]);
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn error_policy_rejects_development_version_of_a_release() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();
        expect_release_then_develop(&mut vcs, &mut seq);

        let revisions = vec![
            Revision::release("1.0.0", "aaa"),
            Revision::release("1.1.0", "bbb"),
        ];
        let err = extractor(vcs, work.path())
            .with_policy(DuplicateVersionPolicy::Error)
            .extract(
                "scm-review-plugin",
                &revisions,
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateVersion { ref version, .. } if version == "1.1.0"));
        assert_eq!(feature_names(&out.path().join("1.1.0/features")), vec!["bbb.feature"]);
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn keep_last_lets_development_checkout_win() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();
        expect_release_then_develop(&mut vcs, &mut seq);

        let revisions = vec![
            Revision::release("1.0.0", "aaa"),
            Revision::release("1.1.0", "bbb"),
        ];
        extractor(vcs, work.path())
            .extract(
                "scm-review-plugin",
                &revisions,
                out.path(),
                &SparseScope::new(TESTS),
            )
            .await
            .unwrap();

        assert_eq!(
            feature_names(&out.path().join("1.1.0/features")),
            vec!["develop.feature"]
        );
    }

    #[test]
    fn sparse_scope_includes_extra_paths() {
        let scope = SparseScope {
            test_dir: "scm-ui/e2e-tests/cypress/".to_string(),
            extra_paths: vec!["/scm-ui/e2e-tests/fixtures".to_string()],
        };
        assert_eq!(
            scope.relative_dirs(),
            vec!["scm-ui/e2e-tests/cypress", "scm-ui/e2e-tests/fixtures"]
        );
    }
}
