//! Harvest pipeline
//!
//! Collects the test artifacts of the core repository and every plugin
//! repository into `<tests_dir>/<repository>/<version>`. Repositories are
//! processed concurrently; one failing repository never cancels the others.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, instrument};

use itr_common::CORE_REPOSITORY;
use itr_harvest::hosting::plugin_repositories;
use itr_harvest::{
    Extractor, GitCli, GithubClient, HostingApi, RevisionCollector, SparseScope, CORE_TEST_DIR,
    PLUGIN_TEST_DIR,
};

use crate::config::HarnessSettings;
use crate::{Error, Result};

/// A repository to harvest and where its tests live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestTarget {
    pub repository: String,
    pub scope: SparseScope,
}

impl HarvestTarget {
    /// The core repository
    pub fn core() -> Self {
        Self {
            repository: CORE_REPOSITORY.to_string(),
            scope: SparseScope::new(CORE_TEST_DIR),
        }
    }

    /// A plugin repository
    pub fn plugin(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            scope: SparseScope::new(PLUGIN_TEST_DIR),
        }
    }
}

/// Runs revision collection and extraction for every repository
pub struct Harvester {
    api: Arc<dyn HostingApi>,
    collector: RevisionCollector,
    extractor: Extractor,
}

impl Harvester {
    pub fn new(api: Arc<dyn HostingApi>, collector: RevisionCollector, extractor: Extractor) -> Self {
        Self {
            api,
            collector,
            extractor,
        }
    }

    /// Harvester talking to the hosting service and cloning with `git`
    pub fn from_settings(settings: &HarnessSettings) -> Result<Self> {
        let api: Arc<dyn HostingApi> = Arc::new(GithubClient::new(settings.hosting_config())?);
        let collector = RevisionCollector::new(api.clone(), settings.duplicate_versions);
        let extractor = Extractor::new(Arc::new(GitCli::new()), settings.clone_source())
            .with_policy(settings.duplicate_versions);
        Ok(Self::new(api, collector, extractor))
    }

    /// The core repository followed by all plugin repositories
    pub async fn targets(&self) -> Result<Vec<HarvestTarget>> {
        let mut targets = vec![HarvestTarget::core()];
        targets.extend(
            plugin_repositories(self.api.as_ref())
                .await?
                .into_iter()
                .map(HarvestTarget::plugin),
        );
        Ok(targets)
    }

    /// Harvest every target into `tests_dir`.
    ///
    /// Fails with [`Error::HarvestFailed`] naming the failed repositories once
    /// all of them have finished.
    pub async fn harvest_all(&self, tests_dir: &Path) -> Result<()> {
        let targets = self.targets().await?;
        info!(repositories = targets.len(), "Collecting tests");

        let results = join_all(
            targets
                .iter()
                .map(|target| async move { (target, self.harvest(target, tests_dir).await) }),
        )
        .await;

        let failed: Vec<String> = results
            .into_iter()
            .filter_map(|(target, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    error!(repository = %target.repository, error = %e, "Failed to collect tests");
                    Some(target.repository.clone())
                }
            })
            .collect();

        if failed.is_empty() {
            info!("All tests collected");
            Ok(())
        } else {
            Err(Error::HarvestFailed { failed })
        }
    }

    /// Harvest one target into `<tests_dir>/<repository>`
    #[instrument(skip_all, fields(repository = %target.repository))]
    pub async fn harvest(&self, target: &HarvestTarget, tests_dir: &Path) -> Result<()> {
        let revisions = self
            .collector
            .list_revisions(&target.repository, None)
            .await?;
        self.extractor
            .extract(
                &target.repository,
                &revisions,
                &tests_dir.join(&target.repository),
                &target.scope,
            )
            .await?;
        Ok(())
    }
}
