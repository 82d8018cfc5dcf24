//! Revision collection
//!
//! Turns the release history of a repository into the ordered list of
//! revisions to harvest: one per published release, in the order reported by
//! the hosting service, followed by the tip of the development branch.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use itr_common::DEVELOPMENT_BRANCH;

use crate::descriptor::{self, GRADLE_PROPERTIES, POM_XML};
use crate::hosting::HostingApi;
use crate::{Error, Result};

/// Where a revision comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKind {
    /// A published release
    Release,
    /// The tip of the development branch
    Development,
}

/// One point in a repository's history to harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Human-readable version label, names the harvest directory
    pub version: String,
    /// Commit SHA, tag or branch resolvable by git
    pub commit_ref: String,
    /// Release or development tip
    pub kind: RevisionKind,
}

impl Revision {
    /// A published release at `commit_ref`
    pub fn release(version: impl Into<String>, commit_ref: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commit_ref: commit_ref.into(),
            kind: RevisionKind::Release,
        }
    }

    /// The tip of `branch`, labelled `version`
    pub fn development(version: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commit_ref: branch.into(),
            kind: RevisionKind::Development,
        }
    }

    /// Whether this is the development tip
    pub fn is_development(&self) -> bool {
        self.kind == RevisionKind::Development
    }
}

/// What to do when two revisions of one repository share a version label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateVersionPolicy {
    /// Abort the repository
    Error,
    /// Keep the earliest revision with the label
    KeepFirst,
    /// Keep the latest revision with the label
    #[default]
    KeepLast,
}

impl DuplicateVersionPolicy {
    /// Apply the policy, preserving the relative order of kept revisions
    pub fn apply(self, repository: &str, revisions: Vec<Revision>) -> Result<Vec<Revision>> {
        let mut seen = HashSet::new();
        match self {
            DuplicateVersionPolicy::Error => {
                let mut labels = HashSet::new();
                for revision in &revisions {
                    if !labels.insert(revision.version.as_str()) {
                        return Err(Error::DuplicateVersion {
                            repository: repository.to_string(),
                            version: revision.version.clone(),
                        });
                    }
                }
                Ok(revisions)
            }
            DuplicateVersionPolicy::KeepFirst => Ok(revisions
                .into_iter()
                .filter(|r| {
                    let fresh = seen.insert(r.version.clone());
                    if !fresh {
                        warn!(repository, version = %r.version, commit = %r.commit_ref, "Dropping duplicate version");
                    }
                    fresh
                })
                .collect()),
            DuplicateVersionPolicy::KeepLast => {
                let mut kept: Vec<Revision> = revisions
                    .into_iter()
                    .rev()
                    .filter(|r| {
                        let fresh = seen.insert(r.version.clone());
                        if !fresh {
                            warn!(repository, version = %r.version, commit = %r.commit_ref, "Dropping duplicate version");
                        }
                        fresh
                    })
                    .collect();
                kept.reverse();
                Ok(kept)
            }
        }
    }
}

impl FromStr for DuplicateVersionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "first" => Ok(Self::KeepFirst),
            "last" => Ok(Self::KeepLast),
            _ => Err(format!(
                "invalid duplicate version policy '{}', must be 'error', 'first' or 'last'",
                s
            )),
        }
    }
}

impl fmt::Display for DuplicateVersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::KeepFirst => "first",
            Self::KeepLast => "last",
        })
    }
}

/// Collects the revisions of a repository through the hosting API
pub struct RevisionCollector {
    api: Arc<dyn HostingApi>,
    branch: String,
    policy: DuplicateVersionPolicy,
}

impl RevisionCollector {
    /// Create a collector using the default development branch
    pub fn new(api: Arc<dyn HostingApi>, policy: DuplicateVersionPolicy) -> Self {
        Self {
            api,
            branch: DEVELOPMENT_BRANCH.to_string(),
            policy,
        }
    }

    /// Releases of `repository` followed by the development tip.
    ///
    /// Returns an empty list, without probing the development branch, when
    /// the repository has no published release. `checkout`, if given, is a
    /// local working tree of the development branch used as a descriptor
    /// fallback.
    pub async fn list_revisions(
        &self,
        repository: &str,
        checkout: Option<&Path>,
    ) -> Result<Vec<Revision>> {
        let releases: Vec<_> = self
            .api
            .list_releases(repository)
            .await?
            .into_iter()
            .filter(|r| !r.draft)
            .collect();

        if releases.is_empty() {
            info!(repository, "No releases found, skipping");
            return Ok(Vec::new());
        }

        let tags: HashMap<String, String> = self
            .api
            .list_tags(repository)
            .await?
            .into_iter()
            .map(|t| (t.name, t.commit.sha))
            .collect();

        let mut revisions: Vec<Revision> = releases
            .into_iter()
            .map(|release| {
                let commit_ref = tags
                    .get(&release.tag_name)
                    .cloned()
                    .unwrap_or_else(|| release.tag_name.clone());
                Revision::release(release.tag_name, commit_ref)
            })
            .collect();

        let version = self
            .resolve_development_version(repository, checkout)
            .await?;
        revisions.push(Revision::development(version, &self.branch));

        let revisions = self.policy.apply(repository, revisions)?;
        debug!(
            repository,
            versions = %revisions.iter().map(|r| r.version.as_str()).collect::<Vec<_>>().join(", "),
            "Collected revisions"
        );
        Ok(revisions)
    }

    /// Version label of the development branch.
    ///
    /// Reads `version=` from the branch's remote `gradle.properties`; if that
    /// is unavailable, reads the `pom.xml` project descriptor from `checkout`
    /// or, without a checkout, from the branch remotely.
    pub async fn resolve_development_version(
        &self,
        repository: &str,
        checkout: Option<&Path>,
    ) -> Result<String> {
        match self
            .api
            .fetch_raw(repository, &self.branch, GRADLE_PROPERTIES)
            .await
        {
            Ok(Some(content)) => {
                if let Some(version) = descriptor::version_from_properties(&content) {
                    return Ok(version);
                }
                debug!(repository, "gradle.properties declares no version");
            }
            Ok(None) => debug!(repository, "No remote gradle.properties"),
            Err(e) => warn!(repository, error = %e, "Failed to fetch gradle.properties"),
        }

        let version = match checkout {
            Some(dir) => descriptor::local_version(dir).await?,
            None => match self.api.fetch_raw(repository, &self.branch, POM_XML).await? {
                Some(content) => descriptor::version_from_pom(&content)?,
                None => None,
            },
        };

        version.ok_or_else(|| Error::DevelopmentVersionUnresolved {
            repository: repository.to_string(),
        })
    }
}
