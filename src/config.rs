//! Settings shared by the harvesting commands

use clap::Args;

use itr_common::{ACCESS_TOKEN_ENV, DEFAULT_ORGANIZATION};
use itr_harvest::git::DEFAULT_GIT_BASE_URL;
use itr_harvest::hosting::{DEFAULT_API_URL, DEFAULT_RAW_URL};
use itr_harvest::{CloneSource, DuplicateVersionPolicy, HostingConfig};

/// Where repositories are discovered and cloned from
#[derive(Args, Debug, Clone)]
pub struct HarnessSettings {
    /// Organization owning the core and plugin repositories
    #[arg(long, env = "ITR_ORGANIZATION", default_value = DEFAULT_ORGANIZATION, global = true)]
    pub organization: String,

    /// Hosting REST API base URL
    #[arg(long, env = "ITR_GITHUB_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub github_api_url: String,

    /// Base URL for raw file downloads
    #[arg(long, env = "ITR_GITHUB_RAW_URL", default_value = DEFAULT_RAW_URL, global = true)]
    pub github_raw_url: String,

    /// Base URL repositories are cloned from
    #[arg(long, env = "ITR_GIT_BASE_URL", default_value = DEFAULT_GIT_BASE_URL, global = true)]
    pub git_base_url: String,

    /// Access token for the hosting API and clones
    #[arg(long, env = ACCESS_TOKEN_ENV, hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// How to treat two revisions resolving to the same version (error, first, last)
    #[arg(long, env = "ITR_DUPLICATE_VERSIONS", default_value = "last", global = true)]
    pub duplicate_versions: DuplicateVersionPolicy,
}

impl HarnessSettings {
    fn token(&self) -> Option<String> {
        self.github_token.clone().filter(|t| !t.is_empty())
    }

    /// Connection settings for the hosting API
    pub fn hosting_config(&self) -> HostingConfig {
        HostingConfig {
            api_url: self.github_api_url.clone(),
            raw_url: self.github_raw_url.clone(),
            organization: self.organization.clone(),
            token: self.token(),
        }
    }

    /// Clone source for the organization's repositories
    pub fn clone_source(&self) -> CloneSource {
        CloneSource {
            base_url: self.git_base_url.clone(),
            organization: self.organization.clone(),
            token: self.token(),
        }
    }
}
