//! Code-hosting API access
//!
//! Lists repositories, releases and tags of the organization and fetches raw
//! files from a branch. [`HostingApi`] abstracts the service for testability;
//! [`GithubClient`] is the REST implementation.

use std::sync::LazyLock;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use itr_common::{ACCESS_TOKEN_ENV, DEFAULT_ORGANIZATION};

use crate::{Error, Result};

/// Default REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default raw-file endpoint
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Page size for paginated listings
const PER_PAGE: usize = 100;

const USER_AGENT: &str = concat!("integration-test-runner/", env!("CARGO_PKG_VERSION"));

static PLUGIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^scm-[a-z-]+-plugin$").expect("plugin repository pattern is valid")
});

/// A published release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Tag the release was published from
    pub tag_name: String,
    /// Unpublished draft (no tag exists yet)
    #[serde(default)]
    pub draft: bool,
}

/// A tag and the commit it points to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    /// Tag name
    pub name: String,
    /// Tagged commit
    pub commit: TagCommit,
}

/// Commit reference of a [`Tag`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagCommit {
    /// Commit SHA
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct RepositorySummary {
    name: String,
}

/// Trait for the code-hosting service
///
/// All listings preserve the order reported by the service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Names of all repositories in the organization
    async fn list_repositories(&self) -> Result<Vec<String>>;

    /// Releases of a repository
    async fn list_releases(&self, repository: &str) -> Result<Vec<Release>>;

    /// Tags of a repository
    async fn list_tags(&self, repository: &str) -> Result<Vec<Tag>>;

    /// Content of `path` on `branch`, or `None` if it cannot be fetched
    async fn fetch_raw(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<String>>;
}

/// Whether a repository name follows the plugin naming convention
pub fn is_plugin_repository(name: &str) -> bool {
    PLUGIN_PATTERN.is_match(name)
}

/// List the plugin repositories of the organization
pub async fn plugin_repositories<A: HostingApi + ?Sized>(api: &A) -> Result<Vec<String>> {
    let mut plugins = Vec::new();
    for name in api.list_repositories().await? {
        if is_plugin_repository(&name) {
            plugins.push(name);
        } else {
            debug!(repository = %name, "Skipped non-plugin repository");
        }
    }
    Ok(plugins)
}

/// Connection settings for [`GithubClient`]
#[derive(Debug, Clone)]
pub struct HostingConfig {
    /// REST endpoint base URL
    pub api_url: String,
    /// Raw-file endpoint base URL
    pub raw_url: String,
    /// Organization owning the repositories
    pub organization: String,
    /// Access token, sent when present
    pub token: Option<String>,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            raw_url: DEFAULT_RAW_URL.to_string(),
            organization: DEFAULT_ORGANIZATION.to_string(),
            token: std::env::var(ACCESS_TOKEN_ENV)
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }
}

/// REST client for the hosting service
pub struct GithubClient {
    http: reqwest::Client,
    config: HostingConfig,
}

impl GithubClient {
    /// Create a client for the given configuration
    pub fn new(config: HostingConfig) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, config })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn paginate<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1u32.. {
            let url = format!("{}?per_page={}&page={}", self.api(path), PER_PAGE, page);
            trace!(%url, "Fetching page");

            let mut request = self
                .http
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json");
            if let Some(token) = &self.config.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::HostingStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            let batch: Vec<T> = response.json().await?;
            let last_page = batch.len() < PER_PAGE;
            items.extend(batch);
            if last_page {
                break;
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl HostingApi for GithubClient {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let repos: Vec<RepositorySummary> = self
            .paginate(&format!("orgs/{}/repos", self.config.organization))
            .await?;
        Ok(repos.into_iter().map(|r| r.name).collect())
    }

    async fn list_releases(&self, repository: &str) -> Result<Vec<Release>> {
        self.paginate(&format!(
            "repos/{}/{}/releases",
            self.config.organization, repository
        ))
        .await
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<Tag>> {
        self.paginate(&format!(
            "repos/{}/{}/tags",
            self.config.organization, repository
        ))
        .await
    }

    async fn fetch_raw(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_url.trim_end_matches('/'),
            self.config.organization,
            repository,
            branch,
            path
        );

        let mut request = self.http.get(&url);
        if let Some(token) = &self.config.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            debug!(%url, status = response.status().as_u16(), "Raw file not available");
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn client_for(server: &mockito::ServerGuard, token: Option<&str>) -> GithubClient {
        GithubClient::new(HostingConfig {
            api_url: server.url(),
            raw_url: server.url(),
            organization: "scm-manager".to_string(),
            token: token.map(str::to_string),
        })
        .unwrap()
    }

    #[rstest]
    #[case("scm-review-plugin", true)]
    #[case("scm-landingpage-plugin", true)]
    #[case("scm-manager", false)]
    #[case("scm-Review-plugin", false)]
    #[case("scm-review-plugin-old", false)]
    #[case("scm-2fa-plugin", false)]
    fn plugin_naming(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_plugin_repository(name), expected);
    }

    #[tokio::test]
    async fn plugin_repositories_filters_names() {
        let mut api = MockHostingApi::new();
        api.expect_list_repositories().returning(|| {
            Ok(vec![
                "scm-manager".to_string(),
                "scm-review-plugin".to_string(),
                "website".to_string(),
                "scm-editor-plugin".to_string(),
            ])
        });

        let plugins = plugin_repositories(&api).await.unwrap();
        assert_eq!(plugins, vec!["scm-review-plugin", "scm-editor-plugin"]);
    }

    #[tokio::test]
    async fn releases_are_read_across_pages() {
        let mut server = mockito::Server::new_async().await;

        let full_page: Vec<String> = (0..PER_PAGE)
            .map(|i| format!(r#"{{"tag_name":"1.{}.0","target_commitish":"master"}}"#, i))
            .collect();
        let page_one = server
            .mock("GET", "/repos/scm-manager/scm-review-plugin/releases")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!("[{}]", full_page.join(",")))
            .expect(1)
            .create_async()
            .await;
        let page_two = server
            .mock("GET", "/repos/scm-manager/scm-review-plugin/releases")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"tag_name":"2.0.0","target_commitish":"master","draft":false}]"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let releases = client.list_releases("scm-review-plugin").await.unwrap();

        page_one.assert_async().await;
        page_two.assert_async().await;
        assert_eq!(releases.len(), PER_PAGE + 1);
        assert_eq!(releases[0].tag_name, "1.0.0");
        assert_eq!(releases[PER_PAGE].tag_name, "2.0.0");
    }

    #[tokio::test]
    async fn listing_failure_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/orgs/scm-manager/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.list_repositories().await.unwrap_err();
        assert!(matches!(err, Error::HostingStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn raw_fetch_returns_none_when_missing() {
        let mut server = mockito::Server::new_async().await;
        let found = server
            .mock("GET", "/scm-manager/scm-review-plugin/develop/gradle.properties")
            .match_header("authorization", "token secret")
            .with_status(200)
            .with_body("group=sonia.scm.plugins\nversion=2.1.0-SNAPSHOT\n")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/scm-manager/scm-review-plugin/develop/pom.xml")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let props = client
            .fetch_raw("scm-review-plugin", "develop", "gradle.properties")
            .await
            .unwrap();
        let pom = client
            .fetch_raw("scm-review-plugin", "develop", "pom.xml")
            .await
            .unwrap();

        found.assert_async().await;
        assert!(props.unwrap().contains("version=2.1.0-SNAPSHOT"));
        assert!(pom.is_none());
    }
}
