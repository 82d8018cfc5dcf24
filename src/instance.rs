//! Client for a running scm-manager instance
//!
//! Only what provisioning needs: wait for the server, log in, and read the
//! core version and installed plugins.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use itr_common::poll::poll_until;

use crate::{Error, Result};

/// Default instance URL
pub const DEFAULT_INSTANCE_URL: &str = "http://localhost:8081/scm";

const API_PATH: &str = "api/v2/";

/// Readiness probe attempts before giving up
pub const AVAILABILITY_ATTEMPTS: u32 = 180;

/// Pause between readiness probes
pub const AVAILABILITY_INTERVAL: Duration = Duration::from_secs(1);

/// Timeout of a single readiness probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A component installed on the instance, identified by name and version
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstalledComponent {
    pub name: String,
    pub version: String,
}

impl InstalledComponent {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    grant_type: &'a str,
    cookie: bool,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct IndexResource {
    version: String,
}

#[derive(Deserialize)]
struct PluginCollection {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedPlugins,
}

#[derive(Deserialize)]
struct EmbeddedPlugins {
    #[serde(default)]
    plugins: Vec<InstalledComponent>,
}

/// REST client for one instance
pub struct ScmInstance {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    attempts: u32,
    interval: Duration,
}

impl ScmInstance {
    /// Client for the instance at `url` (e.g. `http://localhost:8081/scm`)
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            url: url.trim_end_matches('/').to_string(),
            token: None,
            attempts: AVAILABILITY_ATTEMPTS,
            interval: AVAILABILITY_INTERVAL,
        })
    }

    /// Override the readiness probe schedule
    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts;
        self.interval = interval;
        self
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}{}", self.url, API_PATH, path.trim_start_matches('/'))
    }

    /// Poll the API root until it answers 200.
    ///
    /// Connection errors and other statuses count as "not yet".
    pub async fn wait_until_available(&self) -> Result<()> {
        let url = self.api("");
        let http = &self.http;

        let result = poll_until(self.attempts, self.interval, "scm-manager", || {
            let request = http.get(&url).timeout(PROBE_TIMEOUT);
            async move {
                match request.send().await {
                    Ok(response) if response.status() == StatusCode::OK => Ok(Some(())),
                    Ok(response) => {
                        debug!(status = response.status().as_u16(), "Server not ready");
                        Ok(None)
                    }
                    Err(e) => {
                        debug!(error = %e, "Server not reachable");
                        Ok(None)
                    }
                }
            }
        })
        .await;

        match result {
            Ok(()) => {
                info!(url = %self.url, "Server available");
                Ok(())
            }
            Err(itr_common::Error::PollExhausted { attempts, .. }) => Err(Error::ServerUnavailable {
                url: self.url.clone(),
                attempts,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Exchange credentials for a bearer token used by later requests
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let url = self.api("auth/access_token");
        let response = self
            .http
            .post(&url)
            .json(&AccessTokenRequest {
                grant_type: "password",
                cookie: false,
                username,
                password,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                url,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(Error::InstanceStatus {
                url,
                status: status.as_u16(),
            });
        }

        self.token = Some(response.text().await?.trim().to_string());
        debug!(username, "Logged in");
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api(path);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::InstanceStatus {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// Version of the core product
    pub async fn core_version(&self) -> Result<String> {
        let index: IndexResource = self.get_json("").await?;
        Ok(index.version)
    }

    /// Installed plugins with their versions
    pub async fn installed_plugins(&self) -> Result<Vec<InstalledComponent>> {
        let collection: PluginCollection = self.get_json("plugins/installed").await?;
        Ok(collection.embedded.plugins)
    }
}
