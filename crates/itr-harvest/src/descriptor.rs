//! Build descriptor parsing
//!
//! Gradle builds declare their version in `gradle.properties`, Maven builds in
//! the `pom.xml` project descriptor (possibly inherited from the parent).

use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::trace;

use crate::{Error, Result};

/// Gradle properties file holding `version=...`
pub const GRADLE_PROPERTIES: &str = "gradle.properties";

/// Maven project descriptor
pub const POM_XML: &str = "pom.xml";

#[derive(Debug, Deserialize)]
struct PomProject {
    version: Option<String>,
    parent: Option<PomParent>,
}

#[derive(Debug, Deserialize)]
struct PomParent {
    version: Option<String>,
}

/// Extract the `version` property from a properties file
pub fn version_from_properties(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "version")
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract the project version from a `pom.xml`, falling back to the parent version
pub fn version_from_pom(content: &str) -> Result<Option<String>> {
    let project: PomProject =
        quick_xml::de::from_str(content).map_err(|e| Error::descriptor(e.to_string()))?;

    let own = project.version.map(|v| v.trim().to_string());
    let inherited = project
        .parent
        .and_then(|p| p.version)
        .map(|v| v.trim().to_string());

    Ok(own.or(inherited).filter(|v| !v.is_empty()))
}

/// Resolve the version declared by the descriptors of a local checkout.
///
/// Tries `gradle.properties` first, then `pom.xml`. Returns `None` when
/// neither file exists or declares a version.
pub async fn local_version(checkout: &Path) -> Result<Option<String>> {
    if let Some(content) = read_optional(&checkout.join(GRADLE_PROPERTIES)).await? {
        if let Some(version) = version_from_properties(&content) {
            trace!(%version, "Version from local gradle.properties");
            return Ok(Some(version));
        }
    }

    match read_optional(&checkout.join(POM_XML)).await? {
        Some(content) => version_from_pom(&content),
        None => Ok(None),
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(itr_common::Error::io(path, e).into()),
    }
}
