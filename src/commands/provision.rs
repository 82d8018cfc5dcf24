//! Provision command - assemble a runnable Cypress project for one instance
//!
//! Reads the core version and installed plugins of a running scm-manager and
//! copies exactly the matching harvested versions into the project:
//! 1. Wait for the instance and log in
//! 2. Determine the components under test
//! 3. Empty the project and copy each component's artifacts
//! 4. Write the support and plugins entry files

use std::path::{Path, PathBuf};

use clap::Args;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use itr_common::sync::{accept_all, has_extension, not_named};
use itr_common::{empty_dir, sync_tree, ArtifactCategory, TransferMode, CORE_REPOSITORY};

use crate::instance::{InstalledComponent, ScmInstance, DEFAULT_INSTANCE_URL};
use crate::Result;

/// Plugins bundled with the core; their tests ship with the core repository
pub const BUNDLED_PLUGINS: [&str; 4] = [
    "scm-git-plugin",
    "scm-hg-plugin",
    "scm-svn-plugin",
    "scm-legacy-plugin",
];

const FEATURE_EXTENSIONS: &[&str] = &["feature", "features"];

/// `plugins/index.js` registering the Cucumber preprocessor
pub const PLUGINS_INDEX: &str = r#"const cucumber = require("cypress-cucumber-preprocessor").default;

module.exports = (on, config) => {
  on("file:preprocessor", cucumber());
  return config;
};
"#;

/// Prepare the run command for a given instance's version and plugins
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// URL of the scm-manager instance
    #[arg(short = 'a', long, env = "SCM_URL", default_value = DEFAULT_INSTANCE_URL)]
    pub url: String,

    /// scm-manager account username
    #[arg(short, long, env = "SCM_USERNAME")]
    pub username: String,

    /// scm-manager account password
    #[arg(short, long, env = "SCM_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Directory holding the harvested tests
    #[arg(long, default_value = "./e2e-tests")]
    pub tests_dir: PathBuf,

    /// Cypress project root; artifacts are written to its `cypress` folder
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,
}

pub async fn run(args: ProvisionArgs) -> Result<()> {
    let mut instance = ScmInstance::new(&args.url)?;
    instance.wait_until_available().await?;

    info!("Collecting versions from scm-manager instance");
    instance.login(&args.username, &args.password).await?;
    let core_version = instance.core_version().await?;
    let plugins = instance.installed_plugins().await?;

    let components = components_under_test(plugins, core_version);
    info!(
        components = %components
            .iter()
            .map(|c| format!("{}@{}", c.name, c.version))
            .collect::<Vec<_>>()
            .join(", "),
        "Collecting tests to run"
    );

    let project = args.directory.join("cypress");
    let provisioned = provision(&args.tests_dir, &project, &components).await?;
    info!(
        provisioned = provisioned.len(),
        project = %project.display(),
        "Project provisioned"
    );
    Ok(())
}

/// Installed plugins without the bundled ones, plus the core at `core_version`
pub fn components_under_test(
    plugins: Vec<InstalledComponent>,
    core_version: String,
) -> Vec<InstalledComponent> {
    let mut components: Vec<InstalledComponent> = plugins
        .into_iter()
        .filter(|p| !BUNDLED_PLUGINS.contains(&p.name.as_str()))
        .collect();
    components.push(InstalledComponent::new(CORE_REPOSITORY, core_version));
    components
}

/// Copy the harvested artifacts of `components` into the Cypress `project`.
///
/// The project is emptied first. Components without harvested tests for the
/// installed version are skipped. Returns the components that were copied.
#[instrument(skip_all, fields(project = %project.display()))]
pub async fn provision(
    tests_dir: &Path,
    project: &Path,
    components: &[InstalledComponent],
) -> Result<Vec<InstalledComponent>> {
    empty_dir(project).await?;
    for category in ArtifactCategory::ALL {
        fs::create_dir_all(project.join(category.project_path())).await?;
    }

    let mut provisioned = Vec::new();
    let mut command_imports = Vec::new();

    for component in components {
        let source = tests_dir.join(&component.name).join(&component.version);
        if !fs::try_exists(&source).await? {
            warn!(
                component = %component.name,
                version = %component.version,
                "No tests collected for installed version, skipping"
            );
            continue;
        }
        debug!(component = %component.name, version = %component.version, "Copying tests");

        let versioned = PathBuf::from(&component.name).join(&component.version);
        let harvested = |category: ArtifactCategory| source.join(category.harvest_dir());
        let target = |category: ArtifactCategory| project.join(category.project_path());

        sync_tree(
            &harvested(ArtifactCategory::Features),
            &target(ArtifactCategory::Features).join(&versioned),
            TransferMode::Copy,
            has_extension(FEATURE_EXTENSIONS),
        )
        .await?;
        sync_tree(
            &harvested(ArtifactCategory::Steps),
            &target(ArtifactCategory::Steps).join(&versioned),
            TransferMode::Copy,
            not_named("index.js"),
        )
        .await?;
        sync_tree(
            &harvested(ArtifactCategory::Fixtures),
            &target(ArtifactCategory::Fixtures),
            TransferMode::Copy,
            accept_all,
        )
        .await?;

        let commands = harvested(ArtifactCategory::Commands);
        if fs::try_exists(&commands).await? {
            sync_tree(
                &commands,
                &target(ArtifactCategory::Commands).join(&component.name),
                TransferMode::Copy,
                accept_all,
            )
            .await?;
            command_imports.push(component.name.clone());
        }

        provisioned.push(component.clone());
    }

    fs::write(
        project.join("support").join("index.js"),
        support_index(&command_imports),
    )
    .await?;

    let plugins_index = project.join("plugins").join("index.js");
    if !fs::try_exists(&plugins_index).await? {
        fs::create_dir_all(project.join("plugins")).await?;
        fs::write(&plugins_index, PLUGINS_INDEX).await?;
    }

    Ok(provisioned)
}

/// `support/index.js` importing the commands of every provisioned component
pub fn support_index(components: &[String]) -> String {
    components
        .iter()
        .map(|name| format!("import \"./commands/{}\";\n", name))
        .collect()
}
