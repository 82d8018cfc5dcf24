//! Init command - scaffold BDD E2E testing in a plugin repository

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use itr_harvest::PLUGIN_TEST_DIR;

use crate::commands::provision::PLUGINS_INDEX;
use crate::{Error, Result};

/// Script registered as `e2e` in `package.json`
pub const E2E_SCRIPT: &str = "integration-test-runner run -u scmadmin -p scmadmin -d ./src/test/e2e";

const SUPPORT_INDEX: &str = "import \"./commands\";\n";

const COMMANDS_INDEX: &str = r#"// Custom commands of this plugin, e.g.
//
// Cypress.Commands.add("openReview", (repository, id) => {
//   cy.visit(`/repo/${repository}/pull-request/${id}`);
// });
"#;

const STEP_DEFINITIONS_INDEX: &str = r#"// Step definitions of this plugin, e.g.
//
// import { Given } from "cypress-cucumber-preprocessor/steps";
//
// Given("a pull request exists", () => {});
"#;

/// Initialize a plugin for BDD E2E testing
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Plugin root containing `package.json`
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,
}

pub async fn run(args: InitArgs) -> Result<()> {
    update_package_json(&args.directory).await?;
    let created = scaffold(&args.directory).await?;
    info!(files = created.len(), "Initialized E2E tests");
    Ok(())
}

/// Register the `e2e` script, keeping every other entry
pub async fn update_package_json(root: &Path) -> Result<()> {
    let path = root.join("package.json");
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::validation(format!(
                "no package.json in {}",
                root.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let mut package: Value = serde_json::from_str(&content)?;
    let Some(object) = package.as_object_mut() else {
        return Err(Error::validation("package.json is not a JSON object"));
    };
    let scripts = object
        .entry("scripts")
        .or_insert_with(|| Value::Object(Default::default()));
    let Some(scripts) = scripts.as_object_mut() else {
        return Err(Error::validation("package.json scripts is not a JSON object"));
    };
    scripts.insert("e2e".to_string(), Value::String(E2E_SCRIPT.to_string()));

    let mut output = serde_json::to_string_pretty(&package)?;
    output.push('\n');
    fs::write(&path, output).await?;
    debug!(path = %path.display(), "Registered e2e script");
    Ok(())
}

/// Create the Cypress folder layout; existing files are left alone.
///
/// Returns the files that were written.
pub async fn scaffold(root: &Path) -> Result<Vec<PathBuf>> {
    let cypress = root.join(PLUGIN_TEST_DIR);
    let files = [
        (cypress.join("cypress.json"), "{}\n"),
        (cypress.join("plugins").join("index.js"), PLUGINS_INDEX),
        (cypress.join("support").join("index.js"), SUPPORT_INDEX),
        (
            cypress.join("support").join("commands").join("index.js"),
            COMMANDS_INDEX,
        ),
        (
            cypress
                .join("support")
                .join("step_definitions")
                .join("index.js"),
            STEP_DEFINITIONS_INDEX,
        ),
    ];

    let mut created = Vec::new();
    for (path, content) in files {
        if fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Already exists, keeping");
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        created.push(path);
    }
    Ok(created)
}
