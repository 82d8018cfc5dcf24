//! Artifact categories of a Cypress test project
//!
//! Every category lives at a fixed sub-path of the conventional Cypress layout
//! (inside a repository checkout and inside a provisioned project alike) and
//! is harvested into a directory of its own name.

use std::fmt;
use std::path::PathBuf;

/// One kind of E2E test artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactCategory {
    /// Custom Cypress commands (`support/commands`)
    Commands,
    /// Gherkin feature files (`integration`)
    Features,
    /// Cucumber step definitions (`support/step_definitions`)
    Steps,
    /// Static test fixtures (`fixtures`)
    Fixtures,
}

impl ArtifactCategory {
    /// All categories, in harvest order
    pub const ALL: [ArtifactCategory; 4] = [
        ArtifactCategory::Commands,
        ArtifactCategory::Features,
        ArtifactCategory::Steps,
        ArtifactCategory::Fixtures,
    ];

    /// Directory name inside a harvested version directory
    pub fn harvest_dir(&self) -> &'static str {
        match self {
            ArtifactCategory::Commands => "commands",
            ArtifactCategory::Features => "features",
            ArtifactCategory::Steps => "steps",
            ArtifactCategory::Fixtures => "fixtures",
        }
    }

    /// Relative path of the category inside a Cypress project directory
    pub fn project_path(&self) -> PathBuf {
        match self {
            ArtifactCategory::Commands => PathBuf::from("support").join("commands"),
            ArtifactCategory::Features => PathBuf::from("integration"),
            ArtifactCategory::Steps => PathBuf::from("support").join("step_definitions"),
            ArtifactCategory::Fixtures => PathBuf::from("fixtures"),
        }
    }
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.harvest_dir())
    }
}
