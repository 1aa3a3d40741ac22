//! Persisted campaign configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Name of the directory, relative to the campaign directory, holding run outputs.
pub const DATA_DIR_NAME: &str = "data";

/// Configuration written once at campaign creation and read back at load.
///
/// The engine passes it through without interpreting the commit or parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Simulation script identifier, resolved relative to `path`.
    pub script: String,
    /// Simulator installation path.
    pub path: PathBuf,
    /// Parameter names accepted by the simulator.
    #[serde(default)]
    pub params: BTreeSet<String>,
    /// Source revision fingerprint of the simulator tree.
    pub commit: String,
    pub campaign_dir: PathBuf,
    #[serde(default)]
    pub created_at: String,
}

impl CampaignConfig {
    pub fn new(
        script: impl Into<String>,
        path: impl Into<PathBuf>,
        params: BTreeSet<String>,
        commit: impl Into<String>,
        campaign_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            script: script.into(),
            path: path.into(),
            params,
            commit: commit.into(),
            campaign_dir: campaign_dir.into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.campaign_dir.join(DATA_DIR_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}
