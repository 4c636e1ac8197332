use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use server::History;

use crate::{OrchestratorError, configs::RunConfig};

const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "train_hist.json";
const WEIGHTS_FILE: &str = "global_weights.safetensors";

/// The directory where a run leaves its configuration, history and final weights.
#[derive(Debug, Clone)]
pub struct Experiment {
    dir: PathBuf,
}

impl Experiment {
    /// Creates `<output>/<name>` and stores the resolved configuration in it.
    pub fn create(run: &RunConfig) -> Result<Self, OrchestratorError> {
        let dir = run.global_config.output.join(&run.global_config.name);
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(run)?;
        fs::write(dir.join(CONFIG_FILE), json)?;

        info!("experiment directory at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_FILE)
    }

    pub fn write_history(&self, history: &History) -> Result<(), OrchestratorError> {
        history.write(self.history_path())?;
        Ok(())
    }
}
