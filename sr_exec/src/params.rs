//! # Sample-Return Executable Parameters
//!
//! This module provide parameters for the replay executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use util::logger::{level_from_str, LevelFilter};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecParams {
    /// Minimum level of log messages, one of "trace", "debug", "info", "warn" or "error"
    pub log_level: String,

    /// Log levels for individual modules, keyed by module path, e.g. `"sr_lib::nav"`
    pub module_log_levels: BTreeMap<String, String>,

    /// Directory sessions are created in, relative to the software root
    pub sessions_dir: String,

    /// Number of cycles between status messages
    pub status_log_period: u64,

    /// Ground truth map image, relative to the software root
    pub ground_truth_path: Option<String>,
}

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            log_level: String::from("info"),
            module_log_levels: BTreeMap::new(),
            sessions_dir: String::from("sessions"),
            status_log_period: 10,
            ground_truth_path: None,
        }
    }
}

impl ExecParams {
    /// The per-module log levels in the form the logger expects.
    pub fn module_levels(&self) -> Vec<(String, LevelFilter)> {
        self.module_log_levels
            .iter()
            .map(|(module, level)| (module.clone(), level_from_str(level)))
            .collect()
    }
}
