// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Harness configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! target = "pulp"
//! num_threads = 4          # overrides the target's core count
//! mode = "threaded"        # or "sequential"
//! seed = 42
//! cases = ["matmul_s8", "ita_max"]   # empty runs every case
//! enable_timing = true
//! ```

use crate::{Cluster, ExecMode, HarnessError, Target};
use std::path::Path;

/// Configuration for a harness run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HarnessConfig {
    /// Target profile name: `"generic"`, `"pulp"`, `"snitch"`, `"mempool"`, `"gap9"`, `"qemu-arm"`.
    pub target: String,
    /// Worker count (defaults to the target's core count).
    pub num_threads: Option<usize>,
    /// Execution mode: `"sequential"` or `"threaded"`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Seed for the random test inputs.
    #[serde(default)]
    pub seed: u64,
    /// Case names to run; empty means all registered cases.
    #[serde(default)]
    pub cases: Vec<String>,
    /// Whether to record per-case wall-clock time.
    #[serde(default = "default_true")]
    pub enable_timing: bool,
}

fn default_mode() -> String {
    "sequential".to_string()
}

fn default_true() -> bool {
    true
}

impl HarnessConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str)
            .map_err(|e| HarnessError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, HarnessError> {
        toml::to_string_pretty(self)
            .map_err(|e| HarnessError::ConfigError(format!("TOML serialise error: {e}")))
    }

    pub fn resolve_target(&self) -> Result<Target, HarnessError> {
        self.target.parse()
    }

    pub fn resolve_mode(&self) -> Result<ExecMode, HarnessError> {
        self.mode.parse()
    }

    /// Resolves the worker count: the explicit override, else the target's cores.
    pub fn resolve_threads(&self) -> Result<usize, HarnessError> {
        match self.num_threads {
            Some(0) => Err(HarnessError::ConfigError(
                "num_threads must be at least 1".to_string(),
            )),
            Some(n) => Ok(n),
            None => Ok(self.resolve_target()?.default_cores()),
        }
    }

    /// Builds the cluster this configuration describes.
    pub fn cluster(&self) -> Result<Cluster, HarnessError> {
        Cluster::new(self.resolve_threads()?, self.resolve_mode()?)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target: "generic".to_string(),
            num_threads: None,
            mode: default_mode(),
            seed: 0,
            cases: Vec::new(),
            enable_timing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = HarnessConfig::default();
        assert_eq!(c.target, "generic");
        assert_eq!(c.resolve_mode().unwrap(), ExecMode::Sequential);
        assert!(c.cases.is_empty());
        assert!(c.enable_timing);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
target = "pulp"
num_threads = 3
mode = "threaded"
seed = 7
cases = ["matmul_s8"]
enable_timing = false
"#;
        let c = HarnessConfig::from_toml(toml).unwrap();
        assert_eq!(c.resolve_target().unwrap(), Target::Pulp);
        assert_eq!(c.resolve_threads().unwrap(), 3);
        assert_eq!(c.resolve_mode().unwrap(), ExecMode::Threaded);
        assert_eq!(c.seed, 7);
        assert_eq!(c.cases, vec!["matmul_s8".to_string()]);
        assert!(!c.enable_timing);
    }

    #[test]
    fn test_minimal_toml_uses_target_cores() {
        let c = HarnessConfig::from_toml("target = \"mempool\"").unwrap();
        assert_eq!(c.resolve_threads().unwrap(), 256);
        assert_eq!(c.cluster().unwrap().num_threads(), 256);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = HarnessConfig {
            target: "snitch".into(),
            num_threads: Some(2),
            cases: vec!["ita_max".into()],
            ..Default::default()
        };
        let back = HarnessConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_invalid_values() {
        let bad_target = HarnessConfig { target: "x86".into(), ..Default::default() };
        assert!(matches!(bad_target.resolve_threads(), Err(HarnessError::UnknownTarget(_))));

        let bad_mode = HarnessConfig { mode: "parallel".into(), ..Default::default() };
        assert!(matches!(bad_mode.cluster(), Err(HarnessError::UnknownMode(_))));

        let zero = HarnessConfig { num_threads: Some(0), ..Default::default() };
        assert!(matches!(zero.resolve_threads(), Err(HarnessError::ConfigError(_))));

        assert!(HarnessConfig::from_toml("target = ").is_err());
    }
}
