// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Target profiles.
//!
//! A profile is the thin per-platform adapter that decides how many workers
//! a kernel call is split across. How each platform obtains its core index
//! is outside the kernels; the harness only needs the worker count.

use crate::HarnessError;
use std::fmt;
use std::str::FromStr;

/// Platforms the harness can emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// The host machine, one worker per available CPU.
    Generic,
    /// PULP cluster (8 cores).
    Pulp,
    /// Snitch cluster (8 compute cores).
    Snitch,
    /// MemPool (256 cores).
    Mempool,
    /// GAP9 cluster (8 cores).
    Gap9,
    /// Single-core Arm emulation.
    QemuArm,
}

impl Target {
    pub const ALL: [Target; 6] = [
        Target::Generic,
        Target::Pulp,
        Target::Snitch,
        Target::Mempool,
        Target::Gap9,
        Target::QemuArm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Generic => "generic",
            Target::Pulp => "pulp",
            Target::Snitch => "snitch",
            Target::Mempool => "mempool",
            Target::Gap9 => "gap9",
            Target::QemuArm => "qemu-arm",
        }
    }

    /// Number of workers a kernel call is split across on this target.
    pub fn default_cores(self) -> usize {
        match self {
            Target::Generic => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            Target::Pulp | Target::Snitch | Target::Gap9 => 8,
            Target::Mempool => 256,
            Target::QemuArm => 1,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Target::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| HarnessError::UnknownTarget(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for t in Target::ALL {
            assert_eq!(t.name().parse::<Target>().unwrap(), t);
        }
        assert_eq!("PULP".parse::<Target>().unwrap(), Target::Pulp);
        assert!(matches!("riscv".parse::<Target>(), Err(HarnessError::UnknownTarget(_))));
    }

    #[test]
    fn test_core_counts() {
        assert_eq!(Target::Mempool.default_cores(), 256);
        assert_eq!(Target::QemuArm.default_cores(), 1);
        assert!(Target::Generic.default_cores() >= 1);
    }
}
