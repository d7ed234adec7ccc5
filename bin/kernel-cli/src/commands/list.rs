// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `kernels list` and `kernels targets`.

use harness::{builtin_cases, Target};

pub fn cases() -> anyhow::Result<()> {
    println!("  {:<22} {:<6} Description", "Case", "Output");
    println!("  {}", "-".repeat(72));
    for case in builtin_cases() {
        let dtype = case.output_dtype();
        println!("  {:<22} {:<6} {}", case.name(), dtype.as_str(), case.description());
    }
    Ok(())
}

pub fn targets() -> anyhow::Result<()> {
    println!("  {:<10} {:>6}", "Target", "Cores");
    println!("  {}", "-".repeat(17));
    for target in Target::ALL {
        println!("  {:<10} {:>6}", target.name(), target.default_cores());
    }
    Ok(())
}
