// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: kernels run through the harness on every target
//! profile and execution mode.
//!
//! These tests check the partition contract end to end: whatever the worker
//! count, every output element is written by exactly one worker and the
//! merged result equals the single-worker result.

use harness::{builtin_cases, run_case, Cluster, ExecMode, Harness, HarnessConfig, Target};
use kernel_core::{
    matmul_int, requant_shift_nhwc, GemmShape, MatMulOffsets, QuantScale, Requant, WorkPartition,
};
use proptest::prelude::*;

// ── Helpers ────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("harness=debug")
        .with_test_writer()
        .try_init();
}

/// Marks every index a worker writes; a second write to the same index or a
/// gap leaves a value other than 1.
fn coverage(
    cluster: &Cluster,
    len: usize,
    kernel: impl Fn(WorkPartition, &mut [u8]) + Sync,
) -> Vec<u32> {
    let mut hits = vec![0u32; len];
    for part in WorkPartition::team(cluster.num_threads()) {
        let mut out = vec![0u8; len];
        kernel(part, &mut out);
        for (h, &o) in hits.iter_mut().zip(&out) {
            *h += u32::from(o != 0);
        }
    }
    hits
}

// ── Tests ──────────────────────────────────────────────────────

#[test]
fn test_all_cases_pass_on_every_profile() {
    init_tracing();
    for target in [Target::Pulp, Target::Snitch, Target::QemuArm] {
        for mode in [ExecMode::Sequential, ExecMode::Threaded] {
            let config = HarnessConfig {
                target: target.name().to_string(),
                mode: mode.name().to_string(),
                seed: 2025,
                ..Default::default()
            };
            let summary = Harness::from_config(&config).unwrap().run().unwrap();
            assert_eq!(summary.reports.len(), builtin_cases().len());
            let failures: Vec<String> = summary.failed().map(|r| r.summary()).collect();
            assert!(failures.is_empty(), "{failures:#?}");
        }
    }
}

#[test]
fn test_more_workers_than_work() {
    // MemPool's 256 workers exceed most output dimensions; idle workers must
    // leave the output untouched.
    let config = HarnessConfig {
        target: "mempool".into(),
        mode: "threaded".into(),
        cases: vec!["matmul_s8".into(), "layernorm_s8".into(), "conv2d_s8_nchw".into()],
        ..Default::default()
    };
    let summary = Harness::from_config(&config).unwrap().run().unwrap();
    assert!(summary.all_passed(), "{}", summary.summary());
}

#[test]
fn test_rq_gemm_passes_for_odd_team_sizes() {
    let case = harness::find_case("rq_gemm_s8").unwrap();
    for n in [1, 2, 3, 4, 7] {
        let cluster = Cluster::new(n, ExecMode::Threaded).unwrap();
        let report = run_case(case.as_ref(), Target::Generic, &cluster, 99, false).unwrap();
        assert!(report.passed(), "{}", report.summary());
        assert_eq!(report.num_threads, n);
    }
}

#[test]
fn test_summary_json_export() {
    let config = HarnessConfig {
        target: "gap9".into(),
        cases: vec!["ita_max".into()],
        ..Default::default()
    };
    let summary = Harness::from_config(&config).unwrap().run().unwrap();
    let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(json["reports"][0]["case"], "ita_max");
    assert_eq!(json["reports"][0]["num_threads"], 8);
    assert_eq!(json["reports"][0]["errors"], 0);
}

#[test]
fn test_config_file_roundtrip() {
    let dir = std::env::temp_dir().join(format!("harness-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("harness.toml");
    let text = "target = \"snitch\"\nmode = \"threaded\"\ncases = [\"gelu_s8\"]\n";
    std::fs::write(&path, text).unwrap();

    let config = HarnessConfig::from_file(&path).unwrap();
    assert_eq!(config.resolve_target().unwrap(), Target::Snitch);
    let summary = Harness::from_config(&config).unwrap().run().unwrap();
    assert!(summary.all_passed());

    assert!(HarnessConfig::from_file(&dir.join("missing.toml")).is_err());
    std::fs::remove_dir_all(&dir).ok();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_requant_partition_complete(len in 1usize..200, channels in 1usize..9, n in 1usize..9) {
        let cluster = Cluster::new(n, ExecMode::Sequential).unwrap();
        let input = vec![0i32; len];
        // Output range [1, 1] so every written element becomes 1.
        let rq = Requant::new(QuantScale::uniform(0, 0), 0).with_range(1, 1).unwrap();
        let hits = coverage(&cluster, len, |part, out| {
            requant_shift_nhwc(&input, out, channels, &rq, part)
        });
        prop_assert!(hits.iter().all(|&h| h == 1));
    }

    #[test]
    fn prop_matmul_threaded_equals_single(
        m in 1usize..10,
        k in 1usize..10,
        p in 1usize..10,
        n in 1usize..8,
        seed in any::<u64>(),
    ) {
        let shape = GemmShape::new(m, k, p);
        let a: Vec<i8> = (0..shape.a_len()).map(|i| seed.rotate_left(i as u32) as i8).collect();
        let b: Vec<i8> =
            (0..shape.b_len()).map(|i| seed.rotate_right(i as u32 + 3) as i8).collect();
        let off = MatMulOffsets { a: -1, b: 2, y: 0 };

        let mut single = vec![0i32; shape.y_len()];
        matmul_int(&a, &b, &mut single, shape, off, WorkPartition::single());

        let mut threaded = vec![0i32; shape.y_len()];
        Cluster::new(n, ExecMode::Threaded)
            .unwrap()
            .run(&mut threaded, |part, y| matmul_int(&a, &b, y, shape, off, part))
            .unwrap();
        prop_assert_eq!(single, threaded);
    }
}
