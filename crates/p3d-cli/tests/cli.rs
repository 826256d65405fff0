// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! End-to-end runs of the `p3d` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn p3d() -> Command {
    Command::cargo_bin("p3d").unwrap()
}

fn write_demo(path: &Path) {
    p3d()
        .args(["demo", "--terrain", "4", "--towers", "2"])
        .arg(path)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 physicals, 16 terrain parts"));
}

#[test]
fn demo_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let world = dir.path().join("demo.p3d");
    write_demo(&world);
    p3d().arg("validate").arg(&world).assert().success().stdout(predicate::str::contains("ok (3 physicals"));
}

#[test]
fn inspect_prints_tables_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let world = dir.path().join("demo.p3d");
    write_demo(&world);

    p3d()
        .arg("inspect")
        .arg(&world)
        .assert()
        .success()
        .stdout(predicate::str::contains("terrain parts").and(predicate::str::contains("directional gravity")));

    let out = p3d().args(["inspect", "--json"]).arg(&world).output().unwrap();
    assert!(out.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["terrain_parts"], 16);
    assert_eq!(summary["physicals"], 3);
    assert_eq!(summary["layers"].as_array().unwrap().len(), 2);
    assert_eq!(summary["shape_classes"]["polyhedron"], 8);
}

#[test]
fn optimize_writes_a_loadable_world() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.p3d");
    let output = dir.path().join("out.p3d");
    write_demo(&input);
    p3d()
        .arg("optimize")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["--passes", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("after 2 passes"));
    p3d().arg("validate").arg(&output).assert().success();
}

#[test]
fn version_mismatch_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let world = dir.path().join("demo.p3d");
    write_demo(&world);
    let mut bytes = fs::read(&world).unwrap();
    bytes[0] = bytes[0].wrapping_add(1);
    fs::write(&world, bytes).unwrap();
    p3d().arg("validate").arg(&world).assert().failure().stderr(predicate::str::contains("version"));
}

#[test]
fn missing_file_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    p3d()
        .arg("inspect")
        .arg(dir.path().join("nope.p3d"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn config_dir_adds_layers() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("world.json"),
        r#"{ "layers": [{ "name": "debris", "collides_internally": false, "collides_with_others": true }] }"#,
    )
    .unwrap();
    let world = dir.path().join("demo.p3d");
    p3d().arg("--config").arg(dir.path()).arg("demo").arg(&world).assert().success();
    let out = p3d().args(["inspect", "--json"]).arg(&world).output().unwrap();
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    // Default, the configured debris layer and the demo's ghost layer.
    assert_eq!(summary["layers"].as_array().unwrap().len(), 3);
}
