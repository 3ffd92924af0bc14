use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const NODES: &str = "\
uuid,id,v_target,slack,subnet,volt_lvl,v_rated
00000000-0000-0000-0000-000000000001,n1,1.0,true,1,mv,20
00000000-0000-0000-0000-000000000002,n2,1.0,false,1,mv,20
00000000-0000-0000-0000-000000000003,n3,1.0,false,1,mv,20
";

const LINES: &str = "\
uuid,id,node_a,node_b,r,x,b,g,i_max,v_rated,length
00000000-0000-0000-0000-0000000000a1,l1,00000000-0000-0000-0000-000000000001,00000000-0000-0000-0000-000000000002,0.1,0.2,3,0,300,20,1.5
";

const DANGLING_LINE: &str = "\
00000000-0000-0000-0000-0000000000a2,l2,00000000-0000-0000-0000-000000000002,00000000-0000-0000-0000-0000000000ff,0.1,0.2,3,0,300,20,1.5
";

fn grid_dir(lines: &str) -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "node_input.csv", NODES);
    write(dir.path(), "line_input.csv", lines);
    dir
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn psdm() -> Command {
    Command::cargo_bin("psdm").unwrap()
}

#[test]
fn assemble_prints_kind_table() {
    let dir = grid_dir(LINES);
    psdm()
        .arg("assemble")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Kind"))
        .stdout(predicate::str::contains("node"))
        .stdout(predicate::str::contains("complete"))
        .stdout(predicate::str::contains("isolated node (n3)"));
}

#[test]
fn assemble_json_report_is_parseable() {
    let dir = grid_dir(LINES);
    let output = psdm()
        .args(["assemble", "--format", "json", "--kind", "node", "--kind", "line"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let kinds = report["kinds"].as_array().unwrap();
    assert_eq!(kinds.len(), 7);
    assert_eq!(kinds[0]["kind"], "node");
    assert_eq!(kinds[0]["built"], 3);
    assert_eq!(kinds[1]["status"], "complete");
    assert_eq!(kinds[2]["status"], "skipped");
}

#[test]
fn dangling_reference_fails_the_run() {
    let dir = grid_dir(&format!("{LINES}{DANGLING_LINE}"));
    psdm()
        .arg("assemble")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed"))
        .stderr(predicate::str::contains("assembly failed for line"));
}

#[test]
fn uuid_shared_across_kinds_fails_the_run() {
    let shared = LINES.replace(
        "00000000-0000-0000-0000-0000000000a1",
        "00000000-0000-0000-0000-000000000003",
    );
    psdm()
        .arg("assemble")
        .arg(grid_dir(&shared).path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("duplicate id"))
        .stderr(predicate::str::contains("assembly failed for line"));
}

#[test]
fn partial_policy_keeps_valid_lines() {
    let dir = grid_dir(&format!("{LINES}{DANGLING_LINE}"));
    let output = psdm()
        .args(["assemble", "--format", "json", "--policy", "partial"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["kinds"][1]["status"], "partial");
    assert_eq!(report["kinds"][1]["built"], 1);
    assert_eq!(report["kinds"][1]["failed"], 1);
}

#[test]
fn config_file_sets_policy() {
    let dir = grid_dir(&format!("{LINES}{DANGLING_LINE}"));
    let config_dir = tempdir().unwrap();
    let config = config_dir.path().join("config.toml");
    fs::write(&config, "[assembly]\npolicy = \"partial\"\n").unwrap();
    psdm()
        .arg("--config")
        .arg(&config)
        .args(["assemble", "--format", "json"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"partial\""));
}

#[test]
fn missing_input_directory_is_an_error() {
    let dir = tempdir().unwrap();
    psdm()
        .arg("assemble")
        .arg(dir.path().join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading input directory"));
}

#[test]
fn fields_lists_transformer_variants() {
    psdm()
        .args(["fields", "transformer_2w"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transformer2WInput"))
        .stdout(predicate::str::contains("tapPos"));
}

#[test]
fn fields_rejects_unknown_kind() {
    psdm()
        .args(["fields", "load"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown entity kind"));
}

#[test]
fn graph_stats_and_islands() {
    let dir = grid_dir(LINES);
    psdm()
        .args(["graph", "stats"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes         : 3"))
        .stdout(predicate::str::contains("Components    : 2"));

    psdm()
        .args(["graph", "islands", "--emit"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Island 0: 2 node(s), slack"))
        .stdout(predicate::str::contains("-> island 1"));
}

#[test]
fn graph_export_writes_dot_file() {
    let dir = grid_dir(LINES);
    let out = dir.path().join("grid.dot");
    psdm()
        .args(["graph", "export"])
        .arg(dir.path())
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Graph exported to"));
    let dot = fs::read_to_string(&out).unwrap();
    assert!(dot.starts_with("graph psdm_grid {"));
    assert!(dot.contains("[label=\"line\"]"));
}
