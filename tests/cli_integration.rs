use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_tsnconf").to_string()
}

const SID_FILE: &str = r#"{
  "ietf-sid-file:sid-file": {
    "module-name": "ietf-interfaces",
    "item": [
      {"namespace": "data", "identifier": "/ietf-interfaces:interfaces", "sid": "2000"},
      {"namespace": "data", "identifier": "/ietf-interfaces:interfaces/interface", "sid": "2033"},
      {"namespace": "data", "identifier": "/ietf-interfaces:interfaces/interface/name", "sid": "2034"},
      {"namespace": "data", "identifier": "/ietf-interfaces:interfaces/interface/enabled", "sid": "2035"}
    ]
  }
}"#;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn stdout(cmd: &mut Command) -> String {
    let out = cmd.output().unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).unwrap()
}

#[test]
fn cli_encode_query_file() {
    let dir = tempdir().unwrap();
    let sid = write(dir.path(), "if.sid", SID_FILE);
    let query = write(
        dir.path(),
        "q.yaml",
        "- /ietf-interfaces:interfaces\n- \"/ietf-interfaces:interfaces/interface[name='1']\"\n",
    );
    let out = stdout(Command::new(bin()).arg("encode").arg("--sid").arg(&sid).arg(&query));
    assert_eq!(out.trim(), "1907d0821907f16131");
}

#[test]
fn cli_encode_then_decode_patch() {
    let dir = tempdir().unwrap();
    let sid = write(dir.path(), "if.sid", SID_FILE);
    let patch = write(
        dir.path(),
        "p.yaml",
        "- \"/ietf-interfaces:interfaces/interface[name='eth0']/enabled\": false\n",
    );
    let hex = stdout(Command::new(bin()).arg("encode").arg("-s").arg(&sid).arg(&patch));
    let hex = hex.trim();
    assert!(!hex.is_empty());

    let out = stdout(Command::new(bin()).arg("decode").arg("-s").arg(&sid).arg(hex));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"/ietf-interfaces:interfaces/interface[name='eth0']/enabled": false})
    );
}

#[test]
fn cli_decode_flatten_datastore() {
    let dir = tempdir().unwrap();
    let sid = write(dir.path(), "if.sid", SID_FILE);
    // {2000: {33: [{1: "a", 2: true}]}}
    let out = stdout(
        Command::new(bin())
            .args(["decode", "--as", "datastore", "--flatten", "-s"])
            .arg(&sid)
            .arg("a11907d0a11821 81a20161610 2f5".replace(' ', "")),
    );
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "/interfaces/interface[0]/name": "a",
            "/interfaces/interface[0]/enabled": true
        })
    );
}

#[test]
fn cli_lookup_by_path_and_sid() {
    let dir = tempdir().unwrap();
    let sid = write(dir.path(), "if.sid", SID_FILE);
    let out = stdout(
        Command::new(bin())
            .args(["lookup", "-s"])
            .arg(&sid)
            .arg("/ietf-interfaces:interfaces/interface/enabled"),
    );
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["sid"], 2035);
    assert_eq!(value["parent"], 2033);
    assert_eq!(value["delta"], 2);

    let out = stdout(Command::new(bin()).args(["lookup", "-s"]).arg(&sid).arg("2033"));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["name"], "interface");
    assert_eq!(value["children"], serde_json::json!([2034, 2035]));
}

#[test]
fn cli_reports_errors_with_status() {
    let dir = tempdir().unwrap();
    let sid = write(dir.path(), "if.sid", SID_FILE);
    let st = Command::new(bin())
        .args(["lookup", "-s"])
        .arg(&sid)
        .arg("/ietf-interfaces:nothing")
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(3));

    let st = Command::new(bin())
        .args(["decode", "-s"])
        .arg(&sid)
        .arg("zz")
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(2));

    let st = Command::new(bin())
        .args(["schema", "-s"])
        .arg(dir.path().join("missing.sid"))
        .status()
        .unwrap();
    assert_eq!(st.code(), Some(1));
}

#[test]
fn cli_schema_summary() {
    let dir = tempdir().unwrap();
    let sid = write(dir.path(), "if.sid", SID_FILE);
    let out = stdout(Command::new(bin()).args(["schema", "-s"]).arg(&sid));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["files"], 1);
    assert_eq!(value["sids"], 4);
}
