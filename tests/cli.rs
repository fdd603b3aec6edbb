// ABOUTME: Integration tests that drive the agentspec binary against files on disk.
// ABOUTME: Exercises the check, convert and split subcommands end to end.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

const TEAM: &str = r#"
component_type: ManagerWorkers
agentspec_version: 26.1.0
id: team
name: team
group_manager:
  component_type: Agent
  id: manager
  name: manager
  system_prompt: Delegate the work
  llm_config: {$component_ref: shared-llm}
workers:
  - component_type: Agent
    id: worker
    name: worker
    system_prompt: Do the work
    llm_config: {$component_ref: shared-llm}
$referenced_components:
  shared-llm:
    component_type: VllmConfig
    id: shared-llm
    name: model
    url: http://localhost:8000
    model_id: llama
"#;

fn agentspec(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_agentspec"))
        .args(args)
        .current_dir(dir)
        .env_remove("AGENTSPEC_NAMING")
        .env_remove("AGENTSPEC_TARGET_VERSION")
        .env_remove("AGENTSPEC_MAX_INPUT_SIZE")
        .env_remove("AGENTSPEC_MAX_DEPTH")
        .env("RUST_LOG", "agentspec=warn")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "agentspec failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("team.yaml"), TEAM).unwrap();
    dir
}

#[test]
fn check_summarizes_the_root() {
    let dir = workspace();
    let out = stdout(&agentspec(dir.path(), &["check", "team.yaml"]));
    assert_eq!(out.trim(), r#"ManagerWorkers team "team": 4 components"#);
}

#[test]
fn convert_switches_format_and_naming() {
    let dir = workspace();
    let out = stdout(&agentspec(
        dir.path(),
        &["convert", "team.yaml", "--to", "json", "--naming", "alternate"],
    ));
    let doc: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(doc["agentspecVersion"], "26.1.0");
    assert_eq!(doc["groupManager"]["systemPrompt"], "Delegate the work");
    assert_eq!(doc["workers"][0]["llmConfig"]["$componentRef"], "shared-llm");
    assert_eq!(doc["$referencedComponents"]["shared-llm"]["modelId"], "llama");
}

#[test]
fn convert_writes_to_the_output_file() {
    let dir = workspace();
    let output = agentspec(
        dir.path(),
        &["convert", "team.yaml", "--to", "json", "-o", "team.json"],
    );
    assert_eq!(stdout(&output), "");

    let again = stdout(&agentspec(dir.path(), &["check", "team.json"]));
    assert!(again.starts_with("ManagerWorkers team"));
}

#[test]
fn convert_to_a_version_without_the_kind_fails_on_load() {
    let dir = workspace();
    let output = agentspec(
        dir.path(),
        &["convert", "team.yaml", "--to", "yaml", "--target-version", "25.4.2", "-o", "old.yaml"],
    );
    stdout(&output);

    let check = agentspec(dir.path(), &["check", "old.yaml"]);
    assert!(!check.status.success());
}

#[test]
fn split_writes_a_sidecar_that_check_can_use() {
    let dir = workspace();
    let out = stdout(&agentspec(
        dir.path(),
        &["split", "team.yaml", "--disaggregate", "shared-llm", "--out-dir", "split"],
    ));
    let written: Vec<&str> = out.lines().collect();
    assert_eq!(written.len(), 2);
    assert!(written[1].ends_with("team.components.yaml"));

    let split = dir.path().join("split");
    let doc = fs::read_to_string(split.join("team.yaml")).unwrap();
    assert!(!doc.contains("referenced_components"));

    let missing = agentspec(&split, &["check", "team.yaml"]);
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("shared-llm"));

    let out = stdout(&agentspec(
        &split,
        &["check", "team.yaml", "--components", "team.components.yaml"],
    ));
    assert!(out.starts_with("ManagerWorkers team"));
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = workspace();
    fs::write(dir.path().join("team.txt"), TEAM).unwrap();
    let output = agentspec(dir.path(), &["check", "team.txt"]);
    assert!(!output.status.success());
}

#[test]
fn environment_limits_apply() {
    let dir = workspace();
    let output = Command::new(env!("CARGO_BIN_EXE_agentspec"))
        .args(["check", "team.yaml"])
        .current_dir(dir.path())
        .env("AGENTSPEC_MAX_INPUT_SIZE", "64")
        .env("RUST_LOG", "agentspec=warn")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("over the limit"));
}
