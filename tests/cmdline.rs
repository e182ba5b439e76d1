/// Run the pcr-profile command with various parameters
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;
use common::*;

fn cmd() -> Command {
    Command::cargo_bin("pcr-profile").unwrap()
}

const RUN: &str = "console=ttyS0 console=tty1 panic=-1 systemd.gpt_auto=0 snapd_recovery_mode=run";
const RECOVER: &str =
    "console=ttyS0 console=tty1 panic=-1 systemd.gpt_auto=0 snapd_recovery_mode=recover";

#[test]
fn no_param() {
    // Without argument, shows the usage and aborts
    let result = cmd().assert();
    result.failure().stderr(predicate::str::contains("Usage:"));

    let result = cmd().arg("--help").assert();
    result.success().stdout(predicate::str::contains("Usage:"));
}

#[test]
fn kernel_cmdlines() {
    cmd()
        .args(["--kernel-cmdline", RUN, "--kernel-cmdline", RECOVER])
        .assert()
        .success()
        .stdout(
            "Value 0:\n \
             PCR12,sha256: fc433eaf039c6261f496a2a5bf2addfd8ff1104b0fc98af3fe951517e3bde824\n\
             Value 1:\n \
             PCR12,sha256: b3a29076eeeae197ae721c254da40480b76673038045305cfa78ec87421c4eea\n",
        );

    cmd()
        .args(["--pcr-algorithm", "sha1", "--kernel-cmdline", RUN])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "PCR12,sha1: eb6312b7db70fe16206c162326e36b2fcda74b68",
        ));

    cmd()
        .args(["--pcr-algorithm", "md5", "--kernel-cmdline", RUN])
        .assert()
        .append_context("test", "unknown algorithm")
        .failure()
        .stderr(predicate::str::contains("unknown hash algorithm `md5`"));

    cmd()
        .args(["--kernel-cmdline-pcr", "24", "--kernel-cmdline", RUN])
        .assert()
        .append_context("test", "invalid PCR")
        .failure()
        .stderr(predicate::str::contains("invalid PCR index 24"));
}

#[test]
fn initial_values() {
    let classic = "root=/dev/mapper/vgubuntu-root ro quiet splash vt.handoff=7";
    cmd()
        .args(["--pcr-value", &format!("sha256:7={FOO}")])
        .args(["--pcr-value", &format!("sha256:8={BAR}")])
        .args(["--kernel-cmdline-pcr", "8", "--kernel-cmdline", classic])
        .assert()
        .success()
        .stdout(format!(
            "Value 0:\n \
             PCR7,sha256: {FOO}\n \
             PCR8,sha256: 3d39c0db757b47b484006003724d990403d533044ed06e8798ab374bd73f32dc\n"
        ));

    cmd()
        .args(["--pcr-value", "sha256:7=0011", "--kernel-cmdline", RUN])
        .assert()
        .append_context("test", "short digest")
        .failure()
        .stderr(predicate::str::contains("invalid sha256 digest length 2"));

    cmd()
        .args(["--pcr-value", "sha256-7-0011"])
        .assert()
        .append_context("test", "malformed value")
        .failure()
        .stderr(predicate::str::contains("expected alg:pcr=hex"));
}

#[test]
fn config_file() {
    let config = format!(
        r#"
        [[pcr-values]]
        algorithm = "sha256"
        pcr = 7
        value = "{FOO}"

        [[pcr-values]]
        algorithm = "sha256"
        pcr = 12
        value = "{BAR}"

        [snap-model]
        pcr-algorithm = "sha256"
        pcr-index = 12

        [[snap-model.models]]
        authority-id = "fake-brand"
        series = "16"
        brand-id = "fake-brand"
        model = "fake-model"
        grade = "secured"
        sign-key-sha3-384 = "{SIGN_KEY}"

        [[snap-model.models]]
        authority-id = "fake-brand"
        series = "16"
        brand-id = "fake-brand"
        model = "other-model"
        grade = "secured"
        sign-key-sha3-384 = "{SIGN_KEY}"
        "#
    );
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("profile.toml");
    file.write_str(&config).unwrap();
    let filename = file.path().to_str().unwrap();

    cmd()
        .args(["-c", filename])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Value 1:\n \
             PCR7,sha256: 424816d020cf3d793ac021da47379bdf608080a83eb9364a7fbe0bdfa87111d7\n \
             PCR12,sha256: cb7a1cf1afbc73e0e4348f771cf7475e7ec278549af042e2617e717ca38d3416\n",
        ));

    cmd()
        .args(["-c", filename, "--pcr-digests", "sha256"])
        .assert()
        .success()
        .stdout(
            "Selection: sha256:7,12\n\
             Digest 0: 5e1964b3e503240d76ba2796a4adac77a70da9a05fdaa57f434c23c1822742e8\n\
             Digest 1: d83234557eeb1cc5ce445a3b417751e4b1c95999e5c7b59838f75f4970b222fd\n",
        );

    let output = cmd().args(["-c", filename, "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(
        json[0]["sha256"]["12"],
        "3089d679b1cda31c76fe57e6cf0c3eb35c221acde76a678c3c4771ee9b99a8c9"
    );
    assert_eq!(json[1]["sha256"]["7"], FOO);

    // Profiles multiply
    cmd()
        .args(["-c", filename, "--kernel-cmdline", RUN, "--kernel-cmdline", RECOVER])
        .assert()
        .success()
        .stdout(predicate::str::contains("Value 3:"))
        .stdout(predicate::str::contains("Value 4:").not());
}

#[test]
fn invalid_config() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("bad.toml");
    file.write_str("[snap-model]\npcr-index = 12\n").unwrap();

    cmd()
        .args(["-c", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));

    let file = dir.child("empty-models.toml");
    file.write_str("[snap-model]\npcr-algorithm = \"sha256\"\npcr-index = 12\nmodels = []\n")
        .unwrap();
    cmd()
        .args(["-c", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no alternative was given for snap model"));

    cmd()
        .args(["-c", "does-not-exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}
