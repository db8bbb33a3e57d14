// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

mod common;

use provision::master::setup_master;

use common::*;

#[test]
fn writes_two_exports_for_subnet() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let runner = FakeRunner::new();

    setup_master(&config, &runner, "192.168.7.0").unwrap();

    let table = std::fs::read_to_string(&config.exports_path).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 2);

    let base = config.base_path.display();
    assert_eq!(
        lines[0],
        format!("{base}/data\t192.168.7.0/24(rw,sync,no_root_squash,no_subtree_check)")
    );
    assert_eq!(
        lines[1],
        format!("{base}/scripts\t192.168.7.0/24(rw,sync,no_root_squash,no_subtree_check)")
    );

    assert!(config.base_path.join("data").is_dir());
    assert!(config.base_path.join("scripts").is_dir());
}

#[test]
fn command_sequence() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let runner = FakeRunner::new();

    setup_master(&config, &runner, "10.0.0.0").unwrap();

    let base = config.base_path.display();
    assert_eq!(
        runner.lines(),
        vec![
            "apt-get install -y -qq nfs-kernel-server".to_string(),
            format!("chown -R nobody:nogroup {base}"),
            format!("chmod -R 770 {base}"),
            "exportfs -ra".to_string(),
            "systemctl restart nfs-kernel-server".to_string(),
            "systemctl enable nfs-kernel-server".to_string(),
        ]
    );

    let install = &runner.calls()[0];
    assert_eq!(install.get_env("DEBIAN_FRONTEND"), Some("noninteractive"));
}

#[test]
fn rerun_leaves_identical_table() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let runner = FakeRunner::new();

    setup_master(&config, &runner, "10.1.0.0").unwrap();
    let first = std::fs::read_to_string(&config.exports_path).unwrap();

    setup_master(&config, &runner, "10.1.0.0").unwrap();
    let second = std::fs::read_to_string(&config.exports_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.lines().count(), 2);
}

#[test]
fn overwrites_existing_table() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    std::fs::write(&config.exports_path, "/old\t*(ro)\n/older\t*(ro)\n/oldest\t*(ro)\n").unwrap();

    setup_master(&config, &FakeRunner::new(), "10.2.0.0").unwrap();

    let table = std::fs::read_to_string(&config.exports_path).unwrap();
    assert!(!table.contains("/old\t"));
    assert_eq!(table.lines().count(), 2);
}

#[test]
fn failing_step_stops_the_run() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let runner = FakeRunner::failing_on("exportfs");

    let err = setup_master(&config, &runner, "10.0.0.0").unwrap_err();
    assert_eq!(err.step, "re-export the shares");

    // Nothing after the failing step ran:
    assert!(runner.lines_matching("systemctl").is_empty());

    // Earlier steps are not rolled back:
    assert!(config.base_path.join("data").is_dir());
    assert!(config.exports_path.exists());
}

#[test]
fn failed_install_touches_nothing_else() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let runner = FakeRunner::failing_on("apt-get");

    let err = setup_master(&config, &runner, "10.0.0.0").unwrap_err();
    assert_eq!(err.step, "install the NFS server package");
    assert_eq!(runner.lines().len(), 1);
    assert!(!config.base_path.exists());
    assert!(!config.exports_path.exists());
}
