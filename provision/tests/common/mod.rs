// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use provision::{Cmd, CommandError, Config, Runner};

pub const AGENT_OUTPUT: &str = "SSH_AUTH_SOCK=/tmp/ssh-test/agent.100; export SSH_AUTH_SOCK;\n\
                                SSH_AGENT_PID=101; export SSH_AGENT_PID;\n\
                                echo Agent pid 101;\n";

/// A runner that records every command instead of executing it.
///
/// A command fails if its rendered command line contains the `fail_on` pattern. `ssh-keygen`
/// creates the key file it was asked for, so that later existence checks see it.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<Cmd>>,
    fail_on: Option<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(pattern.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Cmd> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in the order they were run.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    pub fn lines_matching(&self, pattern: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.contains(pattern))
            .collect()
    }
}

impl Runner for FakeRunner {
    fn output(&self, cmd: &Cmd) -> Result<String, CommandError> {
        self.calls.lock().unwrap().push(cmd.clone());

        let line = cmd.to_string();
        if let Some(pattern) = &self.fail_on {
            if line.contains(pattern.as_str()) {
                return Err(CommandError::Exit {
                    command: line,
                    code: 1,
                    stderr: String::new(),
                });
            }
        }

        match cmd.program() {
            "ssh-agent" if cmd.get_args() == ["-s"] => Ok(AGENT_OUTPUT.to_string()),
            "ssh-keygen" => {
                let args = cmd.get_args();
                let pos = args.iter().position(|a| a == "-f").unwrap();
                std::fs::write(&args[pos + 1], "PRIVATE KEY").unwrap();
                Ok(String::new())
            }
            _ => Ok(String::new()),
        }
    }
}

/// A configuration whose local paths all live under `root`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config {
        base_path: root.join("nfs"),
        exports_path: root.join("exports"),
        ..Config::default()
    };
    config.ssh.key_path = root.join("ssh").join("id_rsa");
    config
}
