// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fs;

use log::*;

use crate::command::{Cmd, Runner};
use crate::config::SshConfig;
use crate::error::{StepContext, StepError, StepErrorKind};

/// Generates a passphrase-less RSA key pair at the configured path, unless a private key is
/// already there. Within a run only the first call generates anything.
pub fn ensure_key_pair<R: Runner>(ssh: &SshConfig, runner: &R) -> Result<(), StepError> {
    if ssh.key_path.exists() {
        debug!("using existing key {}", ssh.key_path.display());
        return Ok(());
    }

    info!("Generating SSH key pair at {}", ssh.key_path.display());
    if let Some(dir) = ssh.key_path.parent() {
        fs::create_dir_all(dir).step("generate an SSH key pair")?;
    }

    runner
        .run(
            &Cmd::new("ssh-keygen")
                .args(["-t", "rsa", "-b", "4096", "-N", "", "-q", "-f"])
                .arg(ssh.key_path.to_string_lossy()),
        )
        .step("generate an SSH key pair")
}

/// Installs the public key in the remote user's `authorized_keys`.
///
/// This only succeeds if the node already accepts some other form of non-interactive login.
pub fn copy_id<R: Runner>(ssh: &SshConfig, runner: &R, node: &str) -> Result<(), StepError> {
    info!("Installing public key on {node}");
    runner
        .run(
            &Cmd::new("ssh-copy-id")
                .arg("-i")
                .arg(ssh.public_key_path().to_string_lossy())
                .args(["-o", "StrictHostKeyChecking=no"])
                .args(["-o", "PasswordAuthentication=no"])
                .arg(ssh.destination(node)),
        )
        .step(&format!("copy the SSH key to {node}"))
}

/// Key generation (if needed) followed by key installation on `node`.
pub fn bootstrap<R: Runner>(ssh: &SshConfig, runner: &R, node: &str) -> Result<(), StepError> {
    ensure_key_pair(ssh, runner)?;
    copy_id(ssh, runner, node)
}

/// A running `ssh-agent`, identified by the environment it printed on startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub auth_sock: String,
    pub pid: String,
}

impl Agent {
    pub fn start<R: Runner>(runner: &R) -> Result<Self, StepError> {
        let output = runner
            .output(&Cmd::new("ssh-agent").arg("-s"))
            .step("start ssh-agent")?;

        match Self::parse(&output) {
            Some(agent) => {
                debug!("ssh-agent running with pid {}", agent.pid);
                Ok(agent)
            }
            None => {
                // The agent may still be running; stop it if its pid can be found.
                match Self::announced_pid(&output) {
                    Some(pid) => {
                        let cmd = Cmd::new("ssh-agent")
                            .arg("-k")
                            .env("SSH_AGENT_PID", pid.as_str());
                        if let Err(e) = runner.run(&cmd) {
                            warn!("Could not stop ssh-agent {pid}: {e}");
                        }
                    }
                    None => warn!("ssh-agent may have been left running: {output:?}"),
                }
                Err(StepError::new(
                    "start ssh-agent",
                    StepErrorKind::AgentOutput(output),
                ))
            }
        }
    }

    /// The pid from the `echo Agent pid N;` line of `ssh-agent -s`.
    fn announced_pid(output: &str) -> Option<String> {
        output
            .split([';', '\n'])
            .filter_map(|statement| statement.trim().strip_prefix("echo Agent pid "))
            .map(str::trim)
            .find(|pid| !pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit()))
            .map(str::to_string)
    }

    /// Reads `SSH_AUTH_SOCK` and `SSH_AGENT_PID` out of the Bourne shell commands printed by
    /// `ssh-agent -s`.
    pub fn parse(output: &str) -> Option<Self> {
        let mut auth_sock = None;
        let mut pid = None;

        for statement in output.split([';', '\n']) {
            let statement = statement.trim();
            if let Some(value) = statement.strip_prefix("SSH_AUTH_SOCK=") {
                auth_sock = Some(value.to_string());
            } else if let Some(value) = statement.strip_prefix("SSH_AGENT_PID=") {
                pid = Some(value.to_string());
            }
        }

        match (auth_sock, pid) {
            (Some(auth_sock), Some(pid)) if !auth_sock.is_empty() && !pid.is_empty() => {
                Some(Self { auth_sock, pid })
            }
            _ => None,
        }
    }

    /// Points `cmd` at this agent.
    pub fn apply(&self, cmd: Cmd) -> Cmd {
        cmd.env("SSH_AUTH_SOCK", self.auth_sock.as_str())
            .env("SSH_AGENT_PID", self.pid.as_str())
    }

    pub fn add_key<R: Runner>(&self, ssh: &SshConfig, runner: &R) -> Result<(), StepError> {
        runner
            .run(&self.apply(Cmd::new("ssh-add").arg(ssh.key_path.to_string_lossy())))
            .step("add the SSH key to ssh-agent")
    }

    /// Kills the agent. Failing to do so doesn't affect the outcome of the run.
    pub fn stop<R: Runner>(self, runner: &R) {
        if let Err(e) = runner.run(&self.apply(Cmd::new("ssh-agent").arg("-k"))) {
            warn!("Could not stop ssh-agent {}: {e}", self.pid);
        }
    }
}
