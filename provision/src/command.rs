// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};

use log::*;

/// A description of an external command: program, arguments and extra environment variables.
///
/// Keeping this separate from `std::process::Command` lets a [`Runner`] other than the system one
/// inspect exactly what would have been executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// The value of an environment variable set on this command, if any.
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Cmd {
    /// Program and arguments joined by spaces. Environment variables are not shown.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes external commands on behalf of the provisioning procedures.
///
/// Implementations must be `Sync` so that the parallel compute mode can share a single runner
/// across its worker threads.
pub trait Runner: Sync {
    /// Runs the command to completion and returns its standard output. Any exit status other
    /// than success is an error.
    fn output(&self, cmd: &Cmd) -> Result<String, CommandError>;

    /// Runs the command to completion, discarding its output.
    fn run(&self, cmd: &Cmd) -> Result<(), CommandError> {
        self.output(cmd).map(|_| ())
    }
}

/// Spawns real processes on the local host and blocks until each one exits.
///
/// Standard input is closed and both output streams are captured, which keeps package managers
/// and remote scripts from printing over the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn output(&self, cmd: &Cmd) -> Result<String, CommandError> {
        let cmd_str = cmd.to_string();
        debug!("executing command: {cmd_str}");

        let result = Command::new(cmd.program())
            .args(cmd.get_args())
            .envs(cmd.get_envs().iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: cmd_str.clone(),
                source,
            })?;

        if !result.stderr.is_empty() {
            trace!(
                "stderr of {cmd_str}: {}",
                String::from_utf8_lossy(&result.stderr)
            );
        }

        if !result.status.success() {
            return Err(match (result.status.code(), result.status.signal()) {
                (Some(code), _) => CommandError::Exit {
                    command: cmd_str,
                    code,
                    stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
                },
                (None, Some(signal)) => CommandError::Signal {
                    command: cmd_str,
                    signal,
                },
                // A process that neither exited nor was signalled can't be observed through
                // `output()`, but report it as an exit failure rather than panicking:
                (None, None) => CommandError::Exit {
                    command: cmd_str,
                    code: -1,
                    stderr: String::new(),
                },
            });
        }

        String::from_utf8(result.stdout).map_err(|_| CommandError::Utf8 { command: cmd_str })
    }
}

/// An external command could not be run, or did not succeed. Each variant carries the rendered
/// command line.
#[derive(Debug)]
pub enum CommandError {
    Spawn {
        command: String,
        source: std::io::Error,
    },
    Exit {
        command: String,
        code: i32,
        stderr: String,
    },
    Signal {
        command: String,
        signal: i32,
    },
    /// The command succeeded but its standard output was not valid UTF-8.
    Utf8 {
        command: String,
    },
}

impl CommandError {
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. }
            | Self::Exit { command, .. }
            | Self::Signal { command, .. }
            | Self::Utf8 { command } => command,
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Spawn { command, source } => {
                write!(f, "Failed to execute: {source}, cmd: {command}")
            }
            Self::Exit {
                command,
                code,
                stderr,
            } => {
                write!(f, "Exited with code: {code}, cmd: {command}")?;
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Signal { command, signal } => {
                write!(f, "Process terminated by signal: {signal}, cmd: {command}")
            }
            Self::Utf8 { command } => write!(f, "Output was not valid UTF-8, cmd: {command}"),
        }
    }
}
