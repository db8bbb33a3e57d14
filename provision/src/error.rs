// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use crate::command::CommandError;

/// The top-level error of a provisioning run. Every variant makes the process exit with status 1.
#[derive(Debug)]
pub enum Error {
    /// The command line was incomplete or not understood. Nothing has been executed.
    Usage(Usage),

    /// A step failed; the run stopped there.
    Step(StepError),

    /// Some nodes failed in a parallel compute run. The remaining nodes ran to completion.
    Nodes(Vec<NodeFailure>),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Usage(u) => write!(f, "{u}"),
            Self::Step(e) => write!(f, "{e}"),
            Self::Nodes(failures) => {
                write!(f, "{} node(s) failed:", failures.len())?;
                for failure in failures.iter() {
                    write!(f, " {};", failure.node)?;
                }
                Ok(())
            }
        }
    }
}

impl From<Usage> for Error {
    fn from(u: Usage) -> Self {
        Self::Usage(u)
    }
}

impl From<StepError> for Error {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}

const GENERAL_USAGE: &str = "Usage: nfs_provision {master <SUBNET> | compute <NODE_IP> [<NODE_IP> ...]}\n  \
master   install and configure the NFS server on this host\n  \
compute  set up passwordless SSH and the NFS client on each node";

const MASTER_USAGE: &str = "Usage: nfs_provision master <SUBNET>\n  \
SUBNET   network address of the compute nodes, e.g. 192.168.1.0";

const COMPUTE_USAGE: &str = "Usage: nfs_provision compute [--parallel <N>] <NODE_IP> [<NODE_IP> ...]";

/// Ways in which the command line can be wrong. Each one has its own usage text.
#[derive(Debug, Clone, PartialEq)]
pub enum Usage {
    /// No mode, or an unknown one.
    General,

    /// `master` without exactly one subnet.
    Master,

    /// `compute` without any node.
    Compute,

    /// An option value that was rejected, with the parser's explanation.
    Invalid(String),
}

impl std::error::Error for Usage {}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::General => write!(f, "{GENERAL_USAGE}"),
            Self::Master => write!(f, "{MASTER_USAGE}"),
            Self::Compute => write!(f, "{COMPUTE_USAGE}"),
            Self::Invalid(msg) => write!(f, "{msg}\n{GENERAL_USAGE}"),
        }
    }
}

/// A labelled step that did not complete.
#[derive(Debug)]
pub struct StepError {
    pub step: String,
    pub kind: StepErrorKind,
}

#[derive(Debug)]
pub enum StepErrorKind {
    Command(CommandError),
    Io(std::io::Error),
    /// `ssh-agent` ran but its output did not contain the socket and pid.
    AgentOutput(String),
}

impl StepError {
    pub fn new(step: impl Into<String>, kind: StepErrorKind) -> Self {
        Self {
            step: step.into(),
            kind,
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            StepErrorKind::Command(e) => Some(e),
            StepErrorKind::Io(e) => Some(e),
            StepErrorKind::AgentOutput(_) => None,
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            StepErrorKind::Command(e) => write!(f, "Failed to {}: {e}", self.step),
            StepErrorKind::Io(e) => write!(f, "Failed to {}: IO error: {e}", self.step),
            StepErrorKind::AgentOutput(out) => {
                write!(f, "Failed to {}: unexpected ssh-agent output: {out:?}", self.step)
            }
        }
    }
}

impl From<CommandError> for StepErrorKind {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<std::io::Error> for StepErrorKind {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Attaches a step label to the error of a fallible operation.
pub trait StepContext<T> {
    fn step(self, label: &str) -> Result<T, StepError>;
}

impl<T, E: Into<StepErrorKind>> StepContext<T> for Result<T, E> {
    fn step(self, label: &str) -> Result<T, StepError> {
        self.map_err(|e| StepError::new(label, e.into()))
    }
}

/// A compute node that failed during a parallel run.
#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub error: StepError,
}
