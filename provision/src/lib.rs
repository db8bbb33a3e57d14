// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Provisioning of a small NFS cluster: one master node exporting a pair of shares, and any number
//! of compute nodes that mount them.
//!
//! Every external tool (package manager, ssh, systemctl, ...) is reached through the [`Runner`]
//! trait, so that the procedures in [`master`] and [`compute`] can be driven against a fake in
//! tests.

pub mod cli;
pub mod command;
pub mod compute;
pub mod config;
pub mod error;
pub mod master;
pub mod script;
pub mod ssh;

pub use command::{Cmd, CommandError, Runner, SystemRunner};
pub use config::{Config, SshConfig};
pub use error::{Error, NodeFailure, StepError, StepErrorKind, Usage};
