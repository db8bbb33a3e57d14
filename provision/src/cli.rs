// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use log::*;

use crate::command::Runner;
use crate::compute;
use crate::config::Config;
use crate::error::{Error, Usage};
use crate::master;

/// Provision an NFS master and its compute nodes.
#[derive(Debug, Parser)]
#[command(name = "nfs_provision", version)]
pub struct Cli {
    /// Directory holding the shares on the master, and the mount points on compute nodes.
    #[arg(long, global = true, value_name = "PATH")]
    base_path: Option<PathBuf>,

    /// Address compute nodes mount the shares from.
    #[arg(long, global = true, value_name = "ADDR")]
    master_address: Option<String>,

    /// Prefix length appended to the subnet in the export table.
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=32))]
    subnet_prefix: Option<u8>,

    /// Remote account to install the key for and run the client setup as.
    #[arg(long, global = true, value_name = "USER")]
    ssh_user: Option<String>,

    /// Private key to use, generated if it doesn't exist.
    #[arg(long, global = true, value_name = "FILE")]
    ssh_key: Option<PathBuf>,

    #[clap(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Install and configure the NFS server on this host.
    Master {
        /// Network address of the compute nodes, e.g. 192.168.1.0.
        subnet: Vec<String>,
    },

    /// Set up passwordless SSH and the NFS client on each node.
    Compute {
        /// Configure up to N nodes at once, and keep going when one of them fails.
        #[arg(long, value_name = "N")]
        parallel: Option<NonZeroUsize>,

        nodes: Vec<String>,
    },
}

/// What the command line asked for, once it has been checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Master {
        subnet: String,
    },
    Compute {
        nodes: Vec<String>,
        parallel: Option<NonZeroUsize>,
    },
}

impl Cli {
    /// The defaults, with any global options applied on top.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(path) = &self.base_path {
            config.base_path = path.clone();
        }
        if let Some(addr) = &self.master_address {
            config.master_address = addr.clone();
        }
        if let Some(prefix) = self.subnet_prefix {
            config.subnet_prefix = prefix;
        }
        if let Some(user) = &self.ssh_user {
            config.ssh.user = user.clone();
        }
        if let Some(key) = &self.ssh_key {
            config.ssh.key_path = key.clone();
        }
        config
    }

    pub fn invocation(self) -> Result<Invocation, Usage> {
        match self.mode {
            None => Err(Usage::General),
            Some(Mode::Master { mut subnet }) => {
                // An empty argument counts as a missing one:
                if subnet.len() != 1 || subnet[0].trim().is_empty() {
                    return Err(Usage::Master);
                }
                Ok(Invocation::Master {
                    subnet: subnet.remove(0),
                })
            }
            Some(Mode::Compute { nodes, parallel }) => {
                if nodes.is_empty() || nodes.iter().any(|n| n.trim().is_empty()) {
                    return Err(Usage::Compute);
                }
                Ok(Invocation::Compute { nodes, parallel })
            }
        }
    }
}

/// Parses the full argument vector, program name included.
///
/// `--help` and `--version` print their text and exit the process with status 0. Every other
/// problem is reported as a [`Usage`] error before anything has been run.
pub fn parse_args<I, T>(args: I) -> Result<(Config, Invocation), Usage>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            debug!("argument parsing failed: {e}");
            return Err(match e.kind() {
                ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
                    let msg = e.to_string();
                    Usage::Invalid(msg.lines().next().unwrap_or_default().to_string())
                }
                _ => Usage::General,
            });
        }
    };

    let config = cli.config();
    let invocation = cli.invocation()?;
    Ok((config, invocation))
}

/// Runs the procedure selected by `invocation`.
pub fn dispatch<R: Runner>(
    config: &Config,
    invocation: Invocation,
    runner: &R,
) -> Result<(), Error> {
    debug!("{config:?}");

    match invocation {
        Invocation::Master { subnet } => {
            info!("Provisioning NFS master for subnet {subnet}");
            master::setup_master(config, runner, &subnet)?;
        }
        Invocation::Compute {
            nodes,
            parallel: None,
        } => {
            info!("Provisioning {} compute node(s)", nodes.len());
            compute::provision_nodes(config, runner, &nodes)?;
        }
        Invocation::Compute {
            nodes,
            parallel: Some(workers),
        } => {
            info!(
                "Provisioning {} compute node(s), {workers} at a time",
                nodes.len()
            );
            let reports = compute::provision_nodes_parallel(config, runner, &nodes, workers)?;
            compute::summarize(reports)?;
        }
    }

    Ok(())
}

/// The process exit status for the outcome of [`run`]: 0 on success, 1 for any error.
pub fn exit_status(res: &Result<(), Error>) -> u8 {
    match res {
        Ok(()) => 0,
        Err(Error::Usage(_)) | Err(Error::Step(_)) | Err(Error::Nodes(_)) => 1,
    }
}

/// Parses `args` and dispatches. Usage errors are returned before `runner` is ever called.
pub fn run<I, T, R>(args: I, runner: &R) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    R: Runner,
{
    let (config, invocation) = parse_args(args)?;
    dispatch(&config, invocation, runner)
}
