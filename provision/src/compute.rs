// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::io::Write;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::*;

use crate::command::{Cmd, Runner};
use crate::config::Config;
use crate::error::{Error, NodeFailure, StepContext, StepError};
use crate::script::ClientScript;
use crate::ssh::{self, Agent};

/// Configures the NFS client on `node`, which must already trust the operator's key.
///
/// The client script is written to a local temporary file, copied to the node and run there. The
/// local file is removed afterwards; the remote copy is left in place.
pub fn setup_node<R: Runner>(config: &Config, runner: &R, node: &str) -> Result<(), StepError> {
    info!("Setting up NFS client on {node}");

    let script = ClientScript::new(config);
    let mut file = tempfile::Builder::new()
        .prefix("nfs_client_setup.")
        .suffix(".sh")
        .tempfile()
        .step("write the client setup script")?;
    file.write_all(script.render().as_bytes())
        .and_then(|()| file.flush())
        .step("write the client setup script")?;

    let result = transfer_and_run(config, runner, node, file.path());

    if let Err(e) = file.close() {
        warn!("Could not remove local client setup script: {e}");
    }

    result?;
    info!("NFS client on {node} configured");
    Ok(())
}

fn transfer_and_run<R: Runner>(
    config: &Config,
    runner: &R,
    node: &str,
    script: &Path,
) -> Result<(), StepError> {
    let agent = Agent::start(runner)?;
    let result = agent
        .add_key(&config.ssh, runner)
        .and_then(|()| copy_and_execute(config, runner, &agent, node, script));
    agent.stop(runner);
    result
}

fn copy_and_execute<R: Runner>(
    config: &Config,
    runner: &R,
    agent: &Agent,
    node: &str,
    script: &Path,
) -> Result<(), StepError> {
    let ssh = &config.ssh;

    info!("Copying client setup script to {node}");
    runner
        .run(
            &agent.apply(
                Cmd::new("scp")
                    .args(["-o", "StrictHostKeyChecking=no"])
                    .arg("-o")
                    .arg(ssh.connect_timeout_option())
                    .arg(script.to_string_lossy())
                    .arg(format!(
                        "{}:{}",
                        ssh.destination(node),
                        ssh.remote_script_path
                    )),
            ),
        )
        .step(&format!("copy the client setup script to {node}"))?;

    info!("Running client setup script on {node}");
    let output = runner
        .output(
            &agent.apply(
                Cmd::new("ssh")
                    .args(["-o", "BatchMode=yes"])
                    .args(["-o", "StrictHostKeyChecking=no"])
                    .arg("-o")
                    .arg(ssh.connect_timeout_option())
                    .arg(ssh.destination(node))
                    .arg("bash")
                    .arg(ssh.remote_script_path.as_str()),
            ),
        )
        .step(&format!("run the client setup script on {node}"))?;
    for line in output.lines() {
        debug!("{node}: {line}");
    }

    Ok(())
}

/// Bootstraps SSH trust with, then configures, each node in turn. The first failure stops the
/// run; nodes after it are not touched.
pub fn provision_nodes<R: Runner>(
    config: &Config,
    runner: &R,
    nodes: &[String],
) -> Result<(), StepError> {
    for node in nodes {
        ssh::bootstrap(&config.ssh, runner, node)?;
        setup_node(config, runner, node)?;
    }

    info!("All {} compute node(s) configured", nodes.len());
    Ok(())
}

/// The outcome for one node of a parallel run.
#[derive(Debug)]
pub struct NodeReport {
    pub node: String,
    pub result: Result<(), StepError>,
}

/// Provisions the nodes with up to `workers` of them in flight at once. A failing node doesn't
/// affect the others. Reports come back in the order the nodes were given.
///
/// The key pair is generated before any worker starts. If that fails no node is attempted.
pub fn provision_nodes_parallel<R: Runner>(
    config: &Config,
    runner: &R,
    nodes: &[String],
    workers: NonZeroUsize,
) -> Result<Vec<NodeReport>, StepError> {
    ssh::ensure_key_pair(&config.ssh, runner)?;

    let next = AtomicUsize::new(0);
    let next = &next;
    let workers = workers.get().min(nodes.len());

    let mut results: Vec<(usize, Result<(), StepError>)> = std::thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(s.spawn(move || {
                let mut done = Vec::new();
                loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(node) = nodes.get(i) else {
                        break;
                    };
                    let result = ssh::copy_id(&config.ssh, runner, node)
                        .and_then(|()| setup_node(config, runner, node));
                    done.push((i, result));
                }
                done
            }));
        }

        handles
            .into_iter()
            .flat_map(|h| {
                h.join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    results.sort_by_key(|(i, _)| *i);

    Ok(results
        .into_iter()
        .map(|(i, result)| NodeReport {
            node: nodes[i].clone(),
            result,
        })
        .collect())
}

/// Logs one line per node and turns any failures into an error.
pub fn summarize(reports: Vec<NodeReport>) -> Result<(), Error> {
    let total = reports.len();
    let mut failures = Vec::new();

    for report in reports {
        match report.result {
            Ok(()) => info!("{}: ok", report.node),
            Err(error) => {
                error!("{}: FAILED ({error})", report.node);
                failures.push(NodeFailure {
                    node: report.node,
                    error,
                });
            }
        }
    }

    info!(
        "{} of {total} compute node(s) configured",
        total - failures.len()
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Nodes(failures))
    }
}
