// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fs;

use exports::{ClientId, Export, ExportClient, ExportOptions, ExportTable};
use log::*;

use crate::command::{Cmd, Runner};
use crate::config::Config;
use crate::error::{StepContext, StepError};

/// The export table the master serves: one entry per share, each open to `<subnet>/<prefix>` with
/// the cluster share options.
pub fn export_table(config: &Config, subnet: &str) -> ExportTable {
    let exports = config
        .share_dirs()
        .into_iter()
        .map(|path| Export {
            path,
            clients: vec![ExportClient {
                client: ClientId::subnet(subnet, config.subnet_prefix),
                options: ExportOptions::cluster_share(),
            }],
        })
        .collect();

    ExportTable { exports }
}

/// Turns the local host into the NFS server for `subnet`.
///
/// Steps run in order and the first failure is returned. Nothing already done is undone: the
/// directories and the export table are safe to recreate on a later run, a half-finished package
/// install may not be.
pub fn setup_master<R: Runner>(config: &Config, runner: &R, subnet: &str) -> Result<(), StepError> {
    info!("Installing {}", config.server_package);
    runner
        .run(
            &Cmd::new("apt-get")
                .args(["install", "-y", "-qq"])
                .arg(config.server_package.as_str())
                .env("DEBIAN_FRONTEND", "noninteractive"),
        )
        .step("install the NFS server package")?;

    info!("Creating export directories under {}", config.base_path.display());
    for dir in config.share_dirs() {
        fs::create_dir_all(&dir).step("create the export directories")?;
    }

    info!(
        "Setting owner {} and mode {} on {}",
        config.share_owner,
        config.share_mode,
        config.base_path.display()
    );
    let base = config.base_path.to_string_lossy();
    runner
        .run(
            &Cmd::new("chown")
                .arg("-R")
                .arg(config.share_owner.as_str())
                .arg(&*base),
        )
        .step("set ownership on the shares")?;
    runner
        .run(
            &Cmd::new("chmod")
                .arg("-R")
                .arg(config.share_mode.as_str())
                .arg(&*base),
        )
        .step("set permissions on the shares")?;

    info!(
        "Writing {} for {subnet}/{}",
        config.exports_path.display(),
        config.subnet_prefix
    );
    let table = export_table(config, subnet);
    fs::write(&config.exports_path, table.to_string()).step("write the export table")?;

    info!("Re-exporting all shares");
    runner
        .run(&Cmd::new("exportfs").arg("-ra"))
        .step("re-export the shares")?;

    info!("Restarting and enabling {}", config.server_service);
    runner
        .run(
            &Cmd::new("systemctl")
                .arg("restart")
                .arg(config.server_service.as_str()),
        )
        .step("restart the NFS server")?;
    runner
        .run(
            &Cmd::new("systemctl")
                .arg("enable")
                .arg(config.server_service.as_str()),
        )
        .step("enable the NFS server")?;

    info!("NFS master setup complete");
    Ok(())
}
