// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

// Renders the shell script that turns a compute node into an NFS client. The script is copied to
// the node and run there in one go, and checks the status of each of its own steps.

use std::fmt::{self, Write};
use std::path::PathBuf;

use crate::config::Config;

const FSTAB: &str = "/etc/fstab";

/// One line of `/etc/fstab` mounting an NFS share.
#[derive(Debug, Clone, PartialEq)]
pub struct MountEntry {
    /// `server:/path`
    pub source: String,
    pub target: PathBuf,
    pub options: String,
}

impl fmt::Display for MountEntry {
    /// Space separated, with dump and pass both 0.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} nfs {} 0 0",
            self.source,
            self.target.display(),
            self.options
        )
    }
}

/// The steps run on a compute node: install the client package, create the mount points, append
/// one fstab entry per share and mount everything.
#[derive(Debug, Clone)]
pub struct ClientScript {
    master_address: String,
    package: String,
    mounts: Vec<MountEntry>,
}

impl ClientScript {
    /// The share paths on the master and the mount points on the node are the same.
    pub fn new(config: &Config) -> Self {
        let mounts = config
            .share_dirs()
            .into_iter()
            .map(|dir| MountEntry {
                source: format!("{}:{}", config.master_address, dir.display()),
                target: dir,
                options: "defaults".to_string(),
            })
            .collect();

        Self {
            master_address: config.master_address.clone(),
            package: config.client_package.clone(),
            mounts,
        }
    }

    pub fn mounts(&self) -> &[MountEntry] {
        &self.mounts
    }

    pub fn render(&self) -> String {
        let mut s = String::new();

        // Writing into a String can't fail.
        let _ = self.write_to(&mut s);
        s
    }

    fn write_to(&self, s: &mut String) -> fmt::Result {
        writeln!(s, "#!/bin/bash")?;
        writeln!(s, "# NFS client setup, shares served by {}", self.master_address)?;
        writeln!(s)?;
        writeln!(s, "log() {{")?;
        writeln!(s, "    echo \"$(date '+%Y-%m-%d %H:%M:%S') $1\"")?;
        writeln!(s, "}}")?;
        writeln!(s)?;
        writeln!(s, "# run <label> <command...>: stop the script if the command fails")?;
        writeln!(s, "run() {{")?;
        writeln!(s, "    local label=\"$1\"")?;
        writeln!(s, "    shift")?;
        writeln!(s, "    if ! \"$@\"; then")?;
        writeln!(s, "        log \"ERROR: $label failed\"")?;
        writeln!(s, "        exit 1")?;
        writeln!(s, "    fi")?;
        writeln!(s, "    log \"$label\"")?;
        writeln!(s, "}}")?;
        writeln!(s)?;
        writeln!(s, "append_fstab() {{")?;
        writeln!(s, "    echo \"$1\" >> {FSTAB}")?;
        writeln!(s, "}}")?;
        writeln!(s)?;

        writeln!(
            s,
            "run {} env DEBIAN_FRONTEND=noninteractive apt-get install -y -qq {}",
            quote(&format!("install {}", self.package)),
            quote(&self.package)
        )?;

        for mount in self.mounts.iter() {
            let target = mount.target.to_string_lossy();
            writeln!(
                s,
                "run {} mkdir -p {}",
                quote(&format!("create {target}")),
                quote(&target)
            )?;
        }

        for mount in self.mounts.iter() {
            writeln!(
                s,
                "run {} append_fstab {}",
                quote(&format!("add fstab entry for {}", mount.target.display())),
                quote(&mount.to_string())
            )?;
        }

        writeln!(s, "run 'mount all shares' mount -a")?;
        writeln!(s, "log 'NFS client setup complete'")?;

        Ok(())
    }
}

/// Single-quotes `s` for a POSIX shell.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounts_point_at_master() {
        let script = ClientScript::new(&Config::default());

        let lines: Vec<String> = script.mounts().iter().map(|m| m.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "192.168.1.100:/srv/nfs/data /srv/nfs/data nfs defaults 0 0",
                "192.168.1.100:/srv/nfs/scripts /srv/nfs/scripts nfs defaults 0 0",
            ]
        );
    }

    #[test]
    fn rendered_steps_in_order() {
        let config = Config {
            master_address: "10.9.9.1".into(),
            base_path: "/cluster".into(),
            ..Config::default()
        };
        let rendered = ClientScript::new(&config).render();

        assert!(rendered.starts_with("#!/bin/bash\n"));

        let positions: Vec<usize> = [
            "apt-get install -y -qq 'nfs-common'",
            "mkdir -p '/cluster/data'",
            "mkdir -p '/cluster/scripts'",
            "append_fstab '10.9.9.1:/cluster/data /cluster/data nfs defaults 0 0'",
            "append_fstab '10.9.9.1:/cluster/scripts /cluster/scripts nfs defaults 0 0'",
            "mount -a",
        ]
        .iter()
        .map(|needle| {
            rendered
                .find(needle)
                .unwrap_or_else(|| panic!("{needle:?} missing from:\n{rendered}"))
        })
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn subnet_prefix_stays_on_the_master() {
        let config = Config {
            subnet_prefix: 16,
            ..Config::default()
        };
        let rendered = ClientScript::new(&config).render();

        assert!(rendered.contains("192.168.1.100"));
        assert!(!rendered.contains("/16"), "{rendered}");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }
}
