// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::path::PathBuf;

/// Directory under which both shares live, on the master and on every compute node.
pub const DEFAULT_BASE_PATH: &str = "/srv/nfs";

/// Address the compute nodes mount the shares from.
pub const DEFAULT_MASTER_ADDRESS: &str = "192.168.1.100";

/// Prefix length appended to the operator-supplied subnet address.
pub const DEFAULT_SUBNET_PREFIX: u8 = 24;

/// The names of the two shares, relative to the base path.
pub const SHARE_NAMES: [&str; 2] = ["data", "scripts"];

/// Settings shared by the master and compute procedures. Built once at startup and passed down
/// explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_path: PathBuf,
    pub master_address: String,
    pub subnet_prefix: u8,

    /// The export table overwritten by the master procedure.
    pub exports_path: PathBuf,

    pub server_package: String,
    pub server_service: String,
    pub client_package: String,

    /// `user:group` that owns the shares on the master.
    pub share_owner: String,
    /// Octal mode applied recursively to the shares on the master.
    pub share_mode: String,

    pub ssh: SshConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
            master_address: DEFAULT_MASTER_ADDRESS.to_string(),
            subnet_prefix: DEFAULT_SUBNET_PREFIX,
            exports_path: PathBuf::from("/etc/exports"),
            server_package: "nfs-kernel-server".to_string(),
            server_service: "nfs-kernel-server".to_string(),
            client_package: "nfs-common".to_string(),
            share_owner: "nobody:nogroup".to_string(),
            share_mode: "770".to_string(),
            ssh: SshConfig::default(),
        }
    }
}

impl Config {
    /// The absolute paths of the shares, in the order of [`SHARE_NAMES`].
    pub fn share_dirs(&self) -> Vec<PathBuf> {
        SHARE_NAMES
            .iter()
            .map(|name| self.base_path.join(name))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote account the key is installed for and commands are run as.
    pub user: String,

    /// Private key; the public half is expected next to it with a `.pub` extension.
    pub key_path: PathBuf,

    /// Seconds passed as `ConnectTimeout` to scp and ssh.
    pub connect_timeout: u32,

    /// Where the client setup script is copied to on each compute node. It is left there after
    /// running.
    pub remote_script_path: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/root"));

        Self {
            user: "root".to_string(),
            key_path: home.join(".ssh").join("id_rsa"),
            connect_timeout: 10,
            remote_script_path: "/tmp/nfs_client_setup.sh".to_string(),
        }
    }
}

impl SshConfig {
    pub fn public_key_path(&self) -> PathBuf {
        let mut path = self.key_path.clone().into_os_string();
        path.push(".pub");
        PathBuf::from(path)
    }

    /// `user@node`
    pub fn destination(&self, node: &str) -> String {
        format!("{}@{}", self.user, node)
    }

    pub fn connect_timeout_option(&self) -> String {
        format!("ConnectTimeout={}", self.connect_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_dirs_under_base() {
        let config = Config {
            base_path: "/export/cluster".into(),
            ..Config::default()
        };

        assert_eq!(
            config.share_dirs(),
            vec![
                PathBuf::from("/export/cluster/data"),
                PathBuf::from("/export/cluster/scripts")
            ]
        );
    }

    #[test]
    fn ssh_paths() {
        let ssh = SshConfig {
            key_path: "/home/op/.ssh/id_rsa".into(),
            ..SshConfig::default()
        };

        assert_eq!(
            ssh.public_key_path(),
            PathBuf::from("/home/op/.ssh/id_rsa.pub")
        );
        assert_eq!(ssh.destination("10.0.0.7"), "root@10.0.0.7");
        assert_eq!(ssh.connect_timeout_option(), "ConnectTimeout=10");
    }
}
