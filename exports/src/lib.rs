// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use cidr::Ipv4Inet;

/// The contents of an export table such as `/etc/exports`. Rendering it with `Display` yields the
/// exact text that should replace the file: one line per export, each terminated by a newline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportTable {
    pub exports: Vec<Export>,
}

impl fmt::Display for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for export in self.exports.iter() {
            writeln!(f, "{export}")?;
        }
        Ok(())
    }
}

/// An NFS export.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub path: PathBuf,
    pub clients: Vec<ExportClient>,
}

impl fmt::Display for Export {
    /// The path and its client list are separated by a tab; clients are separated by a space.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\t", self.path.display())?;
        let mut first = true;
        for client in self.clients.iter() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{client}")?;
            first = false;
        }
        Ok(())
    }
}

/// A set of clients that can access an export, together with the options applied to those clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportClient {
    pub client: ClientId,
    pub options: ExportOptions,
}

impl fmt::Display for ExportClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.client, self.options)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientId {
    Name(String),
    Addr(IpAddr),
    Netgroup(String),
    /// An IPv4 network given as an address plus prefix length. The host bits of the address are
    /// kept as written, so `10.1.2.3` with a /24 prefix renders as `10.1.2.3/24`.
    Network(Ipv4Inet),
    /// A client specifier that could not be typed, written out verbatim.
    Raw(String),
}

impl ClientId {
    /// Build the client specifier for a subnet given as a bare address and a prefix length.
    ///
    /// Addresses that parse as IPv4 become a typed `Network`; anything else is passed through as
    /// `<subnet>/<prefix>` so that the export table still receives what the operator typed.
    pub fn subnet(subnet: &str, prefix: u8) -> Self {
        match subnet.parse::<Ipv4Addr>() {
            Ok(addr) => match Ipv4Inet::new(addr, prefix) {
                Ok(inet) => ClientId::Network(inet),
                Err(_) => ClientId::Raw(format!("{subnet}/{prefix}")),
            },
            Err(_) => ClientId::Raw(format!("{subnet}/{prefix}")),
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Addr(addr) => write!(f, "{addr}"),
            Self::Netgroup(group) => write!(f, "@{group}"),
            // Always print the prefix, even for a /32:
            Self::Network(inet) => write!(f, "{}/{}", inet.address(), inet.network_length()),
            Self::Raw(spec) => write!(f, "{spec}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Whether to deny write access to the export.
    pub read_only: bool,
    /// Whether the server must commit writes to stable storage before replying.
    pub sync: bool,
    /// If true, map the root user to the anonymous user.
    pub root_squash: bool,
    /// Whether the server verifies that a requested file lies inside the exported subtree.
    pub subtree_check: bool,
}

impl ExportOptions {
    /// Read-write, synchronous, no root squashing and no subtree checking: the option set used
    /// for cluster scratch shares.
    pub fn cluster_share() -> Self {
        Self {
            read_only: false,
            sync: true,
            root_squash: false,
            subtree_check: false,
        }
    }
}

impl Default for ExportOptions {
    /// The defaults of exportfs(8).
    fn default() -> Self {
        Self {
            read_only: true,
            sync: true,
            root_squash: true,
            subtree_check: false,
        }
    }
}

impl fmt::Display for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            if self.read_only { "ro" } else { "rw" },
            if self.sync { "sync" } else { "async" },
            if self.root_squash {
                "root_squash"
            } else {
                "no_root_squash"
            },
            if self.subtree_check {
                "subtree_check"
            } else {
                "no_subtree_check"
            },
        )
    }
}
