//! HostResolver port - ホスト名の解決
//!
//! An offer names a host one way; a task's preferred locations may name the
//! same machine another way (short name, FQDN, IP). The resolver expands a host
//! into every identity it is known by.

use crate::domain::ResolveError;

/// All names and addresses of one machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostIdentity {
    pub canonical: String,
    pub aliases: Vec<String>,
    pub addresses: Vec<String>,
}

impl HostIdentity {
    /// The host as its only identity.
    pub fn bare(host: impl Into<String>) -> Self {
        Self {
            canonical: host.into(),
            aliases: Vec::new(),
            addresses: Vec::new(),
        }
    }

    /// Canonical name, aliases, then addresses, each at most once.
    pub fn names(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(1 + self.aliases.len() + self.addresses.len());
        let all = std::iter::once(&self.canonical)
            .chain(&self.aliases)
            .chain(&self.addresses);
        for name in all {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        out
    }
}

pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Result<HostIdentity, ResolveError>;

    /// Like `resolve`, but a host that cannot be resolved is its own only
    /// identity. May block on the network.
    fn identify(&self, host: &str) -> HostIdentity {
        self.resolve(host).unwrap_or_else(|err| {
            tracing::debug!(host, error = %err, "host resolution failed, using bare name");
            HostIdentity::bare(host)
        })
    }
}
