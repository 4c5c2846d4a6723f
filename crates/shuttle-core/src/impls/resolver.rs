//! HostResolver implementations.
//!
//! - StaticResolver: 固定テーブル（テスト・シミュレーション用）
//! - SystemResolver: OS のリゾルバ（本番用）

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

use dns_lookup::AddrInfoHints;

use crate::domain::ResolveError;
use crate::ports::{HostIdentity, HostResolver};

/// Resolves from a fixed table. Unknown hosts fail to resolve, which callers
/// treat as "the host is its own only identity".
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    table: HashMap<String, HostIdentity>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, identity: HostIdentity) -> Self {
        self.table.insert(host.into(), identity);
        self
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> Result<HostIdentity, ResolveError> {
        self.table
            .get(host)
            .cloned()
            .ok_or_else(|| ResolveError::NoAddress(host.to_string()))
    }
}

/// `AI_CANONNAME`; the same value on every platform getaddrinfo runs on.
const AI_CANONNAME: i32 = 0x0002;

/// Looks hosts up through the operating system.
///
/// The canonical name and addresses come from `getaddrinfo`; aliases are the
/// reverse lookups of those addresses. A failed reverse lookup only costs the
/// alias.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    fn aliases(canonical: &str, addresses: &[IpAddr]) -> Vec<String> {
        let mut aliases: Vec<String> = Vec::new();
        for ip in addresses {
            match dns_lookup::lookup_addr(ip) {
                // getnameinfo hands back the numeric form when there is no PTR record
                Ok(name) if name.parse::<IpAddr>().is_ok() => {}
                Ok(name) => {
                    if name != canonical && !aliases.contains(&name) {
                        aliases.push(name);
                    }
                }
                Err(err) => {
                    tracing::debug!(%ip, error = %err, "reverse lookup failed");
                }
            }
        }
        aliases
    }
}

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<HostIdentity, ResolveError> {
        let lookup_error = |source: io::Error| ResolveError::Lookup {
            host: host.to_string(),
            source,
        };
        let hints = AddrInfoHints {
            flags: AI_CANONNAME,
            ..AddrInfoHints::default()
        };
        let infos = dns_lookup::getaddrinfo(Some(host), None, Some(hints))
            .map_err(|err| lookup_error(io::Error::from(err)))?;

        let mut canonical: Option<String> = None;
        let mut ips: Vec<IpAddr> = Vec::new();
        for info in infos {
            let info = info.map_err(lookup_error)?;
            if canonical.is_none() {
                canonical = info.canonname.filter(|name| !name.is_empty());
            }
            let ip = info.sockaddr.ip();
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }
        if ips.is_empty() {
            return Err(ResolveError::NoAddress(host.to_string()));
        }

        let canonical = canonical.unwrap_or_else(|| host.to_string());
        let aliases = Self::aliases(&canonical, &ips);
        Ok(HostIdentity {
            canonical,
            aliases,
            addresses: ips.iter().map(IpAddr::to_string).collect(),
        })
    }
}
