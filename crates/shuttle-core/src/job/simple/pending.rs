//! Pending task index: which task indices to consider for an offered host.
//!
//! Membership is fixed at construction; whether an index is still runnable is
//! decided at lookup time by the task table.

use std::collections::HashMap;

use crate::domain::Task;
use crate::ports::{HostIdentity, HostResolver};

#[derive(Debug, Clone, Default)]
pub struct PendingTasks {
    /// Preferred location -> indices that list it, in registration order.
    for_host: HashMap<String, Vec<usize>>,
    /// Indices without any preferred location.
    no_prefs: Vec<usize>,
    /// Every index.
    all: Vec<usize>,
    /// Offered host -> ranked local candidates.
    host_cache: HashMap<String, Vec<usize>>,
}

impl PendingTasks {
    pub fn new(tasks: &[Task]) -> Self {
        let mut pending = Self::default();
        for (index, task) in tasks.iter().enumerate() {
            pending.add(index, task.preferred_locations());
        }
        pending
    }

    fn add(&mut self, index: usize, locations: &[String]) {
        if locations.is_empty() {
            self.no_prefs.push(index);
        } else {
            for host in locations {
                self.for_host.entry(host.clone()).or_default().push(index);
            }
        }
        self.all.push(index);
    }

    pub fn no_prefs(&self) -> &[usize] {
        &self.no_prefs
    }

    pub fn all(&self) -> &[usize] {
        &self.all
    }

    /// Whether candidates for `host` are already ranked.
    pub fn knows(&self, host: &str) -> bool {
        self.host_cache.contains_key(host)
    }

    /// Rank and cache candidates for `host` from an identity resolved
    /// elsewhere.
    pub fn learn(&mut self, host: &str, identity: &HostIdentity) {
        let ranked = self.rank(host, identity);
        self.host_cache.insert(host.to_string(), ranked);
    }

    /// Candidates local to `host`, most specific match first. Memoized per
    /// host; an unknown host is resolved in place.
    pub fn for_host(&mut self, host: &str, resolver: &dyn HostResolver) -> &[usize] {
        if !self.knows(host) {
            let identity = resolver.identify(host);
            self.learn(host, &identity);
        }
        self.host_cache.get(host).map(Vec::as_slice).unwrap_or(&[])
    }

    fn rank(&self, host: &str, identity: &HostIdentity) -> Vec<usize> {
        let mut names = vec![host];
        for name in identity.names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        // (index, hits) in first-seen order
        let mut counts: Vec<(usize, usize)> = Vec::new();
        let mut position: HashMap<usize, usize> = HashMap::new();
        for name in names {
            let Some(indices) = self.for_host.get(name) else {
                continue;
            };
            for &index in indices {
                match position.get(&index) {
                    Some(&pos) => counts[pos].1 += 1,
                    None => {
                        position.insert(index, counts.len());
                        counts.push((index, 1));
                    }
                }
            }
        }
        // stable: equal counts keep first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.into_iter().map(|(index, _)| index).collect()
    }
}
