use crate::runtime::address;
use crate::runtime::platform::{HostEntry, LocalNetwork, ResolveError, Resolver};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};

fn ip(text: &str) -> IpAddr {
    text.parse().expect("test address")
}

fn mapped(text: &str) -> Ipv6Addr {
    address::parse_target(text).expect("test address")
}

/// In-memory resolver and interface table.
#[derive(Default)]
pub struct FakePlatform {
    hosts: HashMap<String, HostEntry>,
    ptrs: HashMap<IpAddr, HostEntry>,
    local_hosts: Vec<Ipv6Addr>,
    local_nets: Vec<Ipv6Addr>,
    routes: HashMap<Ipv6Addr, Ipv6Addr>,
    hostname: Option<String>,
    lookups: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, name: &str, aliases: &[&str], addresses: &[&str]) -> Self {
        self.hosts.insert(
            name.to_string(),
            HostEntry {
                name: name.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                addresses: addresses.iter().map(|a| ip(a)).collect(),
            },
        );
        self
    }

    pub fn with_ptr(self, addr: &str, name: &str, aliases: &[&str]) -> Self {
        self.with_ptr_answer(addr, name, aliases, &[addr])
    }

    /// PTR record whose answer carries `addresses` instead of just `addr`.
    pub fn with_ptr_answer(
        mut self,
        addr: &str,
        name: &str,
        aliases: &[&str],
        addresses: &[&str],
    ) -> Self {
        self.ptrs.insert(
            ip(addr),
            HostEntry {
                name: name.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                addresses: addresses.iter().map(|a| ip(a)).collect(),
            },
        );
        self
    }

    pub fn with_local_host(mut self, addr: &str) -> Self {
        self.local_hosts.push(mapped(addr));
        self
    }

    pub fn with_local_net(mut self, addr: &str) -> Self {
        self.local_nets.push(mapped(addr));
        self
    }

    pub fn with_route(mut self, dest: &str, source: &str) -> Self {
        self.routes.insert(mapped(dest), mapped(source));
        self
    }

    pub fn with_hostname(mut self, name: &str) -> Self {
        self.hostname = Some(name.to_string());
        self
    }

    /// Number of forward and reverse queries answered so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Resolver for FakePlatform {
    fn forward(&self, name: &str) -> Result<HostEntry, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.hosts
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                name: name.to_string(),
                reason: "unknown host".into(),
            })
    }

    fn reverse(&self, addr: IpAddr) -> Result<HostEntry, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.ptrs
            .get(&addr)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                name: addr.to_string(),
                reason: "no PTR record".into(),
            })
    }

    fn local_hostname(&self) -> Result<String, ResolveError> {
        self.hostname.clone().ok_or_else(|| ResolveError::LocalName {
            reason: "not configured".into(),
        })
    }
}

impl LocalNetwork for FakePlatform {
    fn is_local_host(&self, addr: &Ipv6Addr) -> bool {
        self.local_hosts.contains(addr)
    }

    fn is_local_net(&self, addr: &Ipv6Addr) -> bool {
        self.local_hosts.contains(addr) || self.local_nets.contains(addr)
    }

    fn route_through(&self, dest: &Ipv6Addr) -> Option<Ipv6Addr> {
        self.routes.get(dest).copied()
    }
}
