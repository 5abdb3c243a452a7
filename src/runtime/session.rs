use crate::runtime::address::{self, AddressFamily};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

const OPEN_PORT_CANDIDATES: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Encapsulation spoken on a TCP port, with the scanner's numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Auto,
    Ip,
    Ssl23,
    Ssl2,
    Ssl3,
    Tls1,
    Other(i64),
}

impl Transport {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Transport::Auto,
            1 => Transport::Ip,
            2 => Transport::Ssl23,
            3 => Transport::Ssl2,
            4 => Transport::Ssl3,
            5 => Transport::Tls1,
            other => Transport::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Transport::Auto => 0,
            Transport::Ip => 1,
            Transport::Ssl23 => 2,
            Transport::Ssl2 => 3,
            Transport::Ssl3 => 4,
            Transport::Tls1 => 5,
            Transport::Other(code) => *code,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Transport::Ip => "IP".into(),
            Transport::Ssl23 => "SSLv23".into(),
            Transport::Ssl2 => "SSLv2".into(),
            Transport::Ssl3 => "SSLv3".into(),
            Transport::Tls1 => "TLSv1".into(),
            // auto-detection is not a layer of its own
            Transport::Auto | Transport::Other(_) => {
                let code = self.code();
                format!("[unknown transport layer - code {code} ({code:#x})]")
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortRangeError {
    #[error("empty item in port range `{range}`")]
    EmptyItem { range: String },
    #[error("invalid port `{item}`")]
    InvalidPort { item: String },
    #[error("reversed range `{item}`")]
    Reversed { item: String },
}

/// Ports the scanner actually probed, per protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortRange {
    tcp: Vec<RangeInclusive<u16>>,
    udp: Vec<RangeInclusive<u16>>,
}

impl PortRange {
    pub fn contains(&self, protocol: Protocol, port: u16) -> bool {
        let ranges = match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        };
        ranges.iter().any(|range| range.contains(&port))
    }

    pub fn is_empty(&self) -> bool {
        self.tcp.is_empty() && self.udp.is_empty()
    }
}

impl FromStr for PortRange {
    type Err = PortRangeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut range = PortRange::default();
        let mut scope: Option<Protocol> = None;
        for raw in text.split(',') {
            let mut item = raw.trim();
            if let Some(rest) = item.strip_prefix("T:") {
                scope = Some(Protocol::Tcp);
                item = rest.trim();
            } else if let Some(rest) = item.strip_prefix("U:") {
                scope = Some(Protocol::Udp);
                item = rest.trim();
            }
            if item.is_empty() {
                return Err(PortRangeError::EmptyItem {
                    range: text.to_string(),
                });
            }
            let ports = parse_range_item(item)?;
            match scope {
                Some(Protocol::Tcp) => range.tcp.push(ports),
                Some(Protocol::Udp) => range.udp.push(ports),
                None => {
                    range.tcp.push(ports.clone());
                    range.udp.push(ports);
                }
            }
        }
        Ok(range)
    }
}

fn parse_range_item(item: &str) -> Result<RangeInclusive<u16>, PortRangeError> {
    let parse_port = |text: &str| {
        text.trim()
            .parse::<u16>()
            .map_err(|_| PortRangeError::InvalidPort {
                item: item.to_string(),
            })
    };
    match item.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (parse_port(lo)?, parse_port(hi)?);
            if lo > hi {
                return Err(PortRangeError::Reversed {
                    item: item.to_string(),
                });
            }
            Ok(lo..=hi)
        }
        None => {
            let port = parse_port(item)?;
            Ok(port..=port)
        }
    }
}

/// Knowledge gathered by the port scanners.
#[derive(Clone, Debug, Default)]
pub struct PortTable {
    open_tcp: BTreeSet<u16>,
    open_udp: BTreeSet<u16>,
    tcp_scanned: bool,
    udp_scanned: bool,
    range: Option<PortRange>,
    unscanned_closed: bool,
}

impl PortTable {
    fn open_set(&self, protocol: Protocol) -> &BTreeSet<u16> {
        match protocol {
            Protocol::Tcp => &self.open_tcp,
            Protocol::Udp => &self.open_udp,
        }
    }

    /// Ports that were never probed count as open unless the
    /// `unscanned_closed` preference says otherwise.
    pub fn is_open(&self, protocol: Protocol, port: u16) -> bool {
        let unscanned = !self.unscanned_closed;
        match protocol {
            Protocol::Tcp if !self.tcp_scanned => return unscanned,
            Protocol::Udp if !self.udp_scanned => return true,
            _ => {}
        }
        let Some(range) = &self.range else {
            return true;
        };
        if !range.contains(protocol, port) {
            return unscanned;
        }
        self.open_set(protocol).contains(&port)
    }

    /// Avoids always answering the lowest port (SYN-flood countermeasures)
    /// and prefers anything over 21 and 80, which transparent proxies often fake.
    pub fn pick_open_tcp<R: Rng>(&self, rng: &mut R) -> Option<u16> {
        let candidates: Vec<u16> = self
            .open_tcp
            .iter()
            .copied()
            .filter(|port| *port != 21 && *port != 80)
            .take(OPEN_PORT_CANDIDATES)
            .collect();
        if !candidates.is_empty() {
            return Some(candidates[rng.gen_range(0..candidates.len())]);
        }
        [21, 80]
            .into_iter()
            .find(|port| self.open_tcp.contains(port))
    }
}

/// Source addresses the scan may bind to; one per family is claimed by the
/// orchestrator before scripts run.
#[derive(Clone, Debug, Default)]
pub struct SourcePool {
    v4: Vec<Ipv4Addr>,
    v6: Vec<Ipv6Addr>,
    claimed_v4: Option<usize>,
    claimed_v6: Option<usize>,
}

impl SourcePool {
    pub fn claim<R: Rng>(&mut self, rng: &mut R) {
        self.claimed_v4 = (!self.v4.is_empty()).then(|| rng.gen_range(0..self.v4.len()));
        self.claimed_v6 = (!self.v6.is_empty()).then(|| rng.gen_range(0..self.v6.len()));
    }

    /// The claimed address for `family`, or the "any" address.
    pub fn claimed(&self, family: AddressFamily) -> Ipv6Addr {
        match family {
            AddressFamily::V4 => self
                .claimed_v4
                .and_then(|idx| self.v4.get(idx))
                .map(|v4| address::to_mapped(*v4))
                .unwrap_or_else(|| address::to_mapped(Ipv4Addr::UNSPECIFIED)),
            AddressFamily::V6 => self
                .claimed_v6
                .and_then(|idx| self.v6.get(idx))
                .copied()
                .unwrap_or(Ipv6Addr::UNSPECIFIED),
        }
    }
}

/// Per-target scan record. Owned by the orchestrator; built-ins only ever
/// borrow it immutably.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    target: Option<Ipv6Addr>,
    fqdn: Option<String>,
    ports: PortTable,
    transports: HashMap<u16, Transport>,
    sources: SourcePool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: Ipv6Addr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_fqdn(mut self, fqdn: impl Into<String>) -> Self {
        self.fqdn = Some(fqdn.into());
        self
    }

    pub fn target(&self) -> Option<Ipv6Addr> {
        self.target
    }

    pub fn fqdn(&self) -> Option<&str> {
        self.fqdn.as_deref()
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    pub fn set_open(&mut self, protocol: Protocol, port: u16) {
        match protocol {
            Protocol::Tcp => self.ports.open_tcp.insert(port),
            Protocol::Udp => self.ports.open_udp.insert(port),
        };
    }

    pub fn mark_scanned(&mut self, protocol: Protocol) {
        match protocol {
            Protocol::Tcp => self.ports.tcp_scanned = true,
            Protocol::Udp => self.ports.udp_scanned = true,
        }
    }

    pub fn set_port_range(&mut self, range: PortRange) {
        self.ports.range = Some(range);
    }

    pub fn set_unscanned_closed(&mut self, closed: bool) {
        self.ports.unscanned_closed = closed;
    }

    pub fn port_state(&self, protocol: Protocol, port: u16) -> bool {
        self.ports.is_open(protocol, port)
    }

    pub fn set_transport(&mut self, port: u16, transport: Transport) {
        self.transports.insert(port, transport);
    }

    /// Ports without a recorded transport are plain IP.
    pub fn port_transport(&self, port: u16) -> Transport {
        self.transports.get(&port).copied().unwrap_or(Transport::Ip)
    }

    pub fn add_source(&mut self, source: Ipv6Addr) {
        match address::from_mapped(&source) {
            Some(v4) => self.sources.v4.push(v4),
            None => self.sources.v6.push(source),
        }
    }

    pub fn claim_sources<R: Rng>(&mut self, rng: &mut R) {
        self.sources.claim(rng);
    }

    pub fn claimed_source(&self, family: AddressFamily) -> Ipv6Addr {
        self.sources.claimed(family)
    }
}
