//! Turns a script-supplied host specifier into the evidence `same_host`
//! compares: IPv4 addresses and, on request, the names attached to them.
//!
//! Lookup failures never abort a comparison. An unresolvable hostname keeps
//! its own text as its only name so literal-equal specifiers still match.

use crate::runtime::address;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::platform::{HostEntry, Resolver};
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// Longest specifier handed to the resolver.
pub const MAX_HOSTNAME_LEN: usize = 255;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostAddressSet {
    addresses: Vec<Ipv4Addr>,
    names: Vec<Vec<u8>>,
}

impl HostAddressSet {
    pub fn addresses(&self) -> &[Ipv4Addr] {
        &self.addresses
    }

    pub fn names(&self) -> &[Vec<u8>] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.names.is_empty()
    }

    pub fn intersects(&self, other: &HostAddressSet) -> bool {
        self.addresses
            .iter()
            .any(|ours| other.addresses.iter().any(|theirs| ours == theirs))
    }

    /// Exact, case-sensitive name comparison.
    pub fn shares_name(&self, other: &HostAddressSet) -> bool {
        self.names
            .iter()
            .any(|ours| other.names.iter().any(|theirs| ours == theirs))
    }

    fn push_address(&mut self, addr: Ipv4Addr) {
        if !self.addresses.contains(&addr) {
            self.addresses.push(addr);
        }
    }

    /// Keeps only 4-byte answers; anything else is not comparable here.
    fn absorb_entry(&mut self, entry: HostEntry, want_names: bool) {
        for addr in &entry.addresses {
            match addr {
                IpAddr::V4(v4) => self.push_address(*v4),
                IpAddr::V6(v6) => match address::from_mapped(v6) {
                    Some(v4) => self.push_address(v4),
                    None => debug!(%v6, "ignoring non-IPv4 answer"),
                },
            }
        }
        if want_names {
            self.names
                .extend(entry.names().map(|name| name.as_bytes().to_vec()));
        }
    }
}

pub fn resolve_specifier<R: Resolver + ?Sized>(
    resolver: &R,
    builtin: &'static str,
    specifier: &[u8],
    want_names: bool,
) -> RuntimeResult<HostAddressSet> {
    if specifier.len() > MAX_HOSTNAME_LEN {
        return Err(RuntimeError::invalid(
            builtin,
            format!("host name longer than {MAX_HOSTNAME_LEN} bytes"),
        ));
    }

    let mut set = HostAddressSet::default();
    // bytes the system resolver cannot take are compared by identity only
    let Some(specifier) = std::str::from_utf8(specifier)
        .ok()
        .filter(|text| !text.contains('\0'))
    else {
        debug!(
            specifier = %String::from_utf8_lossy(specifier),
            "not a resolvable host name"
        );
        if want_names {
            set.names.push(specifier.to_vec());
        }
        return Ok(set);
    };

    match address::parse_v4_literal(specifier) {
        Some(literal) => {
            set.push_address(literal);
            if want_names {
                match resolver.reverse(IpAddr::V4(literal)) {
                    Ok(entry) => set.absorb_entry(entry, true),
                    Err(err) => debug!(%literal, %err, "reverse lookup failed"),
                }
            }
        }
        None => match resolver.forward(specifier) {
            Ok(entry) => set.absorb_entry(entry, want_names),
            Err(err) => {
                debug!(%err, "{specifier} does not resolve");
                if want_names {
                    set.names.push(specifier.as_bytes().to_vec());
                }
            }
        },
    }
    Ok(set)
}
