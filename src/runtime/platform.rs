use crate::runtime::address;
use std::ffi::{CStr, CString};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::os::raw::c_char;
use std::ptr;
use thiserror::Error;
use tracing::debug;

const NI_MAXHOST: usize = 1025;
const HOST_NAME_MAX: usize = 256;
/// Discard service; only used to let the kernel pick a route, nothing is sent.
const ROUTE_PROBE_PORT: u16 = 9;

/// One answer from the system resolver: canonical name first, then aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostEntry {
    pub name: String,
    pub aliases: Vec<String>,
    pub addresses: Vec<IpAddr>,
}

impl HostEntry {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("`{name}` does not resolve: {reason}")]
    NotFound { name: String, reason: String },
    #[error("invalid host name `{name}`")]
    InvalidName { name: String },
    #[error("local host name unavailable: {reason}")]
    LocalName { reason: String },
}

/// Name service used by the host built-ins. Lookups may block until the
/// system resolver gives up.
///
/// `StdPlatform` answers through `getaddrinfo`/`getnameinfo`, which expose no
/// alias lists: reverse answers carry only the canonical name, and the only
/// forward alias is the queried name when it differs from the canonical one.
/// Extra names from a hosts-file line therefore never take part in
/// `cmp_hostname` comparisons.
pub trait Resolver: Send + Sync {
    fn forward(&self, name: &str) -> Result<HostEntry, ResolveError>;
    fn reverse(&self, addr: IpAddr) -> Result<HostEntry, ResolveError>;
    fn local_hostname(&self) -> Result<String, ResolveError>;
}

/// Knowledge about the scanner's own interfaces and routes.
pub trait LocalNetwork: Send + Sync {
    fn is_local_host(&self, addr: &Ipv6Addr) -> bool;
    fn is_local_net(&self, addr: &Ipv6Addr) -> bool;
    fn route_through(&self, dest: &Ipv6Addr) -> Option<Ipv6Addr>;
}

pub trait Platform: Resolver + LocalNetwork {}

impl<T: Resolver + LocalNetwork> Platform for T {}

/// Operating-system backed platform: libc resolver and interface table,
/// kernel routing via an unconnected UDP socket.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdPlatform;

impl Resolver for StdPlatform {
    fn forward(&self, name: &str) -> Result<HostEntry, ResolveError> {
        let c_name = CString::new(name).map_err(|_| ResolveError::InvalidName {
            name: name.to_string(),
        })?;
        let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;
        hints.ai_flags = libc::AI_CANONNAME;

        let mut res: *mut libc::addrinfo = ptr::null_mut();
        let status = unsafe { libc::getaddrinfo(c_name.as_ptr(), ptr::null(), &hints, &mut res) };
        if status != 0 {
            let reason = unsafe { CStr::from_ptr(libc::gai_strerror(status)) }
                .to_string_lossy()
                .into_owned();
            return Err(ResolveError::NotFound {
                name: name.to_string(),
                reason,
            });
        }

        let mut entry = HostEntry::default();
        let mut cursor = res;
        while !cursor.is_null() {
            let info = unsafe { &*cursor };
            if entry.name.is_empty() && !info.ai_canonname.is_null() {
                entry.name = unsafe { CStr::from_ptr(info.ai_canonname) }
                    .to_string_lossy()
                    .into_owned();
            }
            if let Some(ip) = unsafe { sockaddr_ip(info.ai_addr) } {
                if !entry.addresses.contains(&ip) {
                    entry.addresses.push(ip);
                }
            }
            cursor = info.ai_next;
        }
        unsafe { libc::freeaddrinfo(res) };

        if entry.name.is_empty() {
            entry.name = name.to_string();
        } else if entry.name != name {
            // the queried name was an alias of the canonical one
            entry.aliases.push(name.to_string());
        }
        debug!(host = name, addresses = entry.addresses.len(), "forward lookup");
        Ok(entry)
    }

    fn reverse(&self, addr: IpAddr) -> Result<HostEntry, ResolveError> {
        let socket = SocketAddr::new(addr, 0);
        let mut host = [0 as c_char; NI_MAXHOST];
        let status = match socket {
            SocketAddr::V4(v4) => {
                let raw = sockaddr_in(*v4.ip());
                unsafe {
                    libc::getnameinfo(
                        &raw as *const libc::sockaddr_in as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                        host.as_mut_ptr(),
                        host.len() as libc::socklen_t,
                        ptr::null_mut(),
                        0,
                        libc::NI_NAMEREQD,
                    )
                }
            }
            SocketAddr::V6(v6) => {
                let raw = sockaddr_in6(*v6.ip());
                unsafe {
                    libc::getnameinfo(
                        &raw as *const libc::sockaddr_in6 as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                        host.as_mut_ptr(),
                        host.len() as libc::socklen_t,
                        ptr::null_mut(),
                        0,
                        libc::NI_NAMEREQD,
                    )
                }
            }
        };
        if status != 0 {
            let reason = unsafe { CStr::from_ptr(libc::gai_strerror(status)) }
                .to_string_lossy()
                .into_owned();
            return Err(ResolveError::NotFound {
                name: addr.to_string(),
                reason,
            });
        }
        let name = unsafe { CStr::from_ptr(host.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        debug!(%addr, %name, "reverse lookup");
        Ok(HostEntry {
            name,
            aliases: Vec::new(),
            addresses: vec![addr],
        })
    }

    fn local_hostname(&self) -> Result<String, ResolveError> {
        let mut buf = [0u8; HOST_NAME_MAX];
        let status =
            unsafe { libc::gethostname(buf.as_mut_ptr() as *mut c_char, buf.len() - 1) };
        if status != 0 {
            return Err(ResolveError::LocalName {
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }
}

impl LocalNetwork for StdPlatform {
    fn is_local_host(&self, addr: &Ipv6Addr) -> bool {
        let ip = address::denormalize(addr);
        ip.is_loopback() || interfaces().iter().any(|iface| iface.addr == ip)
    }

    fn is_local_net(&self, addr: &Ipv6Addr) -> bool {
        let ip = address::denormalize(addr);
        ip.is_loopback() || interfaces().iter().any(|iface| iface.same_network(&ip))
    }

    fn route_through(&self, dest: &Ipv6Addr) -> Option<Ipv6Addr> {
        let dest = address::denormalize(dest);
        let bind: SocketAddr = match dest {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind).ok()?;
        if let Err(err) = socket.connect((dest, ROUTE_PROBE_PORT)) {
            debug!(%dest, %err, "no route to destination");
            return None;
        }
        let local = address::normalize(socket.local_addr().ok()?.ip());
        (!address::is_any(&local)).then_some(local)
    }
}

#[derive(Clone, Debug)]
struct Interface {
    addr: IpAddr,
    netmask: Option<IpAddr>,
}

impl Interface {
    fn same_network(&self, other: &IpAddr) -> bool {
        match (self.addr, self.netmask, other) {
            (IpAddr::V4(own), Some(IpAddr::V4(mask)), IpAddr::V4(other)) => {
                let mask = u32::from(mask);
                u32::from(own) & mask == u32::from(*other) & mask
            }
            (IpAddr::V6(own), Some(IpAddr::V6(mask)), IpAddr::V6(other)) => {
                let mask = u128::from(mask);
                u128::from(own) & mask == u128::from(*other) & mask
            }
            _ => self.addr == *other,
        }
    }
}

fn interfaces() -> Vec<Interface> {
    let mut head: *mut libc::ifaddrs = ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        debug!(err = %std::io::Error::last_os_error(), "getifaddrs failed");
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        if let Some(addr) = unsafe { sockaddr_ip(entry.ifa_addr) } {
            let netmask = unsafe { sockaddr_ip(entry.ifa_netmask) };
            out.push(Interface { addr, netmask });
        }
        cursor = entry.ifa_next;
    }
    unsafe { libc::freeifaddrs(head) };
    out
}

/// # Safety
/// `sa` must be null or point to a socket address valid for its family.
unsafe fn sockaddr_ip(sa: *const libc::sockaddr) -> Option<IpAddr> {
    if sa.is_null() {
        return None;
    }
    match (*sa).sa_family as libc::c_int {
        libc::AF_INET => {
            let sin = &*(sa as *const libc::sockaddr_in);
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            let sin6 = &*(sa as *const libc::sockaddr_in6);
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}

fn sockaddr_in(addr: Ipv4Addr) -> libc::sockaddr_in {
    let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    raw.sin_family = libc::AF_INET as libc::sa_family_t;
    raw.sin_addr.s_addr = u32::from(addr).to_be();
    raw
}

fn sockaddr_in6(addr: Ipv6Addr) -> libc::sockaddr_in6 {
    let mut raw: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
    raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    raw.sin6_addr.s6_addr = addr.octets();
    raw
}
