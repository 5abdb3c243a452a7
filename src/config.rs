//! Session files: the per-target facts the orchestrator hands to scripts,
//! stored as TOML.

use crate::runtime::{
    address,
    session::{PortRange, PortRangeError, Protocol, SessionState, Transport},
};
use miette::Diagnostic;
use rand::Rng;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    net::Ipv6Addr,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read session file {}", path.display())]
    #[diagnostic(code(probe::config::io))]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("invalid session file: {message}")]
    #[diagnostic(code(probe::config::parse), help("check the TOML syntax and field types"))]
    Parse { message: String },
    #[error("`{value}` is not an IP address ({field})")]
    #[diagnostic(
        code(probe::config::address),
        help("use a dotted quad such as 192.0.2.1 or IPv6 text such as 2001:db8::1")
    )]
    InvalidAddress { field: &'static str, value: String },
    #[error("invalid port range")]
    #[diagnostic(
        code(probe::config::range),
        help("ranges look like `1-1024,8080,T:9000-9010,U:53`")
    )]
    PortRange(#[from] PortRangeError),
    #[error("`{value}` is not a port number ({field})")]
    #[diagnostic(code(probe::config::port), help("ports run from 0 to 65535"))]
    InvalidPort { field: &'static str, value: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub ports: PortsSection,
    #[serde(default)]
    pub transports: BTreeMap<String, i64>,
    #[serde(default)]
    pub sources: SourcesSection,
    #[serde(default)]
    pub script: ScriptSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    pub address: Option<String>,
    pub fqdn: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortsSection {
    #[serde(default)]
    pub tcp_scanned: bool,
    #[serde(default)]
    pub udp_scanned: bool,
    pub range: Option<String>,
    #[serde(default)]
    pub unscanned_closed: bool,
    #[serde(default)]
    pub tcp: Vec<i64>,
    #[serde(default)]
    pub udp: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesSection {
    #[serde(default)]
    pub v4: Vec<String>,
    #[serde(default)]
    pub v6: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSection {
    #[serde(default)]
    pub authenticated: bool,
    pub name: Option<String>,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|error| ConfigError::Parse {
            message: error.to_string(),
        })
    }

    /// Builds the session the orchestrator would hand to scripts, claiming
    /// one source address per family.
    pub fn into_session<R: Rng>(self, rng: &mut R) -> Result<SessionState, ConfigError> {
        let mut session = SessionState::new();
        if let Some(text) = &self.target.address {
            let target = address::parse_target(text).ok_or_else(|| ConfigError::InvalidAddress {
                field: "target.address",
                value: text.clone(),
            })?;
            session = session.with_target(target);
        }
        if let Some(fqdn) = self.target.fqdn {
            session = session.with_fqdn(fqdn);
        }

        let ports = self.ports;
        if ports.tcp_scanned {
            session.mark_scanned(Protocol::Tcp);
        }
        if ports.udp_scanned {
            session.mark_scanned(Protocol::Udp);
        }
        if let Some(range) = &ports.range {
            session.set_port_range(range.parse::<PortRange>()?);
        }
        session.set_unscanned_closed(ports.unscanned_closed);
        for port in &ports.tcp {
            session.set_open(Protocol::Tcp, checked_port("ports.tcp", *port)?);
        }
        for port in &ports.udp {
            session.set_open(Protocol::Udp, checked_port("ports.udp", *port)?);
        }

        for (port, code) in &self.transports {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort {
                    field: "transports",
                    value: port.clone(),
                })?;
            session.set_transport(port, Transport::from_code(*code));
        }

        for text in &self.sources.v4 {
            let source = address::parse_v4_literal(text).ok_or_else(|| {
                ConfigError::InvalidAddress {
                    field: "sources.v4",
                    value: text.clone(),
                }
            })?;
            session.add_source(address::to_mapped(source));
        }
        for text in &self.sources.v6 {
            let source = text
                .parse::<Ipv6Addr>()
                .ok()
                .filter(|addr| !address::is_v4_mapped(addr))
                .ok_or_else(|| ConfigError::InvalidAddress {
                    field: "sources.v6",
                    value: text.clone(),
                })?;
            session.add_source(source);
        }
        session.claim_sources(rng);
        Ok(session)
    }
}

fn checked_port(field: &'static str, port: i64) -> Result<u16, ConfigError> {
    u16::try_from(port).map_err(|_| ConfigError::InvalidPort {
        field,
        value: port.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::address::AddressFamily;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SAMPLE: &str = r#"
[target]
address = "192.0.2.10"
fqdn = "host.example"

[ports]
tcp_scanned = true
range = "1-1024"
tcp = [22, 443]
udp = [53]

[transports]
443 = 5

[sources]
v4 = ["192.0.2.1"]

[script]
authenticated = true
"#;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn sample_session_loads() {
        let config = SessionConfig::parse(SAMPLE).expect("config");
        assert!(config.script.authenticated);
        let session = config.into_session(&mut rng()).expect("session");
        assert_eq!(
            session.target().map(|t| address::to_text(&t)).as_deref(),
            Some("192.0.2.10")
        );
        assert_eq!(session.fqdn(), Some("host.example"));
        assert!(session.port_state(Protocol::Tcp, 22));
        assert!(!session.port_state(Protocol::Tcp, 23));
        assert!(session.port_state(Protocol::Udp, 9));
        assert_eq!(session.port_transport(443), Transport::Tls1);
        assert_eq!(
            address::to_text(&session.claimed_source(AddressFamily::V4)),
            "192.0.2.1"
        );
    }

    #[test]
    fn empty_file_is_an_empty_session() {
        let session = SessionConfig::parse("")
            .expect("config")
            .into_session(&mut rng())
            .expect("session");
        assert!(session.target().is_none());
    }

    #[test]
    fn bad_values_are_reported() {
        let bad_target = SessionConfig::parse("[target]\naddress = \"nope\"\n").expect("config");
        assert!(matches!(
            bad_target.into_session(&mut rng()),
            Err(ConfigError::InvalidAddress { field: "target.address", .. })
        ));

        let bad_port = SessionConfig::parse("[ports]\ntcp = [70000]\n").expect("config");
        assert!(matches!(
            bad_port.into_session(&mut rng()),
            Err(ConfigError::InvalidPort { .. })
        ));

        let bad_range = SessionConfig::parse("[ports]\nrange = \"9-1\"\n").expect("config");
        assert!(matches!(
            bad_range.into_session(&mut rng()),
            Err(ConfigError::PortRange(_))
        ));

        let mapped_v6 = SessionConfig::parse("[sources]\nv6 = [\"::ffff:10.0.0.1\"]\n")
            .expect("config");
        assert!(mapped_v6.into_session(&mut rng()).is_err());

        assert!(matches!(
            SessionConfig::parse("[target]\nport = 1\n"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
