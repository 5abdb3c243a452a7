//! Built-ins that report on the remote host: its name and address, port
//! states and transports, the scanner's own address, and host identity.

use crate::runtime::{
    address,
    environment::ExecutionContext,
    error::{RuntimeError, RuntimeResult},
    resolver::{resolve_specifier, MAX_HOSTNAME_LEN},
    session::Protocol,
    value::Value,
};
use std::net::{IpAddr, Ipv6Addr};
use tracing::debug;

/// Longest local host name `this_host_name` reports.
const LOCAL_NAME_MAX: usize = 255;

pub type HostBuiltin = fn(&ExecutionContext<'_>) -> RuntimeResult<Value>;

pub const BUILTIN_NAMES: &[&str] = &[
    "get_hostname",
    "get_host_ip",
    "get_host_open_port",
    "get_port_state",
    "get_port_state_udp",
    "get_port_transport",
    "get_port_transport_name",
    "is_local_host",
    "is_local_net",
    "this_host",
    "this_host_name",
    "same_host",
];

pub fn lookup(name: &str) -> Option<HostBuiltin> {
    let builtin: HostBuiltin = match name {
        "get_hostname" => get_hostname,
        "get_host_ip" => get_host_ip,
        "get_host_open_port" => get_host_open_port,
        "get_port_state" => get_port_state,
        "get_port_state_udp" => get_port_state_udp,
        "get_port_transport" => get_port_transport,
        "get_port_transport_name" => get_port_transport_name,
        "is_local_host" => is_local_host,
        "is_local_net" => is_local_net,
        "this_host" => this_host,
        "this_host_name" => this_host_name,
        "same_host" => same_host,
        _ => return None,
    };
    Some(builtin)
}

fn target_address(ctx: &ExecutionContext<'_>, builtin: &'static str) -> RuntimeResult<Ipv6Addr> {
    ctx.session_state()
        .target()
        .ok_or_else(|| RuntimeError::no_data(builtin, "target address"))
}

fn port_argument(ctx: &ExecutionContext<'_>, builtin: &'static str) -> RuntimeResult<u16> {
    let value = match ctx.positional(0) {
        None | Some(Value::Undefined) => return Err(RuntimeError::missing(builtin, "port")),
        Some(value) => value,
    };
    let port = value.as_int().ok_or_else(|| {
        RuntimeError::invalid(
            builtin,
            format!("port must be an integer, got {}", value.type_name()),
        )
    })?;
    if port < 0 {
        return Err(RuntimeError::invalid(builtin, format!("negative port {port}")));
    }
    u16::try_from(port)
        .map_err(|_| RuntimeError::invalid(builtin, format!("port {port} out of range")))
}

pub fn get_hostname(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    ctx.session_state()
        .fqdn()
        .map(Value::from)
        .ok_or_else(|| RuntimeError::no_data("get_hostname", "host name"))
}

pub fn get_host_ip(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let target = target_address(ctx, "get_host_ip")?;
    Ok(Value::from(address::to_text(&target)))
}

pub fn get_host_open_port(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    ctx.session_state()
        .ports()
        .pick_open_tcp(&mut rand::thread_rng())
        .map(|port| Value::integer(i64::from(port)))
        .ok_or_else(|| RuntimeError::no_data("get_host_open_port", "open port"))
}

pub fn get_port_state(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let port = port_argument(ctx, "get_port_state")?;
    Ok(Value::boolean(
        ctx.session_state().port_state(Protocol::Tcp, port),
    ))
}

pub fn get_port_state_udp(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let port = port_argument(ctx, "get_port_state_udp")?;
    Ok(Value::boolean(
        ctx.session_state().port_state(Protocol::Udp, port),
    ))
}

pub fn get_port_transport(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let port = port_argument(ctx, "get_port_transport")?;
    let transport = ctx.session_state().port_transport(port);
    if ctx.get_named_int("asstring", 0) != 0 {
        Ok(Value::from(transport.name()))
    } else {
        Ok(Value::integer(transport.code()))
    }
}

pub fn get_port_transport_name(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let port = port_argument(ctx, "get_port_transport_name")?;
    Ok(Value::from(ctx.session_state().port_transport(port).name()))
}

pub fn is_local_host(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let target = target_address(ctx, "is_local_host")?;
    Ok(Value::boolean(ctx.platform().is_local_host(&target)))
}

pub fn is_local_net(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let target = target_address(ctx, "is_local_net")?;
    Ok(Value::boolean(ctx.platform().is_local_net(&target)))
}

/// Source address the scanner uses towards the target. A rotated source
/// claimed for the session wins over the kernel route, which wins over
/// whatever the local host name resolves to.
pub fn this_host(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let target = target_address(ctx, "this_host")?;
    let family = address::family_of(&target);

    let claimed = ctx.session_state().claimed_source(family);
    if !address::is_any(&claimed) {
        return Ok(Value::data(address::to_text(&claimed)));
    }

    let platform = ctx.platform();
    let routed = if platform.is_local_host(&target) {
        Some(target)
    } else {
        platform.route_through(&target)
    };
    if let Some(source) = routed.filter(|source| !address::is_any(source)) {
        return Ok(Value::data(address::to_text(&source)));
    }

    let hostname = platform.local_hostname().map_err(|err| {
        debug!(%err, "cannot read local host name");
        RuntimeError::no_data("this_host", "source address")
    })?;
    let entry = platform.forward(&hostname).map_err(|err| {
        debug!(%err, "local host name does not resolve");
        RuntimeError::no_data("this_host", "source address")
    })?;
    let wanted_v4 = address::from_mapped(&target).is_some();
    let chosen = entry
        .addresses
        .iter()
        .find(|ip| matches!(ip, IpAddr::V4(_)) == wanted_v4)
        .or_else(|| entry.addresses.first())
        .ok_or_else(|| RuntimeError::no_data("this_host", "source address"))?;
    Ok(Value::data(address::to_text(&address::normalize(*chosen))))
}

pub fn this_host_name(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    let mut name = ctx.platform().local_hostname().map_err(|err| {
        debug!(%err, "cannot read local host name");
        RuntimeError::no_data("this_host_name", "local host name")
    })?;
    if name.len() > LOCAL_NAME_MAX {
        let mut cut = LOCAL_NAME_MAX;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    Ok(Value::data(name))
}

/// 1 when the two specifiers share an IPv4 address, or, with `cmp_hostname`,
/// a host name.
pub fn same_host(ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
    const NAME: &str = "same_host";
    ctx.require_authenticated(NAME)?;
    let cmp_hostname = ctx.get_named_int("cmp_hostname", 0) != 0;

    if ctx.positional_count() > 2 {
        return Err(RuntimeError::invalid(NAME, "expects exactly two hosts"));
    }
    let mut specifiers = Vec::with_capacity(2);
    for index in 0..2 {
        let raw = ctx
            .get_positional_string(index)
            .ok_or_else(|| RuntimeError::missing(NAME, format!("host #{}", index + 1)))?;
        if raw.len() > MAX_HOSTNAME_LEN {
            return Err(RuntimeError::invalid(NAME, "too long hostname"));
        }
        specifiers.push(raw);
    }

    let platform = ctx.platform();
    let first = resolve_specifier(platform, NAME, &specifiers[0], cmp_hostname)?;
    let second = resolve_specifier(platform, NAME, &specifiers[1], cmp_hostname)?;

    let matched = first.intersects(&second) || (cmp_hostname && first.shares_name(&second));
    debug!(
        first = %String::from_utf8_lossy(&specifiers[0]),
        second = %String::from_utf8_lossy(&specifiers[1]),
        cmp_hostname,
        matched,
        "same_host"
    );
    Ok(Value::boolean(matched))
}
