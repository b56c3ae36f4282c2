//! LAN address discovery for the startup banner.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Remote address used for a local routing table lookup (no packets are sent).
const ROUTING_PROBE_ADDRESS: &str = "8.8.8.8:80";

/// Best-guess LAN IPv4 address of this host.
///
/// Binds a UDP socket and "connects" it to a public address; the OS picks
/// the outbound interface without sending anything, and the socket's local
/// address is that interface's. Falls back to loopback when routing fails
/// (machine offline), so the banner still prints a usable URL.
pub fn lan_ip() -> IpAddr {
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn probe() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(ROUTING_PROBE_ADDRESS).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(IpAddr::V4(ip)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lan_ip_is_never_unspecified() {
        // Offline machines fall back to loopback; either way the banner URL
        // points at a real address.
        assert!(!lan_ip().is_unspecified());
    }
}
