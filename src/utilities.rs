use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Best guess at this machine's primary IPv4 address, used to show what an
/// `Any` host binding is reachable on. Falls back to loopback when offline.
///
/// Connecting a UDP socket only selects a route; no packet is sent.
pub fn local_host() -> IpAddr {
    detect_local_host().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn detect_local_host() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 53)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_host_is_concrete() {
        let ip = local_host();
        assert!(!ip.is_unspecified());
        assert!(ip.is_ipv4());
    }
}
