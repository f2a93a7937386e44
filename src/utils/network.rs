//! Network utilities
//!
//! Provides address helpers shared by the control and data connections.

use std::net::{IpAddr, Ipv4Addr};

/// Returns the IPv4 form of an address, unmapping `::ffff:a.b.c.d`.
///
/// Addresses with no IPv4 form become `0.0.0.0`, which FTP clients read as
/// "use the control connection's peer".
pub fn ipv4_of(ip: IpAddr) -> Ipv4Addr {
    match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_ipv4_passthrough() {
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7));
        assert_eq!(ipv4_of(ip), Ipv4Addr::new(192, 168, 1, 7));
    }

    #[test]
    fn test_mapped_ipv6_is_unmapped() {
        let ip = IpAddr::V6(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());
        assert_eq!(ipv4_of(ip), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn test_plain_ipv6_becomes_unspecified() {
        assert_eq!(ipv4_of(IpAddr::V6(Ipv6Addr::LOCALHOST)), Ipv4Addr::UNSPECIFIED);
    }
}
