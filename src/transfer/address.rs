//! Address tuple codec for PASV replies and PORT commands.
//!
//! The wire form is six comma separated decimal bytes `h1,h2,h3,h4,p1,p2`
//! meaning `h1.h2.h3.h4:(p1*256+p2)`.

use std::net::{Ipv4Addr, SocketAddrV4};

/// Parses `h1,h2,h3,h4,p1,p2`. Exactly six fields in `0..=255` are required.
pub fn parse_address_tuple(text: &str) -> Option<SocketAddrV4> {
    let mut bytes = [0u8; 6];
    let mut count = 0;
    for field in text.trim().split(',') {
        if count == bytes.len() {
            return None;
        }
        bytes[count] = field.trim().parse().ok()?;
        count += 1;
    }
    if count != bytes.len() {
        return None;
    }

    let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = u16::from(bytes[4]) * 256 + u16::from(bytes[5]);
    Some(SocketAddrV4::new(ip, port))
}

/// Renders an address in tuple form, e.g. `192,168,1,2,195,89`.
pub fn format_address_tuple(addr: SocketAddrV4) -> String {
    let [a, b, c, d] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", a, b, c, d, port >> 8, port & 0xff)
}
