//! Echo requests from an unprivileged ICMP datagram socket.
//!
//! On Linux the socket needs the caller's group inside
//! `net.ipv4.ping_group_range`. The kernel owns the identifier field and
//! strips the IP header from replies; BSD-style stacks keep the header, so
//! replies are accepted either way.

use super::{PingProvider, PingRequest};
use crate::error::{BenchError, Result};
use crate::metrics::PingResponse;
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const ICMP_ECHO_REQUEST: u8 = 8;
const ICMP_ECHO_REPLY: u8 = 0;
const ICMP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct NativePing {
    interval: Duration,
    reply_timeout: Duration,
}

impl NativePing {
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(1),
            reply_timeout: Duration::from_secs(1),
        }
    }
}

impl Default for NativePing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PingProvider for NativePing {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn ping(&self, request: &PingRequest) -> Result<PingResponse> {
        let request = request.clone();
        let provider = self.clone();
        tokio::task::spawn_blocking(move || provider.run_blocking(&request))
            .await
            .map_err(|e| BenchError::Runtime(format!("ping task failed: {}", e)))?
    }
}

impl NativePing {
    fn run_blocking(&self, request: &PingRequest) -> Result<PingResponse> {
        let ping_error = |detail: String| BenchError::Ping {
            host: request.host.clone(),
            detail,
        };

        let target = resolve(&request.host).map_err(ping_error)?;
        let socket = open_socket().map_err(ping_error)?;
        debug!("Pinging {} ({}) from an ICMP socket", request.host, target.ip());

        let mut buffer = vec![0u8; request.size_in_bytes + ICMP_HEADER_LEN + 64];
        let mut received = 0u64;
        let mut total_ms = 0.0;

        for seq in 0..request.times {
            let started = Instant::now();
            let packet = echo_request(seq as u16, request.size_in_bytes);
            socket
                .send_to(&packet, target)
                .map_err(|e| ping_error(format!("can't send echo request: {}", e)))?;

            match self
                .wait_reply(&socket, &mut buffer, seq as u16, started)
                .map_err(ping_error)?
            {
                Some(rtt) => {
                    let ms = rtt.as_secs_f64() * 1000.0;
                    trace!("Reply seq={} time={:.3} ms", seq, ms);
                    received += 1;
                    total_ms += ms;
                }
                None => debug!("No reply for seq={}", seq),
            }

            if seq + 1 < request.times {
                std::thread::sleep(self.interval.saturating_sub(started.elapsed()));
            }
        }

        Ok(PingResponse::from_counts(request.times, received, total_ms))
    }

    fn wait_reply(
        &self,
        socket: &UdpSocket,
        buffer: &mut [u8],
        seq: u16,
        started: Instant,
    ) -> std::result::Result<Option<Duration>, String> {
        loop {
            let remaining = self.reply_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Ok(None);
            }
            socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| e.to_string())?;
            match socket.recv_from(buffer) {
                Ok((n, _)) => {
                    if parse_reply(&buffer[..n]) == Some(seq) {
                        return Ok(Some(started.elapsed()));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(format!("can't receive echo reply: {}", e)),
            }
        }
    }
}

fn resolve(host: &str) -> std::result::Result<SocketAddr, String> {
    (host, 0)
        .to_socket_addrs()
        .map_err(|e| format!("can't resolve: {}", e))?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| "no IPv4 address".to_string())
}

fn open_socket() -> std::result::Result<UdpSocket, String> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4)).map_err(|e| {
        if e.kind() == ErrorKind::PermissionDenied {
            format!(
                "can't open an ICMP socket ({}); check net.ipv4.ping_group_range \
                 or use --ping-provider system",
                e
            )
        } else {
            format!("can't open an ICMP socket: {}", e)
        }
    })?;
    Ok(UdpSocket::from(socket))
}

/// Build an echo request carrying `size` payload bytes.
pub fn echo_request(seq: u16, size: usize) -> Vec<u8> {
    let mut packet = Vec::with_capacity(ICMP_HEADER_LEN + size);
    packet.extend_from_slice(&[ICMP_ECHO_REQUEST, 0, 0, 0]);
    packet.extend_from_slice(&(std::process::id() as u16).to_be_bytes());
    packet.extend_from_slice(&seq.to_be_bytes());
    packet.extend((0..size).map(|i| i as u8));

    let sum = checksum(&packet);
    packet[2..4].copy_from_slice(&sum.to_be_bytes());
    packet
}

/// Internet checksum (RFC 1071).
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
            [hi] => u32::from(*hi) << 8,
            _ => 0,
        })
        .sum();
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Sequence number of an echo reply, with or without a leading IPv4 header.
fn parse_reply(data: &[u8]) -> Option<u16> {
    let icmp = match data.first() {
        Some(first) if first >> 4 == 4 => data.get(usize::from(first & 0x0f) * 4..)?,
        _ => data,
    };
    if icmp.len() < ICMP_HEADER_LEN || icmp[0] != ICMP_ECHO_REPLY {
        return None;
    }
    Some(u16::from_be_bytes([icmp[6], icmp[7]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_rfc1071_example() {
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), 0x220d);
    }

    #[test]
    fn test_echo_request_layout() {
        let packet = echo_request(0x0102, 56);
        assert_eq!(packet.len(), ICMP_HEADER_LEN + 56);
        assert_eq!(packet[0], ICMP_ECHO_REQUEST);
        assert_eq!(packet[1], 0);
        assert_eq!(&packet[6..8], &[0x01, 0x02]);
        // A packet carrying its own checksum sums to zero.
        assert_eq!(checksum(&packet), 0);
    }

    #[test]
    fn test_odd_payload_checksum() {
        let packet = echo_request(7, 3);
        assert_eq!(checksum(&packet), 0);
    }

    #[test]
    fn test_parse_reply_with_and_without_ip_header() {
        let mut reply = echo_request(42, 8);
        reply[0] = ICMP_ECHO_REPLY;
        assert_eq!(parse_reply(&reply), Some(42));

        let mut with_ip = vec![0x45];
        with_ip.extend_from_slice(&[0u8; 19]);
        with_ip.extend_from_slice(&reply);
        assert_eq!(parse_reply(&with_ip), Some(42));
    }

    #[test]
    fn test_parse_reply_ignores_other_messages() {
        assert_eq!(parse_reply(&echo_request(1, 8)), None);
        assert_eq!(parse_reply(&[0, 0, 0]), None);
        assert_eq!(parse_reply(&[]), None);
    }
}
