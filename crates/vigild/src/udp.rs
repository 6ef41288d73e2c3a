//! UDP telemetry sink. One datagram per message, fire-and-forget.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{Context, Result};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};

use vigil_core::sink::{SinkError, TelemetrySink};

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;

pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    /// Non-blocking socket aimed at `host:port`. Broadcast targets are allowed.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let target = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("resolve {}:{}", host, port))?
            .next()
            .with_context(|| format!("no address for {}:{}", host, port))?;

        let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP))
            .context("socket()")?;
        socket.set_nonblocking(true).context("set_nonblocking")?;
        if target.is_ipv4() {
            socket.set_broadcast(true).context("SO_BROADCAST")?;
        }
        let bind: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };
        socket.bind(&bind.into()).context("bind()")?;

        tracing::info!(%target, "udp sink ready");
        Ok(Self {
            socket: socket.into(),
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl TelemetrySink for UdpSink {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn deliver(&self, datagram: &Bytes) -> Result<(), SinkError> {
        if datagram.len() > MAX_DATAGRAM {
            return Err(SinkError::Oversized {
                len: datagram.len(),
                max: MAX_DATAGRAM,
            });
        }
        // WouldBlock is a drop like any other error. No retry.
        self.socket.send_to(datagram, self.target)?;
        Ok(())
    }
}
