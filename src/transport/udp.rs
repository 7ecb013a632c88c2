//! UDP transport for DNS queries.
//!
//! Each datagram is answered by its own task, so a slow upstream lookup
//! never holds up other clients.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::warn;

use crate::resolver::Resolver;

use super::{MAX_DNS_PACKET_SIZE, Protocol, QueryLogger, ServeOptions, answer_packet};

/// Largest response sent over UDP without EDNS.
const MAX_UDP_RESPONSE: usize = 512;

/// UDP transport for the resolver.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the UDP transport in a background task.
    pub fn start(self, resolver: Arc<Resolver>, options: ServeOptions) {
        tokio::spawn(run(self.socket, resolver, options));
    }
}

/// Receive loop: spawns a handler task per datagram.
async fn run(socket: Arc<UdpSocket>, resolver: Arc<Resolver>, options: ServeOptions) {
    let logger = Arc::new(QueryLogger::new(Protocol::Udp));
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!("UDP recv error: {}", e);
                continue;
            }
        };

        if len < 12 {
            continue;
        }
        if !options.permits(src) {
            logger.refused(src);
            continue;
        }

        let packet = buf[..len].to_vec();
        let socket = socket.clone();
        let resolver = resolver.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            let Some(response) =
                answer_packet(&resolver, &packet, options.query_timeout, &logger, src).await
            else {
                return;
            };
            let bytes = response.to_bytes_limited(MAX_UDP_RESPONSE);
            if let Err(e) = socket.send_to(&bytes, src).await {
                warn!("UDP response error: {}", e);
            }
        });
    }
}
