//! TCP transport for DNS queries.
//!
//! Each client connection is handled independently and may carry several
//! queries in a row. TCP DNS messages are prefixed with a 2-byte length.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::warn;

use crate::resolver::Resolver;

use super::{Protocol, QueryLogger, ServeOptions, answer_packet};

/// How long a connection may sit between queries before it is closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP transport for the resolver.
///
/// Binds to a local address and accepts connections from clients.
/// Each connection is handled in a separate task.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind a TCP listener for the transport.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start the TCP transport.
    ///
    /// Spawns an accept loop that handles each connection in a separate task.
    pub fn start(self, resolver: Arc<Resolver>, options: ServeOptions) {
        tokio::spawn(run_accept_loop(self.listener, resolver, options));
    }
}

/// Accept loop - spawns a handler task for each incoming connection.
async fn run_accept_loop(listener: TcpListener, resolver: Arc<Resolver>, options: ServeOptions) {
    let logger = Arc::new(QueryLogger::new(Protocol::Tcp));
    loop {
        match listener.accept().await {
            Ok((client, src)) => {
                if !options.permits(src) {
                    logger.refused(src);
                    continue;
                }
                tokio::spawn(handle_connection(
                    client,
                    src,
                    resolver.clone(),
                    options,
                    logger.clone(),
                ));
            }
            Err(e) => {
                warn!("TCP accept error: {}", e);
            }
        }
    }
}

/// Answer queries on one connection until the client closes it, goes idle
/// or sends something that is not a query.
async fn handle_connection(
    mut client: TcpStream,
    src: SocketAddr,
    resolver: Arc<Resolver>,
    options: ServeOptions,
    logger: Arc<QueryLogger>,
) {
    while let Some(query) = next_query(&mut client, IDLE_TIMEOUT).await {
        let Some(response) =
            answer_packet(&resolver, &query, options.query_timeout, &logger, src).await
        else {
            return;
        };

        let bytes = response.to_bytes_limited(u16::MAX as usize);
        let mut framed = Vec::with_capacity(bytes.len() + 2);
        framed.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        framed.extend_from_slice(&bytes);
        if client.write_all(&framed).await.is_err() {
            return;
        }
    }
}

/// Read the next message, giving up after `idle` without one.
async fn next_query<R: AsyncRead + Unpin>(stream: &mut R, idle: Duration) -> Option<Vec<u8>> {
    tokio::time::timeout(idle, read_dns_message(stream))
        .await
        .ok()
        .flatten()
}

/// Read one length-prefixed DNS message, without its prefix.
///
/// Returns `None` on EOF, read errors and zero-length messages.
async fn read_dns_message<R: AsyncRead + Unpin>(stream: &mut R) -> Option<Vec<u8>> {
    let msg_len = stream.read_u16().await.ok()? as usize;
    if msg_len == 0 {
        return None;
    }
    let mut buf = vec![0u8; msg_len];
    stream.read_exact(&mut buf).await.ok()?;
    Some(buf)
}
