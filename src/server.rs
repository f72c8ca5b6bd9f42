//! Serving queries over UDP and TCP.
//!
//! Both transports hand every request to an [`Engine`] in a task of its
//! own. Requests on a TCP connection are answered one after another; each
//! message is preceded by its length as a 16 bit integer in network byte
//! order.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use domain::base::iana::Rcode;
use domain::base::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, trace, warn};

use crate::engine::Engine;
use crate::local::HostLookup;
use crate::recursive::Upstream;
use crate::wire::{self, MAX_UDP_RESPONSE};

/// The size of the receive buffer for UDP requests.
const UDP_BUF_SIZE: usize = 4096;

/// How long an idle TCP connection is kept open.
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to back off after failing to accept a connection.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

//------------ serve_udp -----------------------------------------------------

/// Answers queries arriving on a UDP socket.
///
/// Runs until the surrounding task is dropped.
pub async fn serve_udp<U, H>(socket: UdpSocket, engine: Arc<Engine<U, H>>)
where
    U: Upstream + 'static,
    H: HostLookup + 'static,
{
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; UDP_BUF_SIZE];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(res) => res,
            Err(err) => {
                warn!("Failed to receive UDP request: {err}");
                continue;
            }
        };
        let request = Bytes::copy_from_slice(&buf[..len]);
        let socket = socket.clone();
        let engine = engine.clone();
        tokio::spawn(async move {
            let Some(response) = answer(&engine, request, addr, true).await
            else {
                return;
            };
            if let Err(err) = socket.send_to(&response, addr).await {
                warn!(%addr, "Failed to send UDP response: {err}");
            }
        });
    }
}

//------------ serve_tcp -----------------------------------------------------

/// Answers queries arriving on connections to a TCP listener.
///
/// Runs until the surrounding task is dropped.
pub async fn serve_tcp<U, H>(listener: TcpListener, engine: Arc<Engine<U, H>>)
where
    U: Upstream + 'static,
    H: HostLookup + 'static,
{
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let engine = engine.clone();
                tokio::spawn(async move {
                    if let Err(err) = serve_connection(stream, addr, engine).await
                    {
                        debug!(%addr, "TCP connection closed: {err}");
                    }
                });
            }
            Err(err) => {
                warn!("Failed to accept TCP connection: {err}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn serve_connection<U, H>(
    mut stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<Engine<U, H>>,
) -> io::Result<()>
where
    U: Upstream,
    H: HostLookup,
{
    loop {
        let len = match tokio::time::timeout(
            TCP_IDLE_TIMEOUT,
            stream.read_u16(),
        )
        .await
        {
            Ok(Ok(len)) => len,
            Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(())
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                trace!(%addr, "Closing idle TCP connection");
                return Ok(());
            }
        };
        let mut buf = vec![0u8; usize::from(len)];
        stream.read_exact(&mut buf).await?;

        let Some(response) =
            answer(&engine, Bytes::from(buf), addr, false).await
        else {
            continue;
        };
        let len = u16::try_from(response.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "response too long")
        })?;
        stream.write_u16(len).await?;
        stream.write_all(&response).await?;
    }
}

//------------ answer --------------------------------------------------------

/// Produces the response message for a request message.
///
/// Returns `None` if the request is to be dropped without a response.
async fn answer<U, H>(
    engine: &Engine<U, H>,
    request: Bytes,
    client: SocketAddr,
    udp: bool,
) -> Option<Vec<u8>>
where
    U: Upstream,
    H: HostLookup,
{
    let msg = match Message::from_octets(request) {
        Ok(msg) => msg,
        Err(_) => {
            warn!(%client, "Dropping short message");
            return None;
        }
    };
    if msg.header().qr() {
        warn!(%client, "Dropping response message");
        return None;
    }

    let query = match wire::parse_query(&msg) {
        Ok(query) => query,
        Err(err) => {
            warn!(%client, "Malformed query: {err}");
            return wire::compose_error(&msg, Rcode::FORMERR).ok();
        }
    };

    let response = engine.handle(&query, Some(client)).await;
    let res = match wire::compose_response(
        &msg,
        &response,
        engine.recursion_available(),
    ) {
        Ok(res) => res,
        Err(err) => {
            warn!(%client, name = %query.name, "Cannot compose response: {err}");
            return wire::compose_error(&msg, Rcode::SERVFAIL).ok();
        }
    };
    if udp && res.len() > MAX_UDP_RESPONSE {
        return wire::compose_truncated(&msg).ok();
    }
    Some(res)
}

//============ Testing =======================================================
