// Transport contract and the UDP datagram transport.
//
// A transport moves already-framed CoAP messages. It knows nothing about
// tokens or blocks; request/response pairing is done by the client.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::coap::{Message, MessageType};
use crate::error::TransportError;

/// Longest wait between readiness pings.
const PING_INTERVAL: Duration = Duration::from_millis(500);
/// Larger than any CoAP-over-UDP datagram a device sends.
const MAX_DATAGRAM: usize = 1500;

/// Where the device is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Udp(SocketAddr),
    /// Point-to-point serial link. No built-in transport frames it.
    Serial { device: String, baud: u32 },
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Udp(addr) => write!(f, "udp://{addr}"),
            Self::Serial { device, baud } => write!(f, "serial://{device}@{baud}"),
        }
    }
}

pub trait Transport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Block until the device answers, or fail after `timeout`.
    fn wait_for_ready(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Send one framed message.
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError>;

    /// Next framed message from the device, or `Timeout` after `timeout`.
    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Send a framed FETCH and return the first message that comes back.
    /// The client starts every FETCH exchange here; framings that treat
    /// reads specially override it.
    fn send_query(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.send(request)?;
        self.receive(timeout)
    }

    /// Send a framed iPATCH and return the first message that comes back.
    /// The client sends each patch item through this hook.
    fn send_patch(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.send(request)?;
        self.receive(timeout)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        (**self).connect(endpoint)
    }

    fn wait_for_ready(&mut self, timeout: Duration) -> Result<(), TransportError> {
        (**self).wait_for_ready(timeout)
    }

    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).receive(timeout)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

// ---------------------------------------------------------------------------
// UDP
// ---------------------------------------------------------------------------

/// CoAP over UDP (RFC 7252, one message per datagram).
#[derive(Debug, Default)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    ping_id: u16,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::NotConnected)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

impl Transport for UdpTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let Endpoint::Udp(addr) = endpoint else {
            return Err(TransportError::UnsupportedEndpoint(endpoint.to_string()));
        };
        let local: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(addr)?;
        debug!("udp transport bound to {} for {addr}", socket.local_addr()?);
        self.socket = Some(socket);
        Ok(())
    }

    fn wait_for_ready(&mut self, timeout: Duration) -> Result<(), TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::ReadyTimeout(timeout));
            }
            self.ping_id = self.ping_id.wrapping_add(1);
            let ping = Message::ping(self.ping_id)
                .encode()
                .map_err(|e| TransportError::Mismatch(e.to_string()))?;
            self.send(&ping)?;

            let slot_end = (now + PING_INTERVAL).min(deadline);
            while let Some(left) = slot_end.checked_duration_since(Instant::now()) {
                if left.is_zero() {
                    break;
                }
                match self.receive(left) {
                    Ok(bytes) => match Message::decode(&bytes) {
                        Ok(m)
                            if m.message_id == self.ping_id
                                && matches!(
                                    m.mtype,
                                    MessageType::Reset | MessageType::Acknowledgement
                                ) =>
                        {
                            debug!("device answered ping {}", self.ping_id);
                            return Ok(());
                        }
                        _ => trace!("ignoring non-pong datagram while waiting for ready"),
                    },
                    Err(TransportError::Timeout(_)) => break,
                    // ICMP port unreachable while the device boots.
                    Err(TransportError::Io(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                        std::thread::sleep(left.min(PING_INTERVAL));
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket()?.send(message)?;
        trace!("udp sent {sent} bytes");
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let socket = self.socket()?;
        // A zero read timeout means "block forever" to the OS.
        socket.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match socket.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                trace!("udp received {n} bytes");
                Ok(buf)
            }
            Err(e) if is_timeout(&e) => Err(TransportError::Timeout(timeout)),
            Err(e) => Err(e.into()),
        }
    }

    fn disconnect(&mut self) {
        self.socket = None;
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}
