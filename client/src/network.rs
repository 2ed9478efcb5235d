//! Client-side networking: negotiation handshake, input/heartbeat sending
//! and non-blocking snapshot reception
//!
//! The client is a pure consumer of snapshots: it renders whatever state
//! it last received and never predicts or interpolates. The negotiation
//! exchange is the only request/response in the protocol, and the client
//! (not the server) owns the give-up timeout for it.

use bincode::{deserialize, serialize};
use log::{debug, info, warn};
use shared::{
    ControlMessage, NegotiationError, NegotiationRequest, NegotiationResponse, Packet,
    PauseAction, Role, Side, Snapshot,
};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

/// How long to wait for a negotiation response before retrying.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
/// Connect attempts before giving up on the server entirely.
const CONNECT_ATTEMPTS: u32 = 3;
/// Input is re-sent at least this often so the server's liveness monitor
/// keeps seeing us even when no key state changes.
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(250);

/// The role and slot the server granted us.
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    pub role: Role,
    pub side: Option<Side>,
}

pub struct Connection {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: String,
    session: SessionInfo,
    latest_snapshot: Option<Snapshot>,
    last_input: (bool, bool),
    last_traffic: Instant,
}

impl Connection {
    /// Performs the connect handshake: sends the negotiation request and
    /// waits (bounded) for the single response. A rejection or a silent
    /// server is fatal to this connection attempt only.
    pub fn connect(
        server: &str,
        client_id: String,
        role: Role,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server.parse()?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(RESPONSE_TIMEOUT))?;

        let request = Packet::Negotiation(NegotiationRequest::Connect {
            client_id: client_id.clone(),
            role,
        });
        let data = serialize(&request)?;
        let mut buffer = [0u8; 2048];

        for attempt in 1..=CONNECT_ATTEMPTS {
            socket.send_to(&data, server_addr)?;

            match Self::await_response(&socket, &mut buffer) {
                Ok(Some(response)) => {
                    return Self::from_response(socket, server_addr, client_id, response);
                }
                Ok(None) => {
                    warn!(
                        "No negotiation response (attempt {}/{})",
                        attempt, CONNECT_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err("server did not answer the connect request".into())
    }

    /// Blocks up to the response timeout for a negotiation reply,
    /// discarding any unrelated traffic that arrives first.
    fn await_response(
        socket: &UdpSocket,
        buffer: &mut [u8],
    ) -> std::io::Result<Option<NegotiationResponse>> {
        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        while Instant::now() < deadline {
            match socket.recv_from(buffer) {
                Ok((len, _)) => {
                    if let Ok(Packet::NegotiationReply(response)) = deserialize(&buffer[..len]) {
                        return Ok(Some(response));
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn from_response(
        socket: UdpSocket,
        server_addr: SocketAddr,
        client_id: String,
        response: NegotiationResponse,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        match response {
            NegotiationResponse::Accepted {
                role,
                player_id,
                reason,
                ..
            } => {
                let side = match player_id {
                    Some(1) => Some(Side::Left),
                    Some(2) => Some(Side::Right),
                    _ => None,
                };
                match side {
                    Some(s) => info!("Connected as player {}", s.player_number()),
                    None => info!("Connected as spectator"),
                }
                if reason.is_some() {
                    info!("Both player slots were taken; watching instead");
                }

                socket.set_nonblocking(true)?;
                Ok(Connection {
                    socket,
                    server_addr,
                    client_id,
                    session: SessionInfo { role, side },
                    latest_snapshot: None,
                    last_input: (false, false),
                    last_traffic: Instant::now(),
                })
            }
            NegotiationResponse::Error { reason, .. } => {
                let message = match reason {
                    NegotiationError::InvalidRequest => "server rejected request as invalid",
                };
                Err(message.into())
            }
        }
    }

    pub fn session(&self) -> SessionInfo {
        self.session
    }

    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.latest_snapshot.as_ref()
    }

    /// Drains every pending datagram, keeping only the newest snapshot.
    /// An empty socket is the normal steady state, not an error.
    pub fn poll(&mut self) {
        let mut buffer = [0u8; 2048];
        loop {
            match self.socket.recv_from(&mut buffer) {
                Ok((len, _)) => match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::Snapshot(snapshot)) => {
                        self.latest_snapshot = Some(snapshot);
                    }
                    Ok(_) => {}
                    Err(_) => debug!("Discarding undecodable datagram"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Error receiving snapshot: {}", e);
                    break;
                }
            }
        }
    }

    /// Sends held-key state when it changes, or periodically as a
    /// keep-alive. Spectators send heartbeats instead of input.
    pub fn send_input(&mut self, up: bool, down: bool) -> Result<(), Box<dyn std::error::Error>> {
        let due = self.last_traffic.elapsed() >= KEEPALIVE_INTERVAL;

        let Some(side) = self.session.side else {
            if due {
                self.send(&Packet::Control(ControlMessage::Heartbeat {
                    client_id: self.client_id.clone(),
                }))?;
                self.last_traffic = Instant::now();
            }
            return Ok(());
        };

        let changed = (up, down) != self.last_input;
        if changed || due {
            self.send(&Packet::Control(ControlMessage::Input {
                client_id: self.client_id.clone(),
                side,
                up,
                down,
            }))?;
            self.last_input = (up, down);
            self.last_traffic = Instant::now();
        }
        Ok(())
    }

    /// Requests a pause or resume. The server will ignore this unless we
    /// occupy a slot.
    pub fn send_pause(&mut self, action: PauseAction) -> Result<(), Box<dyn std::error::Error>> {
        self.send(&Packet::Control(ControlMessage::Pause {
            client_id: self.client_id.clone(),
            action,
        }))?;
        self.last_traffic = Instant::now();
        Ok(())
    }

    fn send(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr)?;
        Ok(())
    }
}
