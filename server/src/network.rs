//! Server network layer and the tick-paced game loop driver
//!
//! Two small tasks move packets between the UDP socket and the tick loop;
//! every piece of game state (registry, world, phase) is owned by the loop
//! itself and touched only between ticks. Channel reads are non-blocking
//! drains, so a slow or silent client can never stall the simulation.

use crate::game::GameWorld;
use crate::negotiation;
use crate::session::SessionRegistry;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ControlMessage, Packet, PauseAction, Side, Snapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to the tick loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the tick loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// One snapshot for every live session. The address list travels with
    /// the message so the sender task never reads the registry.
    BroadcastPacket {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Game loop driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Simulation is not stepped; only connection traffic is serviced.
    Waiting,
    /// Both slots occupied at least once; physics advances every unpaused
    /// tick. A mid-game vacancy does not fall back to Waiting.
    Running,
    /// Shutdown observed; no further broadcasts.
    Terminal,
}

/// Main server coordinating networking and the authoritative simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: SessionRegistry,
    world: GameWorld,
    phase: Phase,
    tick_duration: Duration,
    rng: StdRng,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        reserved: Option<Side>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let mut registry = SessionRegistry::new();
        if let Some(side) = reserved {
            registry.reserve_local(side);
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            registry,
            world: GameWorld::new(),
            phase: Phase::Waiting,
            tick_duration,
            rng: StdRng::from_entropy(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to hand packet to tick loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, addrs } => {
                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Dispatches one incoming packet against the registry and the world.
    ///
    /// Control traffic is fire-and-forget: input or pause from a client
    /// that does not occupy the targeted slot is dropped without a reply
    /// (stale or impersonation attempt, not worth an error). Negotiation
    /// requests always produce exactly one response.
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Control(ControlMessage::Input {
                client_id,
                side,
                up,
                down,
            }) => {
                if self.registry.is_occupant(&client_id, side) {
                    self.registry.touch(&client_id, addr);
                    self.world.set_input(side, up, down);
                } else {
                    debug!(
                        "Dropping input for side {} from non-occupant {}",
                        side.player_number(),
                        client_id
                    );
                }
            }

            Packet::Control(ControlMessage::Heartbeat { client_id }) => {
                if self.registry.is_known(&client_id) {
                    self.registry.touch(&client_id, addr);
                }
            }

            Packet::Control(ControlMessage::Pause { client_id, action }) => {
                if self.registry.side_of(&client_id).is_some() {
                    self.registry.touch(&client_id, addr);
                    self.world.paused = action == PauseAction::Pause;
                    info!(
                        "Game {} by {}",
                        if self.world.paused { "paused" } else { "resumed" },
                        client_id
                    );
                } else {
                    debug!("Dropping pause request from non-player {}", client_id);
                }
            }

            Packet::Negotiation(request) => {
                let held_before = self.registry.side_of(request.client_id());
                let response = negotiation::handle_request(&mut self.registry, &request, addr);
                // A role change away from a slot leaves the paddle parked,
                // not drifting on the occupant's last held keys.
                if let Some(side) = held_before {
                    if !self.registry.is_occupant(request.client_id(), side) {
                        self.world.clear_input(side);
                    }
                }
                self.send_packet(Packet::NegotiationReply(response), addr);
            }

            Packet::NegotiationReply(_) | Packet::Snapshot(_) => {
                warn!("Unexpected server-bound packet type from {}", addr);
            }
        }
    }

    /// Drains every message available at the tick boundary. Returns false
    /// once a shutdown is observed.
    fn drain_messages(&mut self) -> bool {
        loop {
            match self.server_rx.try_recv() {
                Ok(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr);
                }
                Ok(ServerMessage::Shutdown) | Err(TryRecvError::Disconnected) => {
                    self.phase = Phase::Terminal;
                    return false;
                }
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    /// Runs the synchronous phases of one tick: liveness scan, phase
    /// transition, physics step, snapshot broadcast.
    fn tick_once(&mut self, dt: f32) {
        for eviction in self.registry.check_timeouts() {
            if let Some(side) = eviction.freed_side {
                // The slot is freed but the game keeps running; the
                // vacated paddle just stops responding to input.
                self.world.clear_input(side);
                info!(
                    "Player slot {} vacated by timeout of {}",
                    side.player_number(),
                    eviction.client_id
                );
            }
        }

        if self.phase == Phase::Waiting && self.registry.both_slots_occupied() {
            self.phase = Phase::Running;
            info!("Both player slots occupied, simulation starting");
        }

        if self.phase == Phase::Running && !self.world.paused {
            self.world.step(dt, &mut self.rng);

            if self.world.tick % 600 == 0 {
                debug!(
                    "Tick {}: {} sessions, {} spectators, score {} - {}",
                    self.world.tick,
                    self.registry.len(),
                    self.registry.spectator_count(),
                    self.world.scores[0],
                    self.world.scores[1]
                );
            }
        }

        self.broadcast_snapshot();
    }

    /// Broadcasts one snapshot describing the tick that just completed.
    fn broadcast_snapshot(&mut self) {
        let addrs = self.registry.broadcast_addrs();
        if addrs.is_empty() {
            return;
        }

        let players = [
            self.registry.slot_status(Side::Left),
            self.registry.slot_status(Side::Right),
        ];
        let spectator_count = self.registry.spectator_count() as u32;

        let snapshot = match self.phase {
            Phase::Waiting => Snapshot::Waiting {
                message: "Waiting for both players to connect".to_string(),
                players,
                spectator_count,
            },
            Phase::Running => Snapshot::State {
                tick: self.world.tick,
                ball: self.world.ball,
                paddles: self.world.paddles,
                scores: self.world.scores,
                paused: self.world.paused,
                players,
                spectator_count,
            },
            Phase::Terminal => return,
        };

        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: Packet::Snapshot(snapshot),
            addrs,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.tick_duration);
        // A long tick rolls straight into the next one; no burst catch-up.
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let dt = self.tick_duration.as_secs_f32();

        info!("Server started successfully");

        loop {
            tick_interval.tick().await;

            if !self.drain_messages() {
                break;
            }

            self.tick_once(dt);
        }

        info!("Server shut down, no further broadcasts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{NegotiationRequest, NegotiationResponse, Role};

    async fn test_server() -> Server {
        Server::new("127.0.0.1:0", Duration::from_millis(16), None)
            .await
            .expect("failed to bind test server")
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn connect_packet(id: &str, role: Role) -> Packet {
        Packet::Negotiation(NegotiationRequest::Connect {
            client_id: id.to_string(),
            role,
        })
    }

    fn input_packet(id: &str, side: Side, up: bool, down: bool) -> Packet {
        Packet::Control(ControlMessage::Input {
            client_id: id.to_string(),
            side,
            up,
            down,
        })
    }

    #[tokio::test]
    async fn test_negotiation_produces_one_reply() {
        let mut server = test_server().await;
        server.handle_packet(connect_packet("a", Role::Player), test_addr());

        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket { packet, addr }) => {
                assert_eq!(addr, test_addr());
                match packet {
                    Packet::NegotiationReply(NegotiationResponse::Accepted {
                        player_id, ..
                    }) => assert_eq!(player_id, Some(1)),
                    other => panic!("Unexpected reply: {:?}", other),
                }
            }
            other => panic!("Expected queued reply, got {:?}", other),
        }
        assert!(server.game_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unauthorized_input_is_dropped() {
        let mut server = test_server().await;
        server.handle_packet(connect_packet("a", Role::Player), test_addr());

        // "b" does not occupy slot 1; its input must not move paddle 1.
        server.handle_packet(input_packet("b", Side::Left, true, false), test_addr());
        assert!(!server.world.inputs[0].up);

        server.handle_packet(input_packet("a", Side::Left, true, false), test_addr());
        assert!(server.world.inputs[0].up);
    }

    #[tokio::test]
    async fn test_spectator_cannot_pause() {
        let mut server = test_server().await;
        server.handle_packet(connect_packet("a", Role::Player), test_addr());
        server.handle_packet(connect_packet("s", Role::Spectator), test_addr());

        server.handle_packet(
            Packet::Control(ControlMessage::Pause {
                client_id: "s".to_string(),
                action: PauseAction::Pause,
            }),
            test_addr(),
        );
        assert!(!server.world.paused);

        server.handle_packet(
            Packet::Control(ControlMessage::Pause {
                client_id: "a".to_string(),
                action: PauseAction::Pause,
            }),
            test_addr(),
        );
        assert!(server.world.paused);
    }

    #[tokio::test]
    async fn test_tick_does_not_advance_while_waiting() {
        let mut server = test_server().await;
        let dt = 1.0 / 60.0;

        server.tick_once(dt);
        server.handle_packet(connect_packet("a", Role::Player), test_addr());
        server.tick_once(dt);
        assert_eq!(server.phase, Phase::Waiting);
        assert_eq!(server.world.tick, 0);

        server.handle_packet(connect_packet("b", Role::Player), test_addr());
        server.tick_once(dt);
        assert_eq!(server.phase, Phase::Running);
        assert_eq!(server.world.tick, 1);
    }

    #[tokio::test]
    async fn test_pause_freezes_tick_counter() {
        let mut server = test_server().await;
        let dt = 1.0 / 60.0;
        server.handle_packet(connect_packet("a", Role::Player), test_addr());
        server.handle_packet(connect_packet("b", Role::Player), test_addr());
        server.tick_once(dt);
        assert_eq!(server.world.tick, 1);

        server.handle_packet(
            Packet::Control(ControlMessage::Pause {
                client_id: "a".to_string(),
                action: PauseAction::Pause,
            }),
            test_addr(),
        );
        server.tick_once(dt);
        server.tick_once(dt);
        assert_eq!(server.world.tick, 1);

        server.handle_packet(
            Packet::Control(ControlMessage::Pause {
                client_id: "a".to_string(),
                action: PauseAction::Resume,
            }),
            test_addr(),
        );
        server.tick_once(dt);
        assert_eq!(server.world.tick, 2);
    }

    #[tokio::test]
    async fn test_vacancy_does_not_revert_to_waiting() {
        let mut server = test_server().await;
        let dt = 1.0 / 60.0;
        server.handle_packet(connect_packet("a", Role::Player), test_addr());
        server.handle_packet(connect_packet("b", Role::Player), test_addr());
        server.tick_once(dt);
        assert_eq!(server.phase, Phase::Running);

        // "b" walks away from its slot; the game keeps simulating.
        server.handle_packet(
            Packet::Negotiation(NegotiationRequest::RoleUpdate {
                client_id: "b".to_string(),
                role: Role::Spectator,
            }),
            test_addr(),
        );
        server.tick_once(dt);
        assert_eq!(server.phase, Phase::Running);
        assert_eq!(server.world.tick, 2);
    }

    #[tokio::test]
    async fn test_shutdown_message_reaches_terminal() {
        let mut server = test_server().await;
        server.server_tx.send(ServerMessage::Shutdown).unwrap();
        assert!(!server.drain_messages());
        assert_eq!(server.phase, Phase::Terminal);
    }

    #[tokio::test]
    async fn test_waiting_snapshot_broadcast() {
        let mut server = test_server().await;
        server.handle_packet(connect_packet("a", Role::Player), test_addr());
        let _ = server.game_rx.try_recv(); // negotiation reply

        server.tick_once(1.0 / 60.0);
        match server.game_rx.try_recv() {
            Ok(GameMessage::BroadcastPacket { packet, addrs }) => {
                assert_eq!(addrs.len(), 1);
                match packet {
                    Packet::Snapshot(Snapshot::Waiting {
                        players,
                        spectator_count,
                        ..
                    }) => {
                        assert_eq!(players[0], shared::SlotStatus::Connected);
                        assert_eq!(players[1], shared::SlotStatus::Open);
                        assert_eq!(spectator_count, 0);
                    }
                    other => panic!("Expected waiting snapshot, got {:?}", other),
                }
            }
            other => panic!("Expected broadcast, got {:?}", other),
        }
    }
}
