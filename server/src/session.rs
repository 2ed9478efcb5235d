//! Session registry and liveness monitoring for the Pong server
//!
//! This module owns the server-side view of every connected client:
//! - Identity (client-generated opaque id) and last-known network address
//! - Current role (player occupying a slot, or spectator)
//! - Last-seen timestamps and timeout eviction
//! - The two paddle slots and the slot assignment policy
//!
//! The registry is mutated only from inside the tick loop, so it carries
//! no synchronization of its own.

use log::info;
use shared::{Role, Side, SlotStatus};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected client as the server sees it.
#[derive(Debug)]
pub struct ClientSession {
    /// Opaque identifier chosen by the client.
    pub id: String,
    /// Player or spectator. Occupying a slot implies `Role::Player`.
    pub role: Role,
    /// Address the last packet from this client came from; snapshots are
    /// sent back to it.
    pub addr: SocketAddr,
    /// Last time any message arrived from this client.
    pub last_seen: Instant,
}

/// Occupancy of one paddle slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Open,
    /// Held by the session with this client id.
    Held(String),
    /// Reserved for a locally controlled paddle (the `--reserve` flag);
    /// never granted to a remote client and never evicted.
    Local,
}

/// Outcome of a player-seeking assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAssignment {
    /// A slot was granted (or re-confirmed for the current occupant).
    Slot(Side),
    /// Both slots were taken; the client was accepted as a spectator
    /// instead of being rejected.
    Downgraded,
}

/// A client removed by the liveness scan.
#[derive(Debug)]
pub struct Eviction {
    pub client_id: String,
    /// The side whose slot was freed, if the client held one. The caller
    /// must reset that side's input state so the paddle stops drifting.
    pub freed_side: Option<Side>,
}

/// Tracks sessions, the two player slots, and spectator membership.
///
/// Invariants held at every tick boundary: a client id occupies at most
/// one slot; slot occupants are never counted as spectators.
pub struct SessionRegistry {
    sessions: HashMap<String, ClientSession>,
    slots: [SlotState; 2],
    timeout: Duration,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(shared::LIVENESS_TIMEOUT_SECS))
    }

    /// Registry with a non-default liveness timeout, used by tests that
    /// cannot wait five real seconds.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            slots: [SlotState::Open, SlotState::Open],
            timeout,
        }
    }

    /// Marks one slot as locally controlled. Remote clients can never be
    /// assigned to it and it counts as occupied for the waiting check.
    pub fn reserve_local(&mut self, side: Side) {
        self.slots[side.index()] = SlotState::Local;
        info!("Slot {} reserved for local control", side.player_number());
    }

    /// Seats a player-seeking client: slot 1 if open, else slot 2, else
    /// the client becomes a spectator (downgrade, not rejection).
    ///
    /// A client already holding a slot is confirmed idempotently without
    /// reassignment. A current spectator follows the same slot-seeking
    /// policy as a fresh connect.
    pub fn assign_player(&mut self, client_id: &str, addr: SocketAddr) -> PlayerAssignment {
        if let Some(side) = self.side_of(client_id) {
            self.touch(client_id, addr);
            return PlayerAssignment::Slot(side);
        }

        for side in Side::BOTH {
            if self.slots[side.index()] == SlotState::Open {
                self.slots[side.index()] = SlotState::Held(client_id.to_string());
                self.upsert(client_id, addr, Role::Player);
                info!(
                    "Client {} assigned to player slot {}",
                    client_id,
                    side.player_number()
                );
                return PlayerAssignment::Slot(side);
            }
        }

        self.upsert(client_id, addr, Role::Spectator);
        info!("Client {} downgraded to spectator (players occupied)", client_id);
        PlayerAssignment::Downgraded
    }

    /// Makes the client a spectator. A held slot is freed immediately and
    /// unconditionally; the freed side (if any) is returned so the caller
    /// can reset its input state.
    pub fn assign_spectator(&mut self, client_id: &str, addr: SocketAddr) -> Option<Side> {
        let freed = self.release_slot(client_id);
        self.upsert(client_id, addr, Role::Spectator);
        freed
    }

    /// Frees whichever slot the client holds, if any.
    pub fn release_slot(&mut self, client_id: &str) -> Option<Side> {
        for side in Side::BOTH {
            if self.slots[side.index()] == SlotState::Held(client_id.to_string()) {
                self.slots[side.index()] = SlotState::Open;
                info!(
                    "Player slot {} freed by {}",
                    side.player_number(),
                    client_id
                );
                return Some(side);
            }
        }
        None
    }

    /// Refreshes the last-seen timestamp and address for a known client.
    pub fn touch(&mut self, client_id: &str, addr: SocketAddr) {
        if let Some(session) = self.sessions.get_mut(client_id) {
            session.last_seen = Instant::now();
            session.addr = addr;
        }
    }

    /// True if the given client currently holds the given slot.
    pub fn is_occupant(&self, client_id: &str, side: Side) -> bool {
        self.slots[side.index()] == SlotState::Held(client_id.to_string())
    }

    /// The slot this client holds, if any.
    pub fn side_of(&self, client_id: &str) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.is_occupant(client_id, *side))
    }

    pub fn is_known(&self, client_id: &str) -> bool {
        self.sessions.contains_key(client_id)
    }

    pub fn slot_status(&self, side: Side) -> SlotStatus {
        match self.slots[side.index()] {
            SlotState::Open => SlotStatus::Open,
            SlotState::Held(_) | SlotState::Local => SlotStatus::Connected,
        }
    }

    pub fn both_slots_occupied(&self) -> bool {
        Side::BOTH
            .into_iter()
            .all(|side| self.slots[side.index()] != SlotState::Open)
    }

    pub fn spectator_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Spectator)
            .count()
    }

    /// Addresses of every live session, for snapshot broadcasting.
    pub fn broadcast_addrs(&self) -> Vec<SocketAddr> {
        self.sessions.values().map(|s| s.addr).collect()
    }

    /// Evicts every client whose silence exceeds the liveness timeout.
    ///
    /// A held slot is freed entirely (the client is removed, not demoted
    /// to spectator). Eviction is silent: nothing is sent to the evicted
    /// client, it has presumably already gone away.
    pub fn check_timeouts(&mut self) -> Vec<Eviction> {
        let timeout = self.timeout;
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.last_seen.elapsed() > timeout)
            .map(|s| s.id.clone())
            .collect();

        let mut evictions = Vec::new();
        for client_id in expired {
            let freed_side = self.release_slot(&client_id);
            self.sessions.remove(&client_id);
            info!("Client {} timed out and was removed", client_id);
            evictions.push(Eviction {
                client_id,
                freed_side,
            });
        }
        evictions
    }

    /// Number of live sessions (players and spectators).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn upsert(&mut self, client_id: &str, addr: SocketAddr, role: Role) {
        self.sessions
            .entry(client_id.to_string())
            .and_modify(|s| {
                s.role = role;
                s.addr = addr;
                s.last_seen = Instant::now();
            })
            .or_insert_with(|| ClientSession {
                id: client_id.to_string(),
                role,
                addr,
                last_seen: Instant::now(),
            });
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
