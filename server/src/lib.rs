//! # Pong Server Library
//!
//! This library provides the authoritative server implementation for the
//! networked two-player Pong game. The server simulates ball and paddle
//! physics at a fixed tick rate, reconciles connection and role-change
//! traffic against the player slots, and broadcasts one state snapshot per
//! tick. Clients render whatever they last received; the server's view is
//! the sole truth.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Tick Loop
//! All shared state (sessions, slots, input state, the game world) is
//! touched exclusively inside the synchronous phases of one tick loop.
//! Network tasks only move packets into and out of channels; they never
//! read or mutate game state. This eliminates data races by construction
//! and keeps the simulation free of locks.
//!
//! ### Tick Phases
//! Each tick: drain all pending control and negotiation messages, run the
//! liveness scan, step physics (unless waiting for players or paused),
//! then broadcast a snapshot. Clients therefore always see a snapshot
//! reflecting every message that arrived before the tick boundary, never a
//! partial update.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The session registry and liveness monitor: per-client identity, role,
//! last-seen tracking, the two player slots, spectator accounting, and
//! timeout eviction.
//!
//! ### Negotiation Module (`negotiation`)
//! Turns connect and role-change requests into accept/reject responses by
//! applying the registry's slot assignment policy. Exactly one response
//! per request.
//!
//! ### Game Module (`game`)
//! The owned game world: ball, paddles, scores, per-side input state,
//! pause flag and tick counter, advanced by the pure physics step from the
//! `shared` crate.
//!
//! ### Network Module (`network`)
//! UDP plumbing and the game loop driver that composes the other modules
//! each tick.

pub mod game;
pub mod negotiation;
pub mod network;
pub mod session;
