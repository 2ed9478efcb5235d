//! Connection negotiation: connect and role-change requests
//!
//! The negotiator is a pure dispatch over the session registry's slot
//! assignment policy. It runs inside the tick loop, produces exactly one
//! response per request, and never buffers: the negotiation channel is
//! strictly one-outstanding-per-client.

use crate::session::{PlayerAssignment, SessionRegistry};
use shared::{
    DowngradeReason, NegotiationError, NegotiationRequest, NegotiationResponse, Role,
};
use std::net::SocketAddr;

/// Applies one negotiation request against the registry.
///
/// Connect and role-change carry the same semantics: a player request
/// seeks a slot (downgrading to spectator when both are taken), a
/// spectator request always succeeds, and re-requesting a held role is
/// confirmed idempotently. A request with an empty client id is reported
/// back as invalid and leaves the registry untouched.
pub fn handle_request(
    registry: &mut SessionRegistry,
    request: &NegotiationRequest,
    addr: SocketAddr,
) -> NegotiationResponse {
    let client_id = request.client_id();
    if client_id.trim().is_empty() {
        return NegotiationResponse::Error {
            client_id: client_id.to_string(),
            reason: NegotiationError::InvalidRequest,
        };
    }

    match request.role() {
        Role::Player => match registry.assign_player(client_id, addr) {
            PlayerAssignment::Slot(side) => NegotiationResponse::Accepted {
                client_id: client_id.to_string(),
                role: Role::Player,
                player_id: Some(side.player_number()),
                reason: None,
            },
            PlayerAssignment::Downgraded => NegotiationResponse::Accepted {
                client_id: client_id.to_string(),
                role: Role::Spectator,
                player_id: None,
                reason: Some(DowngradeReason::PlayersOccupied),
            },
        },
        Role::Spectator => {
            registry.assign_spectator(client_id, addr);
            NegotiationResponse::Accepted {
                client_id: client_id.to_string(),
                role: Role::Spectator,
                player_id: None,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn connect(id: &str, role: Role) -> NegotiationRequest {
        NegotiationRequest::Connect {
            client_id: id.to_string(),
            role,
        }
    }

    #[test]
    fn test_connect_player_reports_player_id() {
        let mut registry = SessionRegistry::new();

        let response = handle_request(&mut registry, &connect("a", Role::Player), test_addr());
        match response {
            NegotiationResponse::Accepted {
                role, player_id, ..
            } => {
                assert_eq!(role, Role::Player);
                assert_eq!(player_id, Some(1));
            }
            _ => panic!("Expected acceptance"),
        }

        let response = handle_request(&mut registry, &connect("b", Role::Player), test_addr());
        match response {
            NegotiationResponse::Accepted { player_id, .. } => {
                assert_eq!(player_id, Some(2));
            }
            _ => panic!("Expected acceptance"),
        }
    }

    #[test]
    fn test_full_slots_downgrade_with_reason() {
        let mut registry = SessionRegistry::new();
        handle_request(&mut registry, &connect("a", Role::Player), test_addr());
        handle_request(&mut registry, &connect("b", Role::Player), test_addr());

        let response = handle_request(&mut registry, &connect("c", Role::Player), test_addr());
        match response {
            NegotiationResponse::Accepted {
                role,
                player_id,
                reason,
                ..
            } => {
                assert_eq!(role, Role::Spectator);
                assert_eq!(player_id, None);
                assert_eq!(reason, Some(DowngradeReason::PlayersOccupied));
            }
            _ => panic!("Expected spectator downgrade, not rejection"),
        }
    }

    #[test]
    fn test_connect_spectator_always_accepted() {
        let mut registry = SessionRegistry::new();
        let response = handle_request(&mut registry, &connect("s", Role::Spectator), test_addr());
        match response {
            NegotiationResponse::Accepted {
                role,
                player_id,
                reason,
                ..
            } => {
                assert_eq!(role, Role::Spectator);
                assert_eq!(player_id, None);
                assert_eq!(reason, None);
            }
            _ => panic!("Expected acceptance"),
        }
    }

    #[test]
    fn test_role_update_same_semantics_as_connect() {
        let mut registry = SessionRegistry::new();
        handle_request(&mut registry, &connect("a", Role::Player), test_addr());

        let request = NegotiationRequest::RoleUpdate {
            client_id: "a".to_string(),
            role: Role::Spectator,
        };
        let response = handle_request(&mut registry, &request, test_addr());
        match response {
            NegotiationResponse::Accepted { role, .. } => assert_eq!(role, Role::Spectator),
            _ => panic!("Expected acceptance"),
        }
        assert_eq!(registry.side_of("a"), None);
        assert_eq!(registry.spectator_count(), 1);
    }

    #[test]
    fn test_idempotent_renegotiation_keeps_player_id() {
        let mut registry = SessionRegistry::new();
        handle_request(&mut registry, &connect("a", Role::Player), test_addr());
        handle_request(&mut registry, &connect("b", Role::Player), test_addr());

        let request = NegotiationRequest::RoleUpdate {
            client_id: "b".to_string(),
            role: Role::Player,
        };
        let response = handle_request(&mut registry, &request, test_addr());
        match response {
            NegotiationResponse::Accepted { player_id, .. } => {
                assert_eq!(player_id, Some(2));
            }
            _ => panic!("Expected acceptance"),
        }
        assert_eq!(registry.spectator_count(), 0);
    }

    #[test]
    fn test_empty_client_id_is_invalid() {
        let mut registry = SessionRegistry::new();
        let response = handle_request(&mut registry, &connect("", Role::Player), test_addr());
        match response {
            NegotiationResponse::Error { reason, .. } => {
                assert_eq!(reason, NegotiationError::InvalidRequest);
            }
            _ => panic!("Expected invalid_request error"),
        }
        assert!(registry.is_empty());
    }
}
