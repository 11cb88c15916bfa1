//! Static per-message-type transport selection (spec §5: "a policy table
//! maps each message type onto a preferred transport, with a documented
//! fallback"). Grounded on the routing table shape of
//! `qc-16-api-gateway::router::route_method`, collapsed from a dispatch
//! match into a data table since the policy here is static rather than
//! behavioral.

use pdsno_types::MessageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// In-process mpsc bus: same-host delivery, e.g. Local controller to a
    /// co-located worker.
    Bus,
    /// Point-to-point HTTP request/response between controller processes.
    Http,
    /// Topic-based pub/sub, used for one-to-many fan-out.
    PubSub,
}

/// Preferred transport for a message type, and the fallback to try if the
/// preferred transport reports a delivery failure.
pub fn preferred_transport(message_type: MessageType) -> (TransportKind, Option<TransportKind>) {
    use MessageType::*;
    match message_type {
        // Admission handshake: strictly point-to-point, request/response.
        ValidationRequest | Challenge | ChallengeResponse | ValidationResult => {
            (TransportKind::Http, None)
        }
        // Discovery reports fan out from Local to Regional; retriable, so a
        // PubSub publish with an HTTP fallback is acceptable.
        DiscoveryReport | DiscoveryReportAck => (TransportKind::PubSub, Some(TransportKind::Http)),
        // Approval pipeline: point-to-point between adjacent tiers.
        ConfigProposal | ConfigApproval | ConfigRejection | ExecutionReport => {
            (TransportKind::Http, None)
        }
        // Policy pushes are one-to-many from Global/Regional downward.
        PolicyUpdate => (TransportKind::PubSub, Some(TransportKind::Http)),
        // Heartbeats are cheap, frequent, and tolerate best-effort delivery.
        Heartbeat => (TransportKind::Bus, Some(TransportKind::Http)),
    }
}
