//! # Message Catalog
//!
//! The minimum required message-type set from spec §6, plus the
//! idempotency flag each type declares. Grounded on
//! `shared-bus::events::EventTopic`'s per-event metadata table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    ValidationRequest,
    Challenge,
    ChallengeResponse,
    ValidationResult,
    DiscoveryReport,
    DiscoveryReportAck,
    ConfigProposal,
    ConfigApproval,
    ConfigRejection,
    ExecutionReport,
    PolicyUpdate,
    Heartbeat,
}

/// Whether retrying a call of this message type is safe (spec §4.3:
/// "retries are only safe for idempotent message types, which are marked
/// as such in the type registry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retriable(pub bool);

impl MessageType {
    /// Lowercase wire name, used for the `/message/<type>` HTTP path (spec §6).
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::ValidationRequest => "validation_request",
            Self::Challenge => "challenge",
            Self::ChallengeResponse => "challenge_response",
            Self::ValidationResult => "validation_result",
            Self::DiscoveryReport => "discovery_report",
            Self::DiscoveryReportAck => "discovery_report_ack",
            Self::ConfigProposal => "config_proposal",
            Self::ConfigApproval => "config_approval",
            Self::ConfigRejection => "config_rejection",
            Self::ExecutionReport => "execution_report",
            Self::PolicyUpdate => "policy_update",
            Self::Heartbeat => "heartbeat",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Some(match name {
            "validation_request" => Self::ValidationRequest,
            "challenge" => Self::Challenge,
            "challenge_response" => Self::ChallengeResponse,
            "validation_result" => Self::ValidationResult,
            "discovery_report" => Self::DiscoveryReport,
            "discovery_report_ack" => Self::DiscoveryReportAck,
            "config_proposal" => Self::ConfigProposal,
            "config_approval" => Self::ConfigApproval,
            "config_rejection" => Self::ConfigRejection,
            "execution_report" => Self::ExecutionReport,
            "policy_update" => Self::PolicyUpdate,
            "heartbeat" => Self::Heartbeat,
            _ => return None,
        })
    }

    /// Retry safety per spec §4.3. Requests that create state (proposals,
    /// challenge/response, validation requests) are not retry-safe because a
    /// duplicate delivery would be indistinguishable from a second logical
    /// request; acks, reports, and heartbeats are.
    pub fn idempotent(self) -> Retriable {
        Retriable(matches!(
            self,
            Self::DiscoveryReport
                | Self::DiscoveryReportAck
                | Self::ExecutionReport
                | Self::PolicyUpdate
                | Self::Heartbeat
                | Self::ValidationResult
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_round_trips() {
        for mt in [
            MessageType::ValidationRequest,
            MessageType::Challenge,
            MessageType::ChallengeResponse,
            MessageType::ValidationResult,
            MessageType::DiscoveryReport,
            MessageType::DiscoveryReportAck,
            MessageType::ConfigProposal,
            MessageType::ConfigApproval,
            MessageType::ConfigRejection,
            MessageType::ExecutionReport,
            MessageType::PolicyUpdate,
            MessageType::Heartbeat,
        ] {
            let name = mt.wire_name();
            assert_eq!(MessageType::from_wire_name(name), Some(mt));
        }
    }

    #[test]
    fn bootstrap_messages_are_not_retriable() {
        assert!(!MessageType::ValidationRequest.idempotent().0);
        assert!(!MessageType::ChallengeResponse.idempotent().0);
    }

    #[test]
    fn heartbeat_is_retriable() {
        assert!(MessageType::Heartbeat.idempotent().0);
    }
}
