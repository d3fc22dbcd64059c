//! Integration events - facts about provider connection changes
//!
//! Emitted by the OAuth actions and the token-expiry checker after the row
//! is updated. The effect handler refreshes the cached status snapshot and
//! alerts the admins.

use crate::domains::integrations::models::{Integration, IntegrationProvider};

/// Integration domain events
#[derive(Debug, Clone)]
pub enum IntegrationEvent {
    /// Provider was (re)connected with fresh credentials
    Connected { integration: Integration },

    /// Provider was disconnected by an operator
    Disconnected { integration: Integration },

    /// Provider credentials expired and could not be refreshed
    TokenExpired { integration: Integration },
}

impl IntegrationEvent {
    pub fn integration(&self) -> &Integration {
        match self {
            IntegrationEvent::Connected { integration }
            | IntegrationEvent::Disconnected { integration }
            | IntegrationEvent::TokenExpired { integration } => integration,
        }
    }

    pub fn provider(&self) -> IntegrationProvider {
        self.integration().provider
    }

    /// Short human-readable description for the admin notification
    pub fn describe(&self) -> String {
        let name = &self.integration().name;
        match self {
            IntegrationEvent::Connected { .. } => format!("{} is connected.", name),
            IntegrationEvent::Disconnected { .. } => format!("{} was disconnected.", name),
            IntegrationEvent::TokenExpired { .. } => format!(
                "{} has an expired token and needs to be reconnected.",
                name
            ),
        }
    }
}
