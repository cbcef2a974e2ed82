use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fixed-delay reconnection policy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay between attempts in milliseconds
    pub delay_ms: u64,
    /// Attempts after a failure before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt is allowed after `attempt` failed ones
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Channel status plus the number of consecutive failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub attempt: u32,
}

impl ConnectionState {
    pub fn connected() -> Self {
        Self {
            status: ConnectionStatus::Connected,
            attempt: 0,
        }
    }

    pub fn reconnecting(attempt: u32) -> Self {
        Self {
            status: ConnectionStatus::Reconnecting,
            attempt,
        }
    }

    pub fn disconnected(attempt: u32) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            attempt,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected(0)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Reconnecting => write!(f, "Reconnecting (attempt {})", self.attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_backend_contract() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(), Duration::from_millis(1000));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn allows_up_to_max_attempts() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(0));
        assert!(policy.allows(4));
        assert!(!policy.allows(5));
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::connected().to_string(), "Connected");
        assert_eq!(
            ConnectionState::reconnecting(3).to_string(),
            "Reconnecting (attempt 3)"
        );
    }
}
