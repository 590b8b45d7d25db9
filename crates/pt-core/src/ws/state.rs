//! Connection lifecycle state and the events published on transitions.

/// Lifecycle of a [`StreamConnection`](super::StreamConnection).
///
/// `Idle → Connecting → Open ⇄ Reconnecting`, and any state `→ Stopped`.
/// `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Notifications emitted by a connection for its owner.
///
/// `ReconnectExhausted` is the only event that signals an actionable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32 },
    Reconnected,
    ReconnectExhausted { attempts: u32 },
    Stopped,
}
