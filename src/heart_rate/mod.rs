pub mod ble;
pub mod dummy;
pub mod measurement;
pub mod session;
pub mod window;

use chrono::Utc;

/// Identifies one connection session, so late messages from a finished one can be told apart.
pub type SessionId = u64;

/// A single heart rate reading, stamped when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateSample {
    timestamp: i64,
    bpm: u16,
}

impl HeartRateSample {
    pub fn new(timestamp: i64, bpm: u16) -> Self {
        Self { timestamp, bpm }
    }
    pub fn now(bpm: u16) -> Self {
        Self::new(Utc::now().timestamp_millis(), bpm)
    }
    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
    pub fn bpm(&self) -> u16 {
        self.bpm
    }
}

/// Messages sent by a session's notification task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Sample { session: SessionId, bpm: u16 },
    /// Sent exactly once per session, whatever ended it.
    Disconnected { session: SessionId },
}

impl MonitorEvent {
    pub fn session(&self) -> SessionId {
        match self {
            MonitorEvent::Sample { session, .. } | MonitorEvent::Disconnected { session } => {
                *session
            }
        }
    }
}
