/// Stream session state machine.
///
/// State transitions:
/// ```text
/// idle → open → streaming → completed
///   └──────┴────────┴──────────┴──→ closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Open,
    Streaming,
    Completed,
    Closed,
}

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the session currently accepts incoming bytes.
    pub fn accepts_data(&self) -> bool {
        matches!(self, Self::Open | Self::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_states_accept_data() {
        assert!(!StreamState::Idle.accepts_data());
        assert!(StreamState::Open.accepts_data());
        assert!(StreamState::Streaming.accepts_data());
        assert!(!StreamState::Completed.accepts_data());
        assert!(StreamState::Closed.is_terminal());
    }
}
