//! Channel lifecycle state.

/// Lifecycle of one bridge channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Created, inbound handler not yet registered.
    #[default]
    Idle,

    /// Inbound handler registered and readiness announced.
    Listening,

    /// At least one envelope has arrived; serving.
    Active,

    /// Torn down; all pending calls rejected.
    Closed,
}

impl ChannelState {
    /// Returns true if the channel is serving traffic.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true if the channel can still carry envelopes.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Listening | Self::Active)
    }

    /// Returns true if the channel has been torn down.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Listening => "Listening",
            Self::Active => "Active",
            Self::Closed => "Closed",
        }
    }
}
