//! State enumerations for UDP sockets.

/// State of a UDP socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UdpSocketState {
    /// Socket is not bound.
    #[default]
    Unbound,
    /// Socket is binding to an address.
    Binding,
    /// Socket is bound and receiving.
    Bound,
    /// Close was requested and the receive loop is winding down.
    Closing,
    /// Socket is closed.
    Closed,
}

impl UdpSocketState {
    /// Whether a receive loop is starting or running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Binding | Self::Bound)
    }
}

impl std::fmt::Display for UdpSocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UdpSocketState::Unbound => write!(f, "Unbound"),
            UdpSocketState::Binding => write!(f, "Binding"),
            UdpSocketState::Bound => write!(f, "Bound"),
            UdpSocketState::Closing => write!(f, "Closing"),
            UdpSocketState::Closed => write!(f, "Closed"),
        }
    }
}
