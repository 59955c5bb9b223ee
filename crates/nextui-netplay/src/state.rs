pub use nextui_netproto::Role;

/// Netplay session state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No listener and no outbound connection.
    #[default]
    Idle,
    /// Listening for clients. Stays here while clients come and go.
    Hosting,
    /// Outbound connect or handshake in progress.
    Connecting,
    /// Handshake complete, exchanging packets with the host.
    Connected,
    /// The last connect attempt failed. Cleared by `disconnect` or `stop_hosting`.
    Error,
}
