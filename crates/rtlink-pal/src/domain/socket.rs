//! Socket-facing value types.
//!
//! A socket handle moves through `CLOSED -> OPEN -> BOUND/CONNECTING ->
//! CONNECTED/LISTENING -> CLOSED`; the PAL does not shadow that state
//! machine, it only hands out the opaque handle and classifies outcomes.
//! Handles are single-owner: concurrent use from multiple threads without
//! external synchronization is undefined.

use std::time::Duration;

/// Native descriptor representation shared by every backend.
pub type RawSocket = i32;

/// Opaque socket descriptor.
///
/// [`SocketHandle::INVALID`] is a distinguished sentinel distinct from every
/// valid handle. A handle is owned by the connection object that opened it
/// and must be closed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(RawSocket);

impl SocketHandle {
    /// The invalid-handle sentinel.
    pub const INVALID: SocketHandle = SocketHandle(-1);

    /// Wrap a raw descriptor.
    #[inline]
    #[must_use]
    pub const fn from_raw(fd: RawSocket) -> Self {
        Self(fd)
    }

    /// The raw descriptor value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> RawSocket {
        self.0
    }

    /// Whether this handle is distinct from the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for SocketHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Address family for socket creation.
///
/// Only IPv4 is supported in this variant; requesting IPv6 is reported as a
/// fatal address-family mismatch rather than silently downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4.
    Ipv4,
    /// IPv6 (unsupported in this variant).
    Ipv6,
}

/// Socket communication style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Connection-oriented byte stream (TCP).
    Stream,
    /// Connectionless datagrams (UDP).
    Datagram,
}

/// Transport protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Let the OS pick the default protocol for the socket kind.
    #[default]
    Default,
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

/// Uniform socket options.
///
/// Insulates callers from native option-level and option-name constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// Allow rebinding a recently used local address (`SO_REUSEADDR`).
    ReuseAddress(bool),
    /// Disable Nagle's algorithm (`TCP_NODELAY`).
    NoDelay(bool),
    /// Enable keep-alive probes (`SO_KEEPALIVE`).
    KeepAlive(bool),
    /// Switch the handle between blocking and non-blocking mode.
    NonBlocking(bool),
}

/// Direction selector for shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// No further receives.
    Read,
    /// No further sends.
    Write,
    /// Neither direction.
    Both,
}

/// Per-message transfer flags for send/receive operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgFlags {
    /// Return data without consuming it from the receive queue.
    pub peek: bool,
    /// Force non-blocking behaviour for this single call.
    pub dont_wait: bool,
}

/// Readiness interest registered with the multiplexing primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    /// Wake when a read would not block.
    pub readable: bool,
    /// Wake when a write would not block.
    pub writable: bool,
}

impl Interest {
    /// Read-only interest.
    pub const READABLE: Interest = Interest {
        readable: true,
        writable: false,
    };
    /// Write-only interest.
    pub const WRITABLE: Interest = Interest {
        readable: false,
        writable: true,
    };
}

/// Readiness reported back for one handle.
///
/// Error and hang-up conditions are always reported, regardless of the
/// registered interest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// A read would not block.
    pub readable: bool,
    /// A write would not block.
    pub writable: bool,
    /// An error condition is pending; query the error-description path.
    pub error: bool,
    /// The peer hung up.
    pub hang_up: bool,
}

impl Readiness {
    /// Whether any condition fired.
    #[must_use]
    pub const fn any(self) -> bool {
        self.readable || self.writable || self.error || self.hang_up
    }
}

/// One handle's slot in a multiplexed wait.
#[derive(Debug, Clone, Copy)]
pub struct PollEntry {
    /// Handle to wait on.
    pub handle: SocketHandle,
    /// Conditions to wait for.
    pub interest: Interest,
    /// Conditions observed; overwritten by every poll call.
    pub readiness: Readiness,
}

impl PollEntry {
    /// New slot with cleared readiness.
    #[must_use]
    pub const fn new(handle: SocketHandle, interest: Interest) -> Self {
        Self {
            handle,
            interest,
            readiness: Readiness {
                readable: false,
                writable: false,
                error: false,
                hang_up: false,
            },
        }
    }
}

/// Timeout for the multiplexing primitive.
///
/// There is no separate cancellation token: a caller wanting to abort a
/// blocking wait relies on the timeout, or closes the handle from another
/// thread. The latter is best-effort only; whether an in-progress wait
/// observes the close is backend-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTimeout {
    /// Report current readiness without blocking.
    Immediate,
    /// Wait at most this long.
    Bounded(Duration),
    /// Wait until a registered condition fires.
    Infinite,
}

/// Result of a receive-with-ancillary-data call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecvMsg {
    /// Payload bytes written into the caller's buffer.
    pub bytes: usize,
    /// Ancillary bytes written into the control buffer.
    pub control_bytes: usize,
    /// Datagram source, when the protocol reports one.
    pub source: Option<std::net::SocketAddrV4>,
    /// The payload was truncated to fit the buffer.
    pub truncated: bool,
}

/// Flag set for reverse name resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameFlags {
    /// Return the numeric host instead of a resolved name.
    pub numeric_host: bool,
    /// Return the numeric port instead of a service name.
    pub numeric_service: bool,
}
