//! # Domain Layer
//!
//! Pure value types shared by every provider: time representations, the
//! socket vocabulary, the uniform error taxonomy, and the compose-time
//! platform configuration. Nothing in this module touches the OS.

pub mod config;
pub mod errors;
pub mod socket;
pub mod timestamp;

pub use config::{IpMode, PalConfig, ThreadingTier};
pub use errors::SocketError;
pub use socket::{
    AddressFamily, Interest, MsgFlags, NameFlags, PollEntry, PollTimeout, Protocol, Readiness,
    RecvMsg, ShutdownMode, SocketHandle, SocketKind, SocketOption,
};
pub use timestamp::{
    Timestamp, UtcOffset, EPOCH_OFFSET_SECONDS, EPOCH_OFFSET_TICKS, TICKS_PER_MICROSECOND,
    TICKS_PER_MILLISECOND, TICKS_PER_SECOND,
};
