//! # RTLink Platform Abstraction Layer
//!
//! Lets the RTLink protocol stack run unmodified across heterogeneous OS
//! backends by exposing one stable set of primitives for three domains:
//! network sockets, mutual-exclusion locking, and time.
//!
//! The value is not any single wrapped call but the uniform contract kept
//! regardless of backend:
//!
//! - **Error classification** - every native error number is translated
//!   exactly once into the closed [`SocketError`] taxonomy; transient
//!   conditions are reported, never retried internally.
//! - **Monotonic time** - [`ClockProvider::now_monotonic`] is non-decreasing
//!   within a process, whatever the backend clock does.
//! - **Reentrant locking** - [`ReentrantLock`] allows the stack's nested
//!   call graph to re-enter a held lock, with depth accounting that turns
//!   lock-discipline bugs into hard faults instead of silent corruption.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - **Domain Layer:** pure value types (timestamps, handles, error taxonomy)
//! - **Ports Layer:** capability traits the stack depends on
//! - **Adapters Layer:** one backend implementation per supported OS
//! - **Service Layer:** composes the backend once, at process start
//!
//! ## Example
//!
//! ```rust
//! use rtlink_pal::{Pal, PalConfig, ThreadingTier};
//! use rtlink_pal::ports::ClockProvider;
//!
//! let pal = Pal::posix(PalConfig::new(ThreadingTier::LockEnabled));
//!
//! let a = pal.clock().now_monotonic();
//! let b = pal.clock().now_monotonic();
//! assert!(b >= a);
//!
//! let lock = pal.new_lock();
//! {
//!     let _guard = lock.acquire();
//!     lock.assert_held(1);
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod sync;

// Domain vocabulary
pub use domain::{
    AddressFamily, Interest, IpMode, MsgFlags, NameFlags, PalConfig, PollEntry, PollTimeout,
    Protocol, Readiness, RecvMsg, ShutdownMode, SocketError, SocketHandle, SocketKind,
    SocketOption, ThreadingTier, Timestamp, UtcOffset, EPOCH_OFFSET_SECONDS, TICKS_PER_SECOND,
};

// Port traits
pub use ports::{Allocator, ClockProvider, SocketProvider};

// Locking primitive
pub use sync::{ReentrantGuard, ReentrantLock};

// Composed platform
pub use service::Pal;

// Backend adapters
#[cfg(unix)]
pub use adapters::{PosixClock, PosixSocketProvider, SystemAllocator};
