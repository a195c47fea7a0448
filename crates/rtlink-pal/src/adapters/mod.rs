//! # Backend Adapters
//!
//! Concrete provider implementations. Exactly one backend is supported per
//! target; selection happens once, in the service layer, never at runtime.

#[cfg(unix)]
pub mod posix;

#[cfg(unix)]
pub use posix::{PosixClock, PosixSocketProvider, SystemAllocator};
