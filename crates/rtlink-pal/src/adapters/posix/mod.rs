//! # POSIX Backend
//!
//! The one supported backend in this variant: one adapter per capability
//! port, each a thin façade over the native facility.
//!
//! - [`PosixClock`] - wall/monotonic clocks and timezone offset
//! - [`PosixSocketProvider`] - BSD socket verbs, poll, name resolution
//! - [`SystemAllocator`] - malloc/realloc/free pass-through

pub mod alloc;
pub mod clock;
pub mod socket;

pub use alloc::SystemAllocator;
pub use clock::PosixClock;
pub use socket::PosixSocketProvider;

#[cfg(test)]
mod tests;
