//! # Platform Service
//!
//! Composes one provider per capability domain into the façade the upper
//! protocol stack holds for its whole lifetime. Backend selection happens
//! here, exactly once, at process start; the stack itself depends only on
//! the port traits.

use crate::domain::PalConfig;
use crate::ports::{Allocator, ClockProvider, SocketProvider};
use crate::sync::ReentrantLock;

#[cfg(unix)]
use crate::adapters::{PosixClock, PosixSocketProvider, SystemAllocator};

/// The composed platform: one clock, one socket provider, one allocator,
/// plus the factory for reentrant locks in the configured threading tier.
///
/// The three providers are independent; nothing here couples them beyond
/// sharing the compose-time [`PalConfig`].
#[derive(Debug)]
pub struct Pal<C, S, A> {
    config: PalConfig,
    clock: C,
    sockets: S,
    alloc: A,
}

impl<C, S, A> Pal<C, S, A>
where
    C: ClockProvider,
    S: SocketProvider,
    A: Allocator,
{
    /// Compose a platform from explicit providers.
    #[must_use]
    pub fn compose(config: PalConfig, clock: C, sockets: S, alloc: A) -> Self {
        tracing::debug!(
            "[pal] platform composed ({:?}, {:?})",
            config.threading,
            config.ip
        );
        Self {
            config,
            clock,
            sockets,
            alloc,
        }
    }

    /// The compose-time configuration.
    #[must_use]
    pub fn config(&self) -> &PalConfig {
        &self.config
    }

    /// Clock capability.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Socket capability.
    #[must_use]
    pub fn sockets(&self) -> &S {
        &self.sockets
    }

    /// Allocation capability.
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// New reentrant lock for the configured threading tier. The returned
    /// lock is owned by whichever stack object embeds it.
    #[must_use]
    pub fn new_lock(&self) -> ReentrantLock {
        ReentrantLock::new(self.config.threading)
    }
}

#[cfg(unix)]
impl Pal<PosixClock, PosixSocketProvider, SystemAllocator> {
    /// Compose the POSIX backend.
    #[must_use]
    pub fn posix(config: PalConfig) -> Self {
        Self::compose(
            config,
            PosixClock::new(&config),
            PosixSocketProvider::new(&config),
            SystemAllocator::new(&config),
        )
    }
}
