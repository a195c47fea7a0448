//! Build-time platform configuration.
//!
//! Multithreading tier and IP version are expressed as an explicit
//! capability struct, constructed once at process start and handed by
//! reference to every provider.

/// Threading tier the embedding stack was composed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadingTier {
    /// Exactly one thread drives the stack. Lock acquisition still tracks
    /// reentrancy depth, but contention from a second thread is a
    /// composition bug and faults immediately.
    SingleThreaded,
    /// Multiple native threads share stack objects under the reentrant lock.
    #[default]
    LockEnabled,
}

/// Address-family tier. This variant targets constrained IPv4-only stacks;
/// there is no runtime dual-stack negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpMode {
    /// IPv4 only.
    #[default]
    V4Only,
}

/// Platform capabilities selected at compose time.
///
/// Passed by reference to provider constructors; never mutated afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PalConfig {
    /// Threading tier.
    pub threading: ThreadingTier,
    /// Address-family tier.
    pub ip: IpMode,
}

impl PalConfig {
    /// Configuration for a lock-enabled, IPv4-only platform.
    #[must_use]
    pub const fn new(threading: ThreadingTier) -> Self {
        Self {
            threading,
            ip: IpMode::V4Only,
        }
    }
}
