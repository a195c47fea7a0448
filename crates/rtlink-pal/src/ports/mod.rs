//! # Capability Ports
//!
//! Trait definitions the upper protocol stack depends on. Each provider
//! domain (clock, sockets, allocation) is one capability interface with
//! exactly one implementation per supported OS backend; backend selection
//! happens once, in the [`service`](crate::service) layer, not per call.
//!
//! The reentrant lock is deliberately *not* a port: its scoped guard is a
//! concrete type (see [`crate::sync`]) so that release-on-every-exit-path is
//! enforced by the compiler rather than by convention.

use std::net::SocketAddrV4;
use std::ptr::NonNull;

use crate::domain::{
    AddressFamily, MsgFlags, NameFlags, PollEntry, PollTimeout, Protocol, RecvMsg, ShutdownMode,
    SocketError, SocketHandle, SocketKind, SocketOption, Timestamp, UtcOffset,
};

/// Wall-clock and monotonic time sources.
///
/// These operations are defined to not fail: if the underlying OS call can
/// fail, the provider substitutes a best-effort degraded value, because
/// callers rely on time for protocol timestamps and have no fallback.
pub trait ClockProvider: Send + Sync {
    /// Current wall-clock time, shifted to the protocol epoch.
    ///
    /// May jump on clock adjustment; never use for ordering.
    fn now(&self) -> Timestamp;

    /// Monotonic time for interval measurement.
    ///
    /// For any two calls `a` then `b` in the same process, `b >= a`. The
    /// value has no epoch alignment and is not comparable across processes.
    fn now_monotonic(&self) -> Timestamp;

    /// Offset of local time from UTC at this moment, DST included.
    ///
    /// Recomputed per call from the OS timezone rule; never cached.
    fn local_utc_offset(&self) -> UtcOffset;

    /// Block the calling thread for at least `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}

/// Blocking/non-blocking network I/O with uniform error classification.
///
/// Every fallible operation returns the closed [`SocketError`] taxonomy;
/// translation from the native error number happens exactly once, inside the
/// backend. The provider never retries: transient classes are reported to
/// the caller, who owns retry and backoff policy.
///
/// Handles are single-owner. Concurrent use of one handle from several
/// threads without external synchronization is undefined.
pub trait SocketProvider: Send + Sync {
    /// Create a socket. Returns a valid handle or the error class; on error
    /// no handle is allocated.
    ///
    /// Requesting [`AddressFamily::Ipv6`] on this IPv4-only variant is a
    /// fatal address-family mismatch.
    fn create(
        &self,
        family: AddressFamily,
        kind: SocketKind,
        protocol: Protocol,
    ) -> Result<SocketHandle, SocketError>;

    /// Bind to a local address. Port 0 selects an ephemeral port; query it
    /// back with [`SocketProvider::local_addr`].
    fn bind(&self, handle: SocketHandle, addr: SocketAddrV4) -> Result<(), SocketError>;

    /// Mark a bound stream socket as accepting connections.
    fn listen(&self, handle: SocketHandle, backlog: u32) -> Result<(), SocketError>;

    /// Accept one pending connection, returning the new handle and the peer
    /// address. Non-blocking listeners report [`SocketError::WouldBlock`]
    /// when the queue is empty.
    fn accept(&self, handle: SocketHandle) -> Result<(SocketHandle, SocketAddrV4), SocketError>;

    /// Connect to a peer. A non-blocking connect that cannot complete
    /// immediately reports [`SocketError::InProgress`]; wait for
    /// writability, then consume the outcome with
    /// [`SocketProvider::pending_error`].
    fn connect(&self, handle: SocketHandle, addr: SocketAddrV4) -> Result<(), SocketError>;

    /// Consume the socket's pending asynchronous error.
    ///
    /// `Ok(())` means the deferred operation (typically a non-blocking
    /// connect) completed successfully. A failure is classified like any
    /// other, and its description is recorded for
    /// [`SocketProvider::describe_last_error`]. The kernel clears the
    /// pending error once read.
    fn pending_error(&self, handle: SocketHandle) -> Result<(), SocketError>;

    /// Send bytes on a connected socket. Returns the byte count actually
    /// queued, which may be short.
    fn send(&self, handle: SocketHandle, buf: &[u8], flags: MsgFlags)
        -> Result<usize, SocketError>;

    /// Receive bytes on a connected socket. A return of 0 on a stream
    /// socket means the peer performed an orderly shutdown.
    fn recv(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
        flags: MsgFlags,
    ) -> Result<usize, SocketError>;

    /// Send a datagram to an explicit destination.
    fn send_to(
        &self,
        handle: SocketHandle,
        buf: &[u8],
        flags: MsgFlags,
        addr: SocketAddrV4,
    ) -> Result<usize, SocketError>;

    /// Receive a datagram and its source address.
    fn recv_from(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
        flags: MsgFlags,
    ) -> Result<(usize, SocketAddrV4), SocketError>;

    /// Receive a message together with ancillary (control) data.
    fn recv_msg(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
        control: &mut [u8],
        flags: MsgFlags,
    ) -> Result<RecvMsg, SocketError>;

    /// Shut down one or both directions without releasing the handle.
    fn shutdown(&self, handle: SocketHandle, mode: ShutdownMode) -> Result<(), SocketError>;

    /// Close the handle. After this call the handle value is dead even if an
    /// error is reported; it must not be closed again.
    fn close(&self, handle: SocketHandle) -> Result<(), SocketError>;

    /// Apply a uniform socket option.
    fn set_option(&self, handle: SocketHandle, option: SocketOption) -> Result<(), SocketError>;

    /// Local address the handle is bound to.
    fn local_addr(&self, handle: SocketHandle) -> Result<SocketAddrV4, SocketError>;

    /// Wait for readiness on a set of handles.
    ///
    /// Fills `readiness` on every entry and returns how many entries have a
    /// condition set; 0 means the timeout expired. Closing a handle from
    /// another thread while it is being polled is a best-effort wakeup only.
    fn poll(
        &self,
        entries: &mut [PollEntry],
        timeout: PollTimeout,
    ) -> Result<usize, SocketError>;

    /// Resolve a host and service to IPv4 socket addresses.
    fn resolve_address(
        &self,
        host: &str,
        service: &str,
    ) -> Result<Vec<SocketAddrV4>, SocketError>;

    /// Reverse-resolve an address to host and service strings.
    fn resolve_name(
        &self,
        addr: SocketAddrV4,
        flags: NameFlags,
    ) -> Result<(String, String), SocketError>;

    /// Name of the local host.
    fn hostname(&self) -> Result<String, SocketError>;

    /// Human-readable description of the most recent native failure.
    ///
    /// Reading the description clears it in the same scoped action, so a
    /// stale error can never leak into a later unrelated failure report.
    /// Returns `None` when no failure is pending.
    fn describe_last_error(&self) -> Option<String>;
}

/// Direct pass-through memory allocation.
///
/// No pooling or arena logic; the PAL only insulates the stack from the
/// native allocator's symbol names.
pub trait Allocator: Send + Sync {
    /// Allocate `size` bytes. Zero-size requests still yield a unique block
    /// so every successful allocation has a matching release. `None` means
    /// allocation failure.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocate `size` bytes of zero-initialized memory, with the same
    /// zero-size and failure contract as [`Allocator::allocate`].
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resize a previously allocated block, preserving its prefix.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator and not have been released.
    /// On success the old pointer is invalid; on failure it remains owned
    /// by the caller.
    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>>;

    /// Release a previously allocated block.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator and must not be released twice.
    unsafe fn release(&self, ptr: NonNull<u8>);
}
