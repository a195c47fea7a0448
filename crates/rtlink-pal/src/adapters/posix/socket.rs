//! POSIX socket backend.
//!
//! Every operation maps 1:1 onto a BSD socket verb. The native errno is
//! inspected exactly once, in [`PosixSocketProvider::fail`], which both
//! classifies it into the uniform taxonomy and records the human-readable
//! description for [`describe_last_error`]. Nothing deeper in the call
//! stack ever sees a raw error number.
//!
//! [`describe_last_error`]: crate::ports::SocketProvider::describe_last_error

use std::ffi::{c_int, c_void, CStr, CString};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::ptr;
use std::sync::{Mutex, PoisonError};

use crate::domain::{
    AddressFamily, IpMode, MsgFlags, NameFlags, PalConfig, PollEntry, PollTimeout, Protocol,
    Readiness, RecvMsg, ShutdownMode, SocketError, SocketHandle, SocketKind, SocketOption,
};
use crate::ports::SocketProvider;

// Suppress SIGPIPE on send where the target supports it.
#[cfg(any(target_os = "linux", target_os = "android"))]
const NO_SIGPIPE: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const NO_SIGPIPE: c_int = 0;

const HOST_BUF_LEN: usize = 1025;
const SERVICE_BUF_LEN: usize = 32;

/// The single errno-to-taxonomy translation point.
///
/// An if/else chain rather than a match: `EWOULDBLOCK` and `EAGAIN` alias on
/// most targets, and checking would-block first keeps the answer
/// well-defined where they do.
fn classify(errno: i32) -> SocketError {
    if errno == libc::EINTR {
        SocketError::Interrupted
    } else if errno == libc::EINPROGRESS {
        SocketError::InProgress
    } else if errno == libc::EWOULDBLOCK {
        SocketError::WouldBlock
    } else if errno == libc::EAGAIN {
        SocketError::Again
    } else if matches!(
        errno,
        libc::ECONNRESET
            | libc::ECONNREFUSED
            | libc::ECONNABORTED
            | libc::ETIMEDOUT
            | libc::ENETUNREACH
            | libc::EHOSTUNREACH
            | libc::ENETDOWN
            | libc::EPIPE
            | libc::EADDRINUSE
            | libc::EMSGSIZE
            | libc::ENOBUFS
    ) {
        SocketError::Transient
    } else {
        SocketError::Fatal
    }
}

fn to_sockaddr(addr: SocketAddrV4) -> libc::sockaddr_in {
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = addr.port().to_be();
    sa.sin_addr = libc::in_addr {
        s_addr: u32::from(*addr.ip()).to_be(),
    };
    sa
}

fn from_sockaddr(sa: &libc::sockaddr_in) -> SocketAddrV4 {
    SocketAddrV4::new(
        Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr)),
        u16::from_be(sa.sin_port),
    )
}

const SOCKADDR_IN_LEN: libc::socklen_t = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

fn transfer_flags(flags: MsgFlags) -> c_int {
    let mut raw = 0;
    if flags.peek {
        raw |= libc::MSG_PEEK;
    }
    if flags.dont_wait {
        raw |= libc::MSG_DONTWAIT;
    }
    raw
}

/// Socket provider over the BSD socket API.
///
/// Holds no per-handle state: handles belong to their opening connection
/// object and the kernel owns the socket lifecycle. The only mutable state
/// is the pending error description, cleared when read.
#[derive(Debug)]
pub struct PosixSocketProvider {
    ip: IpMode,
    last_error: Mutex<Option<String>>,
}

impl PosixSocketProvider {
    /// Construct the socket backend for the configured address-family tier.
    #[must_use]
    pub fn new(config: &PalConfig) -> Self {
        Self {
            ip: config.ip,
            last_error: Mutex::new(None),
        }
    }

    /// Address-family tier this backend was composed for.
    #[must_use]
    pub fn ip_mode(&self) -> IpMode {
        self.ip
    }

    /// Classify the thread's current errno and record its description.
    fn fail(&self, op: &'static str) -> SocketError {
        self.fail_with(op, io::Error::last_os_error())
    }

    fn fail_with(&self, op: &'static str, native: io::Error) -> SocketError {
        let class = classify(native.raw_os_error().unwrap_or(0));
        tracing::debug!("[pal] {op} failed: {native} ({class})");
        self.record(format!("{op}: {native}"));
        class
    }

    /// Classify a getaddrinfo/getnameinfo return code.
    fn fail_resolve(&self, op: &'static str, rc: c_int) -> SocketError {
        if rc == libc::EAI_SYSTEM {
            return self.fail(op);
        }
        let message = unsafe { CStr::from_ptr(libc::gai_strerror(rc)) }
            .to_string_lossy()
            .into_owned();
        let class = if rc == libc::EAI_AGAIN {
            SocketError::Again
        } else {
            SocketError::Fatal
        };
        tracing::debug!("[pal] {op} failed: {message} ({class})");
        self.record(format!("{op}: {message}"));
        class
    }

    fn record(&self, description: String) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(description);
    }

    /// Reject the invalid-handle sentinel before it reaches the kernel.
    fn ensure_valid(&self, handle: SocketHandle, op: &'static str) -> Result<(), SocketError> {
        if handle.is_valid() {
            Ok(())
        } else {
            Err(self.fail_with(op, io::Error::from_raw_os_error(libc::EBADF)))
        }
    }

    fn set_int_option(
        &self,
        handle: SocketHandle,
        level: c_int,
        name: c_int,
        enabled: bool,
    ) -> Result<(), SocketError> {
        let value: c_int = c_int::from(enabled);
        let rc = unsafe {
            libc::setsockopt(
                handle.as_raw(),
                level,
                name,
                ptr::addr_of!(value).cast::<c_void>(),
                mem::size_of::<c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(self.fail("setsockopt"));
        }
        Ok(())
    }

    fn set_nonblocking(&self, handle: SocketHandle, enabled: bool) -> Result<(), SocketError> {
        let current = unsafe { libc::fcntl(handle.as_raw(), libc::F_GETFL) };
        if current < 0 {
            return Err(self.fail("fcntl"));
        }
        let desired = if enabled {
            current | libc::O_NONBLOCK
        } else {
            current & !libc::O_NONBLOCK
        };
        if desired != current
            && unsafe { libc::fcntl(handle.as_raw(), libc::F_SETFL, desired) } < 0
        {
            return Err(self.fail("fcntl"));
        }
        Ok(())
    }
}

// ============================================================================
// SocketProvider implementation
// ============================================================================

impl SocketProvider for PosixSocketProvider {
    fn create(
        &self,
        family: AddressFamily,
        kind: SocketKind,
        protocol: Protocol,
    ) -> Result<SocketHandle, SocketError> {
        // self.ip is V4Only on this variant; any other family is a mismatch,
        // reported rather than downgraded.
        let IpMode::V4Only = self.ip;
        if family != AddressFamily::Ipv4 {
            return Err(self.fail_with(
                "socket",
                io::Error::from_raw_os_error(libc::EAFNOSUPPORT),
            ));
        }
        let raw_kind = match kind {
            SocketKind::Stream => libc::SOCK_STREAM,
            SocketKind::Datagram => libc::SOCK_DGRAM,
        };
        let raw_protocol = match protocol {
            Protocol::Default => 0,
            Protocol::Tcp => libc::IPPROTO_TCP,
            Protocol::Udp => libc::IPPROTO_UDP,
        };
        let fd = unsafe { libc::socket(libc::AF_INET, raw_kind, raw_protocol) };
        if fd < 0 {
            return Err(self.fail("socket"));
        }
        tracing::debug!("[pal] socket {fd} created ({kind:?}/{protocol:?})");
        Ok(SocketHandle::from_raw(fd))
    }

    fn bind(&self, handle: SocketHandle, addr: SocketAddrV4) -> Result<(), SocketError> {
        self.ensure_valid(handle, "bind")?;
        let sa = to_sockaddr(addr);
        let rc = unsafe {
            libc::bind(
                handle.as_raw(),
                ptr::addr_of!(sa).cast::<libc::sockaddr>(),
                SOCKADDR_IN_LEN,
            )
        };
        if rc != 0 {
            return Err(self.fail("bind"));
        }
        Ok(())
    }

    fn listen(&self, handle: SocketHandle, backlog: u32) -> Result<(), SocketError> {
        self.ensure_valid(handle, "listen")?;
        let backlog = c_int::try_from(backlog).unwrap_or(c_int::MAX);
        if unsafe { libc::listen(handle.as_raw(), backlog) } != 0 {
            return Err(self.fail("listen"));
        }
        Ok(())
    }

    fn accept(&self, handle: SocketHandle) -> Result<(SocketHandle, SocketAddrV4), SocketError> {
        self.ensure_valid(handle, "accept")?;
        let mut peer: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut len = SOCKADDR_IN_LEN;
        let fd = unsafe {
            libc::accept(
                handle.as_raw(),
                ptr::addr_of_mut!(peer).cast::<libc::sockaddr>(),
                &mut len,
            )
        };
        if fd < 0 {
            return Err(self.fail("accept"));
        }
        tracing::debug!("[pal] socket {} accepted {fd}", handle.as_raw());
        Ok((SocketHandle::from_raw(fd), from_sockaddr(&peer)))
    }

    fn connect(&self, handle: SocketHandle, addr: SocketAddrV4) -> Result<(), SocketError> {
        self.ensure_valid(handle, "connect")?;
        let sa = to_sockaddr(addr);
        let rc = unsafe {
            libc::connect(
                handle.as_raw(),
                ptr::addr_of!(sa).cast::<libc::sockaddr>(),
                SOCKADDR_IN_LEN,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let native = io::Error::last_os_error();
        // A repeated connect after completion is success, not an error.
        if native.raw_os_error() == Some(libc::EISCONN) {
            return Ok(());
        }
        Err(self.fail_with("connect", native))
    }

    fn pending_error(&self, handle: SocketHandle) -> Result<(), SocketError> {
        self.ensure_valid(handle, "connect")?;
        let mut value: c_int = 0;
        let mut len = mem::size_of::<c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                handle.as_raw(),
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                ptr::addr_of_mut!(value).cast::<c_void>(),
                &mut len,
            )
        };
        if rc != 0 {
            return Err(self.fail("getsockopt"));
        }
        if value != 0 {
            // The deferred failure is attributed to the connect that armed
            // it; reading SO_ERROR cleared it in the kernel.
            return Err(self.fail_with("connect", io::Error::from_raw_os_error(value)));
        }
        Ok(())
    }

    fn send(
        &self,
        handle: SocketHandle,
        buf: &[u8],
        flags: MsgFlags,
    ) -> Result<usize, SocketError> {
        self.ensure_valid(handle, "send")?;
        let n = unsafe {
            libc::send(
                handle.as_raw(),
                buf.as_ptr().cast::<c_void>(),
                buf.len(),
                transfer_flags(flags) | NO_SIGPIPE,
            )
        };
        if n < 0 {
            return Err(self.fail("send"));
        }
        Ok(n as usize)
    }

    fn recv(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
        flags: MsgFlags,
    ) -> Result<usize, SocketError> {
        self.ensure_valid(handle, "recv")?;
        let n = unsafe {
            libc::recv(
                handle.as_raw(),
                buf.as_mut_ptr().cast::<c_void>(),
                buf.len(),
                transfer_flags(flags),
            )
        };
        if n < 0 {
            return Err(self.fail("recv"));
        }
        Ok(n as usize)
    }

    fn send_to(
        &self,
        handle: SocketHandle,
        buf: &[u8],
        flags: MsgFlags,
        addr: SocketAddrV4,
    ) -> Result<usize, SocketError> {
        self.ensure_valid(handle, "sendto")?;
        let sa = to_sockaddr(addr);
        let n = unsafe {
            libc::sendto(
                handle.as_raw(),
                buf.as_ptr().cast::<c_void>(),
                buf.len(),
                transfer_flags(flags) | NO_SIGPIPE,
                ptr::addr_of!(sa).cast::<libc::sockaddr>(),
                SOCKADDR_IN_LEN,
            )
        };
        if n < 0 {
            return Err(self.fail("sendto"));
        }
        Ok(n as usize)
    }

    fn recv_from(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
        flags: MsgFlags,
    ) -> Result<(usize, SocketAddrV4), SocketError> {
        self.ensure_valid(handle, "recvfrom")?;
        let mut src: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut len = SOCKADDR_IN_LEN;
        let n = unsafe {
            libc::recvfrom(
                handle.as_raw(),
                buf.as_mut_ptr().cast::<c_void>(),
                buf.len(),
                transfer_flags(flags),
                ptr::addr_of_mut!(src).cast::<libc::sockaddr>(),
                &mut len,
            )
        };
        if n < 0 {
            return Err(self.fail("recvfrom"));
        }
        let source = if len >= SOCKADDR_IN_LEN && src.sin_family == libc::AF_INET as libc::sa_family_t
        {
            from_sockaddr(&src)
        } else {
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)
        };
        Ok((n as usize, source))
    }

    fn recv_msg(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
        control: &mut [u8],
        flags: MsgFlags,
    ) -> Result<RecvMsg, SocketError> {
        self.ensure_valid(handle, "recvmsg")?;
        let mut src: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast::<c_void>(),
            iov_len: buf.len(),
        };
        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        hdr.msg_name = ptr::addr_of_mut!(src).cast::<c_void>();
        hdr.msg_namelen = SOCKADDR_IN_LEN;
        hdr.msg_iov = &mut iov;
        hdr.msg_iovlen = 1;
        if !control.is_empty() {
            hdr.msg_control = control.as_mut_ptr().cast::<c_void>();
            hdr.msg_controllen = control.len() as _;
        }

        let n = unsafe { libc::recvmsg(handle.as_raw(), &mut hdr, transfer_flags(flags)) };
        if n < 0 {
            return Err(self.fail("recvmsg"));
        }

        let source = if hdr.msg_namelen >= SOCKADDR_IN_LEN
            && src.sin_family == libc::AF_INET as libc::sa_family_t
        {
            Some(from_sockaddr(&src))
        } else {
            None
        };
        Ok(RecvMsg {
            bytes: n as usize,
            control_bytes: hdr.msg_controllen as usize,
            source,
            truncated: hdr.msg_flags & libc::MSG_TRUNC != 0,
        })
    }

    fn shutdown(&self, handle: SocketHandle, mode: ShutdownMode) -> Result<(), SocketError> {
        self.ensure_valid(handle, "shutdown")?;
        let how = match mode {
            ShutdownMode::Read => libc::SHUT_RD,
            ShutdownMode::Write => libc::SHUT_WR,
            ShutdownMode::Both => libc::SHUT_RDWR,
        };
        if unsafe { libc::shutdown(handle.as_raw(), how) } != 0 {
            return Err(self.fail("shutdown"));
        }
        Ok(())
    }

    fn close(&self, handle: SocketHandle) -> Result<(), SocketError> {
        self.ensure_valid(handle, "close")?;
        tracing::debug!("[pal] socket {} closed", handle.as_raw());
        if unsafe { libc::close(handle.as_raw()) } != 0 {
            // The descriptor is gone either way; the caller must not retry.
            return Err(self.fail("close"));
        }
        Ok(())
    }

    fn set_option(&self, handle: SocketHandle, option: SocketOption) -> Result<(), SocketError> {
        self.ensure_valid(handle, "setsockopt")?;
        match option {
            SocketOption::ReuseAddress(on) => {
                self.set_int_option(handle, libc::SOL_SOCKET, libc::SO_REUSEADDR, on)
            }
            SocketOption::NoDelay(on) => {
                self.set_int_option(handle, libc::IPPROTO_TCP, libc::TCP_NODELAY, on)
            }
            SocketOption::KeepAlive(on) => {
                self.set_int_option(handle, libc::SOL_SOCKET, libc::SO_KEEPALIVE, on)
            }
            SocketOption::NonBlocking(on) => self.set_nonblocking(handle, on),
        }
    }

    fn local_addr(&self, handle: SocketHandle) -> Result<SocketAddrV4, SocketError> {
        self.ensure_valid(handle, "getsockname")?;
        let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut len = SOCKADDR_IN_LEN;
        let rc = unsafe {
            libc::getsockname(
                handle.as_raw(),
                ptr::addr_of_mut!(sa).cast::<libc::sockaddr>(),
                &mut len,
            )
        };
        if rc != 0 {
            return Err(self.fail("getsockname"));
        }
        Ok(from_sockaddr(&sa))
    }

    fn poll(
        &self,
        entries: &mut [PollEntry],
        timeout: PollTimeout,
    ) -> Result<usize, SocketError> {
        let mut fds: Vec<libc::pollfd> = entries
            .iter()
            .map(|entry| {
                let mut events: libc::c_short = 0;
                if entry.interest.readable {
                    events |= libc::POLLIN;
                }
                if entry.interest.writable {
                    events |= libc::POLLOUT;
                }
                libc::pollfd {
                    fd: entry.handle.as_raw(),
                    events,
                    revents: 0,
                }
            })
            .collect();

        let timeout_ms: c_int = match timeout {
            PollTimeout::Immediate => 0,
            PollTimeout::Infinite => -1,
            // Sub-millisecond waits round up so a bounded timeout never
            // degenerates into a busy spin.
            PollTimeout::Bounded(d) => {
                let ms = c_int::try_from(d.as_millis()).unwrap_or(c_int::MAX);
                if ms == 0 && !d.is_zero() {
                    1
                } else {
                    ms
                }
            }
        };

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            return Err(self.fail("poll"));
        }
        for (entry, fd) in entries.iter_mut().zip(&fds) {
            entry.readiness = Readiness {
                readable: fd.revents & libc::POLLIN != 0,
                writable: fd.revents & libc::POLLOUT != 0,
                error: fd.revents & (libc::POLLERR | libc::POLLNVAL) != 0,
                hang_up: fd.revents & libc::POLLHUP != 0,
            };
        }
        Ok(rc as usize)
    }

    fn resolve_address(
        &self,
        host: &str,
        service: &str,
    ) -> Result<Vec<SocketAddrV4>, SocketError> {
        let bad_name =
            |this: &Self| this.fail_with("getaddrinfo", io::Error::from_raw_os_error(libc::EINVAL));
        let host_c = match CString::new(host) {
            Ok(c) => c,
            Err(_) => return Err(bad_name(self)),
        };
        let service_c = match CString::new(service) {
            Ok(c) => c,
            Err(_) => return Err(bad_name(self)),
        };

        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = libc::AF_INET;

        let mut head: *mut libc::addrinfo = ptr::null_mut();
        let rc = unsafe {
            libc::getaddrinfo(
                if host.is_empty() {
                    ptr::null()
                } else {
                    host_c.as_ptr()
                },
                if service.is_empty() {
                    ptr::null()
                } else {
                    service_c.as_ptr()
                },
                &hints,
                &mut head,
            )
        };
        if rc != 0 {
            return Err(self.fail_resolve("getaddrinfo", rc));
        }

        let mut records = Vec::new();
        let mut cursor = head;
        while !cursor.is_null() {
            let info = unsafe { &*cursor };
            if info.ai_family == libc::AF_INET
                && !info.ai_addr.is_null()
                && info.ai_addrlen >= SOCKADDR_IN_LEN
            {
                let sa = unsafe { &*info.ai_addr.cast::<libc::sockaddr_in>() };
                let addr = from_sockaddr(sa);
                if !records.contains(&addr) {
                    records.push(addr);
                }
            }
            cursor = info.ai_next;
        }
        unsafe { libc::freeaddrinfo(head) };
        Ok(records)
    }

    fn resolve_name(
        &self,
        addr: SocketAddrV4,
        flags: NameFlags,
    ) -> Result<(String, String), SocketError> {
        let sa = to_sockaddr(addr);
        let mut host = [0u8; HOST_BUF_LEN];
        let mut service = [0u8; SERVICE_BUF_LEN];
        let mut raw_flags = 0;
        if flags.numeric_host {
            raw_flags |= libc::NI_NUMERICHOST;
        }
        if flags.numeric_service {
            raw_flags |= libc::NI_NUMERICSERV;
        }

        let rc = unsafe {
            libc::getnameinfo(
                ptr::addr_of!(sa).cast::<libc::sockaddr>(),
                SOCKADDR_IN_LEN,
                host.as_mut_ptr().cast(),
                host.len() as libc::socklen_t,
                service.as_mut_ptr().cast(),
                service.len() as libc::socklen_t,
                raw_flags,
            )
        };
        if rc != 0 {
            return Err(self.fail_resolve("getnameinfo", rc));
        }

        let as_string = |buf: &[u8]| {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            String::from_utf8_lossy(&buf[..end]).into_owned()
        };
        Ok((as_string(&host), as_string(&service)))
    }

    fn hostname(&self) -> Result<String, SocketError> {
        let mut buf = [0u8; 256];
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len() - 1) };
        if rc != 0 {
            return Err(self.fail("gethostname"));
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    fn describe_last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
