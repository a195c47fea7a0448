//! End-to-end exercise of the composed platform: a client and server talk
//! over loopback TCP using only the PAL surface, under the reentrant lock,
//! with timestamps taken from the clock capability.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use rtlink_pal::ports::{ClockProvider, SocketProvider};
use rtlink_pal::{
    AddressFamily, Interest, MsgFlags, Pal, PalConfig, PollEntry, PollTimeout, Protocol,
    SocketKind, SocketOption, ThreadingTier,
};

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn full_stack_loopback_session() {
    init_logging();

    let pal = Arc::new(Pal::posix(PalConfig::new(ThreadingTier::LockEnabled)));
    let lock = pal.new_lock();

    let started = pal.clock().now_monotonic();

    // Server side: bound, listening, ephemeral port.
    let sockets = pal.sockets();
    let listener = sockets
        .create(AddressFamily::Ipv4, SocketKind::Stream, Protocol::Tcp)
        .expect("create listener");
    sockets
        .set_option(listener, SocketOption::ReuseAddress(true))
        .expect("reuse address");
    sockets
        .bind(listener, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
        .expect("bind");
    sockets.listen(listener, 4).expect("listen");
    let endpoint = sockets.local_addr(listener).expect("bound endpoint");

    // Client side drives a non-blocking connect to completion via poll,
    // the way the protocol stack does.
    let client = sockets
        .create(AddressFamily::Ipv4, SocketKind::Stream, Protocol::Tcp)
        .expect("create client");
    sockets
        .set_option(client, SocketOption::NonBlocking(true))
        .expect("nonblocking");
    match sockets.connect(client, endpoint) {
        Ok(()) => {}
        Err(err) => {
            assert!(err.is_retry_hint(), "connect failed outright: {err}");
            let mut entries = [PollEntry::new(client, Interest::WRITABLE)];
            let ready = sockets
                .poll(&mut entries, PollTimeout::Bounded(Duration::from_secs(5)))
                .expect("poll for connect completion");
            assert_eq!(ready, 1);
            assert!(entries[0].readiness.writable);
            assert!(!entries[0].readiness.error);
            sockets
                .pending_error(client)
                .expect("deferred connect completed");
        }
    }

    let (server, _peer) = sockets.accept(listener).expect("accept");

    // Session state is mutated under the stack lock, re-entered from a
    // nested helper as the real call graph does.
    let payload = {
        let _guard = lock.acquire();
        lock.assert_held(1);
        let inner = lock.acquire();
        drop(inner);
        format!("session at {}", pal.clock().now())
    };

    sockets
        .send(client, payload.as_bytes(), MsgFlags::default())
        .expect("send");

    let mut entries = [PollEntry::new(server, Interest::READABLE)];
    let ready = sockets
        .poll(&mut entries, PollTimeout::Bounded(Duration::from_secs(5)))
        .expect("poll for payload");
    assert_eq!(ready, 1);

    let mut buf = [0u8; 256];
    let n = sockets
        .recv(server, &mut buf, MsgFlags::default())
        .expect("recv");
    assert_eq!(&buf[..n], payload.as_bytes());

    sockets.close(server).expect("close server");
    sockets.close(client).expect("close client");
    sockets.close(listener).expect("close listener");

    let finished = pal.clock().now_monotonic();
    assert!(finished >= started);
    assert_eq!(lock.depth(), 0);
}
