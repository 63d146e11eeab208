use std::cell::RefCell;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gearloop_core::{Connection, Events, Notifier, ReturnCode};
use gearloop_runtime::UniversalContext;

struct Sink {
    stream: UnixStream,
}

impl Connection for Sink {
    fn descriptor(&self) -> libc::c_int {
        self.stream.as_raw_fd()
    }

    fn interest(&self) -> Events {
        Events::READABLE
    }

    fn on_events(&mut self, _events: Events) -> ReturnCode {
        ReturnCode::Success
    }
}

fn context_with(n: usize) -> (UniversalContext, Vec<UnixStream>) {
    let mut ctx = UniversalContext::new();
    ctx.set_timeout(Some(Duration::ZERO));
    let mut peers = Vec::with_capacity(n);
    for _ in 0..n {
        let (a, b) = UnixStream::pair().expect("socketpair");
        ctx.register_connection(Rc::new(RefCell::new(Sink { stream: a })))
            .expect("register");
        peers.push(b);
    }
    (ctx, peers)
}

fn bench_quiet_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_quiet");
    for &n in &[1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (mut ctx, _peers) = context_with(n);
            b.iter(|| black_box(ctx.wait().expect("wait")));
        });
    }
    group.finish();
}

fn bench_ready_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_ready");
    for &n in &[1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (mut ctx, mut peers) = context_with(n);
            // Unread bytes keep every connection readable across iterations.
            for peer in &mut peers {
                peer.write_all(b"x").expect("write");
            }
            b.iter(|| black_box(ctx.wait().expect("wait").dispatched));
        });
    }
    group.finish();
}

fn bench_wakeup_roundtrip(c: &mut Criterion) {
    let (mut ctx, _peers) = context_with(4);
    ctx.activate_wakeup().expect("wakeup");
    let handle = ctx.wakeup_handle().expect("handle");

    c.bench_function("wakeup_roundtrip", |b| {
        b.iter(|| {
            handle.notify().expect("notify");
            black_box(ctx.wait().expect("wait").woken)
        });
    });
}

fn bench_registry_churn(c: &mut Criterion) {
    c.bench_function("packet_register_unregister", |b| {
        let mut ctx = UniversalContext::new();
        let packet: gearloop_runtime::PacketRef = Rc::new(0u64);
        b.iter(|| {
            let id = ctx.register_packet(Rc::clone(&packet)).expect("register");
            black_box(ctx.unregister_packet(id));
        });
    });
}

criterion_group!(
    wait_cycle,
    bench_quiet_wait,
    bench_ready_dispatch,
    bench_wakeup_roundtrip,
    bench_registry_churn
);
criterion_main!(wait_cycle);
