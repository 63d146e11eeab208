//! gearloop End-to-End Smoke Test
//!
//! Exercises the universal context against real sockets:
//!   Part A: options, error slot, server options, namespace
//!   Part B: connection and packet churn, untracked packets
//!   Part C: timeout, dispatch, callback failure, table growth
//!   Part D: same-thread signal, cross-thread interrupt, idle drain
//!
//! Run: ./target/release/universal-smoke

use gearloop::{
    kinfo, Connection, Events, Notifier, PacketRef, ReturnCode, UniversalConfig,
    UniversalContext, UniversalOption, Verbose,
};

use std::cell::RefCell;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::{Duration, Instant};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok { self.pass(name); } else { self.fail(name, reason); }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

/// Socket-backed connection that counts the events it receives
struct EchoConn {
    stream: UnixStream,
    hits: usize,
    reply: ReturnCode,
}

impl Connection for EchoConn {
    fn descriptor(&self) -> libc::c_int {
        self.stream.as_raw_fd()
    }

    fn interest(&self) -> Events {
        Events::READABLE
    }

    fn on_events(&mut self, _events: Events) -> ReturnCode {
        self.hits += 1;
        self.reply
    }
}

fn echo_pair() -> Option<(Rc<RefCell<EchoConn>>, UnixStream)> {
    let (a, b) = UnixStream::pair().ok()?;
    let conn = EchoConn { stream: a, hits: 0, reply: ReturnCode::Success };
    Some((Rc::new(RefCell::new(conn)), b))
}

// ════════════════════════════════════════════════════════════
// Part A: Setup
// ════════════════════════════════════════════════════════════

fn test_setup(t: &mut TestRunner) {
    t.section("Part A: Setup");

    let ctx = UniversalContext::with_options(&[UniversalOption::NonBlocking]);
    t.check("non-blocking at construction", ctx.is_non_blocking(), "flag not set");
    t.check("fresh error slot is clear", !ctx.has_error(), "error present");

    let mut ctx = UniversalContext::new();
    let rejected = ctx.set_raw_option(1234, true).is_err();
    t.check(
        "unknown option rejected",
        rejected && ctx.error_code() == ReturnCode::InvalidOption,
        &format!("code {}", ctx.error_code()),
    );
    t.check("flags untouched after reject", !ctx.is_non_blocking(), "flag changed");
    ctx.reset_error();
    t.check("reset_error clears slot", ctx.error_message().is_none(), "message kept");

    let added = ctx.add_server_option("exceptions").is_ok()
        && ctx.add_server_option("exceptions").is_ok();
    t.check(
        "server option dedup",
        added && ctx.server_option_count() == 1,
        &format!("count {}", ctx.server_option_count()),
    );

    ctx.set_namespace(Some("smoke:"));
    t.check(
        "namespace prefix",
        ctx.apply_namespace("reverse") == "smoke:reverse",
        "wrong prefix",
    );

    let lines = Rc::new(RefCell::new(0usize));
    let sink = Rc::clone(&lines);
    ctx.set_log_hook(
        move |_: Verbose, _: &std::fmt::Arguments<'_>| *sink.borrow_mut() += 1,
        Verbose::Warning,
    );
    ctx.log(Verbose::Error, format_args!("kept"));
    ctx.log(Verbose::Debug, format_args!("filtered"));
    t.check("log hook filtering", *lines.borrow() == 1, "wrong delivery count");
}

// ════════════════════════════════════════════════════════════
// Part B: Registries
// ════════════════════════════════════════════════════════════

fn test_registries(t: &mut TestRunner) {
    t.section("Part B: Registries");

    let mut ctx = UniversalContext::new();
    let mut live = Vec::new();
    let mut consistent = true;
    for i in 0..64 {
        let Some((conn, peer)) = echo_pair() else {
            t.fail("socketpair", "could not create");
            return;
        };
        match ctx.register_connection(conn) {
            Ok(id) => live.push((id, peer)),
            Err(e) => {
                t.fail("register connection", &e.to_string());
                return;
            }
        }
        if i % 3 == 2 {
            let (id, _) = live.remove(0);
            consistent &= ctx.unregister_connection(id).is_some();
        }
        consistent &= ctx.connection_count() == ctx.connections().count();
    }
    t.check("connection churn keeps count", consistent, "count drifted");
    t.check(
        "connection count",
        ctx.connection_count() == live.len(),
        &format!("{} vs {}", ctx.connection_count(), live.len()),
    );

    let packet: PacketRef = Rc::new("SUBMIT_JOB");
    let tracked = ctx.register_packet(Rc::clone(&packet)).ok();
    t.check("packet tracked", ctx.packet_count() == 1, "count not 1");

    ctx.set_option(UniversalOption::DontTrackPackets, true);
    let untracked = ctx.register_packet(Rc::clone(&packet));
    t.check(
        "untracked packet is no-op",
        matches!(untracked, Ok(id) if id.is_none()) && ctx.packet_count() == 1,
        "count changed",
    );
    ctx.set_option(UniversalOption::DontTrackPackets, false);

    if let Some(id) = tracked {
        ctx.unregister_packet(id);
    }
    t.check("packet unregistered", ctx.packet_count() == 0, "count not 0");

    drop(ctx);
    t.check("context drops only references", Rc::strong_count(&packet) == 1, "leaked ref");
}

// ════════════════════════════════════════════════════════════
// Part C: Readiness
// ════════════════════════════════════════════════════════════

fn test_readiness(t: &mut TestRunner) {
    t.section("Part C: Readiness");

    let mut ctx = UniversalContext::new();
    ctx.set_timeout(Some(Duration::from_millis(20)));

    let mut peers = Vec::new();
    let mut conns = Vec::new();
    for _ in 0..3 {
        let Some((conn, peer)) = echo_pair() else {
            t.fail("socketpair", "could not create");
            return;
        };
        if ctx.register_connection(conn.clone()).is_err() {
            t.fail("register connection", "failed");
            return;
        }
        conns.push(conn);
        peers.push(peer);
    }

    match ctx.wait() {
        Ok(out) => t.check("quiet wait times out", out.timed_out, "did not time out"),
        Err(e) => t.fail("quiet wait times out", &e.to_string()),
    }
    t.check(
        "descriptor table sized 3",
        ctx.descriptor_capacity() == 3,
        &format!("capacity {}", ctx.descriptor_capacity()),
    );

    let wrote = peers[1].write_all(b"job").is_ok();
    match ctx.wait() {
        Ok(out) => t.check(
            "readable connection dispatched",
            wrote && out.dispatched == 1 && conns[1].borrow().hits == 1,
            &format!("dispatched {}", out.dispatched),
        ),
        Err(e) => t.fail("readable connection dispatched", &e.to_string()),
    }

    conns[1].borrow_mut().reply = ReturnCode::LostConnection;
    let failed = ctx.wait().is_err();
    t.check(
        "callback failure surfaces its code",
        failed && ctx.error_code() == ReturnCode::LostConnection,
        &format!("code {}", ctx.error_code()),
    );
    ctx.reset_error();

    for conn in &conns {
        conn.borrow_mut().reply = ReturnCode::Success;
    }
    for _ in 0..4 {
        let Some((conn, peer)) = echo_pair() else { break };
        let _ = ctx.register_connection(conn);
        peers.push(peer);
    }
    let _ = ctx.wait();
    t.check(
        "descriptor table grows",
        ctx.descriptor_capacity() == 7,
        &format!("capacity {}", ctx.descriptor_capacity()),
    );
}

// ════════════════════════════════════════════════════════════
// Part D: Wakeup
// ════════════════════════════════════════════════════════════

fn test_wakeup(t: &mut TestRunner) {
    t.section("Part D: Wakeup");

    let config = UniversalConfig::new().wakeup(true);
    let mut ctx = match UniversalContext::from_config(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            t.fail("activate wakeup", &e.to_string());
            return;
        }
    };
    t.pass("activate wakeup");

    let _ = ctx.signal_wakeup();
    let _ = ctx.signal_wakeup();
    let start = Instant::now();
    let first = ctx.wait().map(|o| o.woken).unwrap_or(false);
    let second = ctx.wait().map(|o| o.woken).unwrap_or(true);
    t.check(
        "idle wait drains coalesced signals",
        first && !second && start.elapsed() < Duration::from_secs(1),
        "signals leaked or wait blocked",
    );

    let Some((conn, _peer)) = echo_pair() else {
        t.fail("socketpair", "could not create");
        return;
    };
    let _ = ctx.register_connection(conn.clone());
    ctx.set_timeout(Some(Duration::from_secs(5)));
    let Some(handle) = ctx.wakeup_handle() else {
        t.fail("wakeup handle", "channel inactive");
        return;
    };

    let signaler = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        handle.notify()
    });
    let start = Instant::now();
    let outcome = ctx.wait();
    let notified = signaler.join().map(|r| r.is_ok()).unwrap_or(false);
    kinfo!("cross-thread wakeup after {:?}", start.elapsed());

    match outcome {
        Ok(out) => t.check(
            "cross-thread signal interrupts wait",
            notified && out.woken && conn.borrow().hits == 0,
            "wait did not report wakeup",
        ),
        Err(e) => t.fail("cross-thread signal interrupts wait", &e.to_string()),
    }
    t.check("no error after wakeup", !ctx.has_error(), "error recorded");
}

fn main() {
    println!("=== gearloop Universal Context Smoke Test ===");
    gearloop::init_logging();

    let mut t = TestRunner::new();

    test_setup(&mut t);
    test_registries(&mut t);
    test_readiness(&mut t);
    test_wakeup(&mut t);

    t.summary();
    if t.failed > 0 {
        std::process::exit(1);
    }
}
