//! # UniversalContext - shared state of one client or server instance
//!
//! Every higher-level operation (submit job, fetch result, register
//! worker) is handed the same context. It owns:
//!
//! - the mode flags and the single error slot
//! - the connection and packet registries
//! - the descriptor table and the wakeup channel
//! - the allocator, log hook, verbosity, timeout and namespace
//!
//! It does NOT own connections or packets. Those belong to the protocol
//! layer that created them; the registries hold `Rc` clones, and
//! unregistering (or dropping the context) only drops those clones.
//!
//! ## Threading
//!
//! One thread drives a context (`UniversalContext` is `!Send`). The only
//! thing another thread may touch is a [`WakeupHandle`], which interrupts
//! a blocked [`wait`](UniversalContext::wait).
//!
//! ## Errors
//!
//! Every fallible method returns a typed `UniversalResult` *and* records
//! the failure in the error slot, which the `error_*` accessors expose.
//! The slot holds only the most recent failure.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use gearloop_core::error::{ErrorState, ReturnCode, UniversalError, UniversalResult};
use gearloop_core::id::{ConnectionId, PacketId};
use gearloop_core::kprint;
use gearloop_core::options::{OptionSet, UniversalOption};
use gearloop_core::registry::Registry;
use gearloop_core::traits::{Allocator, Connection, LogHook};
use gearloop_core::verbose::Verbose;

use crate::allocator::HeapAllocator;
use crate::config::{timeout_to_millis, UniversalConfig};
use crate::poll::{Multiplexer, WaitOutcome};
use crate::wakeup::{WakeupChannel, WakeupHandle};

/// Shared reference to an externally owned connection
pub type ConnectionRef = Rc<RefCell<dyn Connection>>;

/// Shared reference to an externally owned packet
pub type PacketRef = Rc<dyn Any>;

pub struct UniversalContext {
    options: OptionSet,
    error: ErrorState,
    verbose: Verbose,
    timeout: Option<Duration>,

    /// Sends started by collaborators and not yet completed
    sending: u32,

    connections: Registry<ConnectionRef>,
    packets: Registry<PacketRef>,

    /// Option strings sent to job servers on (re)connect, in order
    server_options: Vec<String>,

    mux: Multiplexer,
    allocator: Arc<dyn Allocator>,
    log_hook: Option<Box<dyn LogHook>>,
    namespace: Option<String>,
    wakeup: WakeupChannel,
}

impl UniversalContext {
    /// Context with every option off, infinite timeout, no wakeup channel
    pub fn new() -> Self {
        Self {
            options: OptionSet::new(),
            error: ErrorState::new(),
            verbose: Verbose::Never,
            timeout: None,
            sending: 0,
            connections: Registry::new(),
            packets: Registry::new(),
            server_options: Vec::new(),
            mux: Multiplexer::new(),
            allocator: Arc::new(HeapAllocator::new()),
            log_hook: None,
            namespace: None,
            wakeup: WakeupChannel::new(),
        }
    }

    /// Context with the given options switched on
    pub fn with_options(options: &[UniversalOption]) -> Self {
        let mut ctx = Self::new();
        for &opt in options {
            ctx.options.set(opt, true);
        }
        ctx
    }

    /// Context seeded from raw option identifiers.
    ///
    /// Each identifier is applied on its own; unknown ones are skipped
    /// without touching the error slot.
    pub fn with_raw_options(raw: &[u32]) -> Self {
        let mut ctx = Self::new();
        for &id in raw {
            let _ = ctx.options.set_raw(id, true);
        }
        ctx
    }

    /// Context built from a configuration.
    ///
    /// Fails with `InvalidArgument` for an invalid configuration, or when
    /// the wakeup channel was requested and the pipe could not be created.
    pub fn from_config(config: UniversalConfig) -> UniversalResult<Self> {
        config.validate().map_err(UniversalError::InvalidArgument)?;
        let mut ctx = Self::with_options(&config.options);
        ctx.timeout = config.timeout;
        ctx.verbose = config.verbose;
        ctx.namespace = config.namespace.filter(|ns| !ns.is_empty());
        ctx.mux.set_max_retained(config.max_retained_descriptors);
        if config.wakeup {
            ctx.activate_wakeup()?;
        }
        Ok(ctx)
    }

    /// Record `err` in the error slot and hand it back for returning
    fn fail(&mut self, err: UniversalError) -> UniversalError {
        self.error.record(&err);
        err
    }

    fn check<T>(&mut self, result: UniversalResult<T>) -> UniversalResult<T> {
        result.map_err(|e| self.fail(e))
    }

    // ── Error slot ──────────────────────────────────────────────────

    #[inline]
    pub fn has_error(&self) -> bool {
        self.error.has_error()
    }

    /// Current message, `None` when no error is held
    pub fn error_message(&self) -> Option<&str> {
        self.error.message()
    }

    #[inline]
    pub fn error_code(&self) -> ReturnCode {
        self.error.code()
    }

    #[inline]
    pub fn last_errno(&self) -> i32 {
        self.error.last_errno()
    }

    pub fn reset_error(&mut self) {
        self.error.reset();
    }

    /// Overwrite the slot on behalf of a collaborator
    pub fn set_error(&mut self, code: ReturnCode, errno: i32, message: &str) {
        self.error.set(code, errno, message);
    }

    // ── Mode ────────────────────────────────────────────────────────

    #[inline]
    pub fn is_non_blocking(&self) -> bool {
        self.options.is_non_blocking()
    }

    pub fn set_non_blocking(&mut self, value: bool) {
        self.options.set(UniversalOption::NonBlocking, value);
    }

    /// Whether packet registration is tracked (`DontTrackPackets` off)
    #[inline]
    pub fn is_tracking_packets(&self) -> bool {
        !self.options.dont_track_packets()
    }

    pub fn options(&self) -> OptionSet {
        self.options
    }

    pub fn set_option(&mut self, option: UniversalOption, value: bool) {
        self.options.set(option, value);
    }

    /// Set an option from its raw identifier.
    ///
    /// Unknown identifiers fail with `InvalidOption` and change nothing.
    pub fn set_raw_option(&mut self, raw: u32, value: bool) -> UniversalResult<()> {
        let result = self.options.set_raw(raw, value);
        self.check(result)
    }

    /// Apply several raw options in order.
    ///
    /// Each one is applied independently: a failure does not roll back
    /// the ones before it, and the ones after it are still applied. The
    /// first failure is returned (and the last one is left in the slot).
    pub fn set_options(&mut self, raw: &[u32], value: bool) -> UniversalResult<()> {
        let mut first_err = None;
        for &id in raw {
            if let Err(e) = self.set_raw_option(id, value) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ── Timeout & verbosity ─────────────────────────────────────────

    /// Wait timeout; `None` blocks indefinitely
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn verbose(&self) -> Verbose {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: Verbose) {
        self.verbose = verbose;
    }

    // ── Logging ─────────────────────────────────────────────────────

    /// Install a log hook and the verbosity it should receive
    pub fn set_log_hook<H>(&mut self, hook: H, verbose: Verbose)
    where
        H: LogHook + 'static,
    {
        self.log_hook = Some(Box::new(hook));
        self.verbose = verbose;
    }

    pub fn clear_log_hook(&mut self) {
        self.log_hook = None;
    }

    pub fn has_log_hook(&self) -> bool {
        self.log_hook.is_some()
    }

    /// Deliver a diagnostic for a collaborator.
    ///
    /// Filtered by the context verbosity, then sent to the hook, or to
    /// stderr when no hook is installed. The engine never calls this.
    pub fn log(&mut self, level: Verbose, args: fmt::Arguments<'_>) {
        if !self.verbose.admits(level) {
            return;
        }
        match self.log_hook.as_mut() {
            Some(hook) => hook.log(level, &args),
            None => kprint::default_sink(level, &args),
        }
    }

    // ── Allocator ───────────────────────────────────────────────────

    pub fn allocator(&self) -> Arc<dyn Allocator> {
        Arc::clone(&self.allocator)
    }

    pub fn set_allocator(&mut self, allocator: Arc<dyn Allocator>) {
        self.allocator = allocator;
    }

    /// Zeroed buffer from the context allocator
    pub fn allocate_buffer(&mut self, len: usize) -> UniversalResult<Vec<u8>> {
        let result = self
            .allocator
            .allocate(len)
            .ok_or(UniversalError::AllocationFailed("buffer"));
        self.check(result)
    }

    /// Resize a buffer obtained from [`allocate_buffer`](Self::allocate_buffer)
    pub fn reallocate_buffer(&mut self, buf: Vec<u8>, new_len: usize) -> UniversalResult<Vec<u8>> {
        let result = self
            .allocator
            .reallocate(buf, new_len)
            .ok_or(UniversalError::AllocationFailed("buffer"));
        self.check(result)
    }

    pub fn release_buffer(&self, buf: Vec<u8>) {
        self.allocator.release(buf);
    }

    // ── Namespace ───────────────────────────────────────────────────

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Set or clear the namespace; an empty string clears it
    pub fn set_namespace(&mut self, namespace: Option<&str>) {
        self.namespace = namespace.filter(|ns| !ns.is_empty()).map(str::to_owned);
    }

    /// `name` with the namespace prefix applied
    pub fn apply_namespace(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}{}", ns, name),
            None => name.to_owned(),
        }
    }

    // ── Server options ──────────────────────────────────────────────

    /// Append a server option. Duplicates are ignored.
    pub fn add_server_option(&mut self, option: &str) -> UniversalResult<()> {
        if option.is_empty() {
            return Err(self.fail(UniversalError::InvalidArgument("empty server option")));
        }
        if self.server_options.iter().any(|o| o == option) {
            return Ok(());
        }
        if self.server_options.try_reserve(1).is_err() {
            return Err(self.fail(UniversalError::AllocationFailed("server option")));
        }
        self.server_options.push(option.to_owned());
        Ok(())
    }

    /// Remove a server option; returns whether it was present
    pub fn remove_server_option(&mut self, option: &str) -> bool {
        match self.server_options.iter().position(|o| o == option) {
            Some(pos) => {
                self.server_options.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn server_options(&self) -> impl Iterator<Item = &str> + '_ {
        self.server_options.iter().map(String::as_str)
    }

    pub fn server_option_count(&self) -> usize {
        self.server_options.len()
    }

    // ── Send accounting ─────────────────────────────────────────────

    pub fn begin_send(&mut self) {
        self.sending = self.sending.saturating_add(1);
    }

    pub fn end_send(&mut self) {
        self.sending = self.sending.saturating_sub(1);
    }

    pub fn sending(&self) -> u32 {
        self.sending
    }

    // ── Connections ─────────────────────────────────────────────────

    /// Add a connection to the multiplexed set
    pub fn register_connection(&mut self, conn: ConnectionRef) -> UniversalResult<ConnectionId> {
        let result = self.connections.insert(conn).map(ConnectionId::from);
        self.check(result)
    }

    /// Remove a connection; the caller keeps ownership of it.
    ///
    /// Unknown or stale ids return `None` and change nothing.
    pub fn unregister_connection(&mut self, id: ConnectionId) -> Option<ConnectionRef> {
        self.connections.remove(id.into())
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionRef> {
        self.connections.get(id.into())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Registered connections in registry order (no ordering guarantee)
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &ConnectionRef)> + '_ {
        self.connections.iter().map(|(h, c)| (ConnectionId::from(h), c))
    }

    // ── Packets ─────────────────────────────────────────────────────

    /// Track an outstanding packet.
    ///
    /// With `DontTrackPackets` set this is a successful no-op returning
    /// `PacketId::NONE`.
    pub fn register_packet(&mut self, packet: PacketRef) -> UniversalResult<PacketId> {
        if !self.is_tracking_packets() {
            return Ok(PacketId::NONE);
        }
        let result = self.packets.insert(packet).map(PacketId::from);
        self.check(result)
    }

    /// Stop tracking a packet.
    ///
    /// A no-op with `DontTrackPackets` set, for `NONE`, and for unknown
    /// or stale ids.
    pub fn unregister_packet(&mut self, id: PacketId) -> Option<PacketRef> {
        if !self.is_tracking_packets() || id.is_none() {
            return None;
        }
        self.packets.remove(id.into())
    }

    pub fn packet(&self, id: PacketId) -> Option<&PacketRef> {
        self.packets.get(id.into())
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn packets(&self) -> impl Iterator<Item = (PacketId, &PacketRef)> + '_ {
        self.packets.iter().map(|(h, p)| (PacketId::from(h), p))
    }

    // ── Wakeup ──────────────────────────────────────────────────────

    pub fn activate_wakeup(&mut self) -> UniversalResult<()> {
        let result = self.wakeup.activate();
        self.check(result)
    }

    /// Close the wakeup pipe; outstanding handles become no-ops
    pub fn deactivate_wakeup(&mut self) -> bool {
        self.wakeup.deactivate()
    }

    pub fn is_wakeup_active(&self) -> bool {
        self.wakeup.is_active()
    }

    /// Signal from the owning thread.
    ///
    /// Returns `Ok(false)` when the channel is inactive.
    pub fn signal_wakeup(&mut self) -> UniversalResult<bool> {
        let result = self.wakeup.signal();
        self.check(result)
    }

    /// Handle for other threads, when the channel is active
    pub fn wakeup_handle(&self) -> Option<WakeupHandle> {
        self.wakeup.handle()
    }

    // ── Readiness ───────────────────────────────────────────────────

    /// Wait for readiness on every registered connection.
    ///
    /// Blocks up to the configured timeout. With no connection registered
    /// it returns at once, unless the wakeup channel is active and the
    /// timeout is finite; then only the wakeup is watched. Connection
    /// callbacks run in table order;
    /// the first failing one ends the cycle with `CallbackFailed`, and the
    /// error slot then holds the callback's own code.
    pub fn wait(&mut self) -> UniversalResult<WaitOutcome> {
        let timeout_ms = timeout_to_millis(self.timeout);
        let result = self.mux.wait(&self.connections, &self.wakeup, timeout_ms);
        self.check(result)
    }

    /// Descriptor-table capacity reached so far
    pub fn descriptor_capacity(&self) -> usize {
        self.mux.capacity()
    }

    /// Descriptors watched in the last wait
    pub fn descriptor_count(&self) -> usize {
        self.mux.len()
    }
}

impl Default for UniversalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UniversalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniversalContext")
            .field("options", &self.options)
            .field("error", &self.error)
            .field("verbose", &self.verbose)
            .field("timeout", &self.timeout)
            .field("sending", &self.sending)
            .field("connections", &self.connections.len())
            .field("packets", &self.packets.len())
            .field("server_options", &self.server_options)
            .field("descriptor_capacity", &self.mux.capacity())
            .field("allocator", &self.allocator.name())
            .field("log_hook", &self.log_hook.is_some())
            .field("namespace", &self.namespace)
            .field("wakeup", &self.wakeup.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearloop_core::events::Events;
    use gearloop_core::traits::{Connection, Notifier};
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    struct SockConn {
        stream: UnixStream,
        interest: Events,
        seen: Vec<Events>,
        reply: ReturnCode,
    }

    impl Connection for SockConn {
        fn descriptor(&self) -> libc::c_int {
            self.stream.as_raw_fd()
        }

        fn interest(&self) -> Events {
            self.interest
        }

        fn on_events(&mut self, events: Events) -> ReturnCode {
            self.seen.push(events);
            self.reply
        }
    }

    fn sock_pair() -> (Rc<RefCell<SockConn>>, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        let conn = Rc::new(RefCell::new(SockConn {
            stream: a,
            interest: Events::READABLE,
            seen: Vec::new(),
            reply: ReturnCode::Success,
        }));
        (conn, b)
    }

    fn assert_counts(ctx: &UniversalContext) {
        assert_eq!(ctx.connection_count(), ctx.connections().count());
        assert_eq!(ctx.packet_count(), ctx.packets().count());
    }

    #[test]
    fn test_new_context_defaults() {
        let ctx = UniversalContext::new();
        assert!(!ctx.is_non_blocking());
        assert!(ctx.is_tracking_packets());
        assert!(!ctx.has_error());
        assert_eq!(ctx.error_code(), ReturnCode::Success);
        assert!(ctx.error_message().is_none());
        assert_eq!(ctx.timeout(), None);
        assert_eq!(ctx.verbose(), Verbose::Never);
        assert_eq!(ctx.connection_count(), 0);
        assert_eq!(ctx.packet_count(), 0);
        assert!(!ctx.is_wakeup_active());
        assert!(ctx.namespace().is_none());
    }

    #[test]
    fn test_register_wait_unregister_three() {
        let mut ctx = UniversalContext::new();
        assert!(!ctx.is_non_blocking());
        ctx.set_timeout(Some(Duration::ZERO));

        let mut peers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (conn, peer) = sock_pair();
            ids.push(ctx.register_connection(conn).unwrap());
            peers.push(peer);
            assert_counts(&ctx);
        }
        assert_eq!(ctx.connection_count(), 3);

        let out = ctx.wait().unwrap();
        assert!(out.timed_out);
        assert_eq!(ctx.descriptor_capacity(), 3);
        assert_eq!(ctx.descriptor_count(), 3);

        ctx.activate_wakeup().unwrap();
        ctx.wait().unwrap();
        assert_eq!(ctx.descriptor_capacity(), 4);

        for id in ids {
            assert!(ctx.unregister_connection(id).is_some());
            assert_counts(&ctx);
        }
        assert_eq!(ctx.connection_count(), 0);
    }

    #[test]
    fn test_initial_non_blocking() {
        let ctx = UniversalContext::with_options(&[UniversalOption::NonBlocking]);
        assert!(ctx.is_non_blocking());
        assert!(ctx.is_tracking_packets());

        let ctx = UniversalContext::with_raw_options(&[99, UniversalOption::NonBlocking.as_u32()]);
        assert!(ctx.is_non_blocking());
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_double_signal_then_idle_waits() {
        let mut ctx = UniversalContext::new();
        ctx.activate_wakeup().unwrap();
        assert_eq!(ctx.signal_wakeup(), Ok(true));
        assert_eq!(ctx.signal_wakeup(), Ok(true));

        let start = Instant::now();
        let out = ctx.wait().unwrap();
        assert!(out.woken);
        assert_eq!(out.dispatched, 0);

        let out = ctx.wait().unwrap();
        assert!(!out.woken);
        assert!(out.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_signal_leftover_is_drained_with_connections() {
        let mut ctx = UniversalContext::new();
        let (conn, _peer) = sock_pair();
        ctx.register_connection(conn).unwrap();
        ctx.activate_wakeup().unwrap();
        ctx.signal_wakeup().unwrap();
        ctx.signal_wakeup().unwrap();

        let out = ctx.wait().unwrap();
        assert!(out.woken);
        assert_eq!(out.dispatched, 0);

        ctx.set_timeout(Some(Duration::ZERO));
        let out = ctx.wait().unwrap();
        assert!(!out.woken);
        assert!(out.timed_out);
    }

    #[test]
    fn test_callback_failure_sets_error_code() {
        let mut ctx = UniversalContext::new();
        let (conn, mut peer) = sock_pair();
        conn.borrow_mut().reply = ReturnCode::LostConnection;
        ctx.register_connection(conn.clone()).unwrap();
        peer.write_all(b"job").unwrap();

        let err = ctx.wait().unwrap_err();
        assert_eq!(err.code(), ReturnCode::CallbackFailed);
        assert_eq!(ctx.error_code(), ReturnCode::LostConnection);
        assert!(ctx.has_error());
        assert_eq!(conn.borrow().seen.len(), 1);

        // The connection is still registered; the caller decides what to do.
        assert_eq!(ctx.connection_count(), 1);

        ctx.reset_error();
        assert!(!ctx.has_error());
        assert!(ctx.error_message().is_none());
    }

    #[test]
    fn test_idle_wait_never_blocks() {
        let mut ctx = UniversalContext::new();
        assert_eq!(ctx.timeout(), None);

        let start = Instant::now();
        let out = ctx.wait().unwrap();
        assert!(out.idle);
        assert!(out.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_signal_from_other_thread_interrupts_wait() {
        let mut ctx = UniversalContext::new();
        ctx.set_timeout(Some(Duration::from_secs(5)));
        let (conn, _peer) = sock_pair();
        ctx.register_connection(conn.clone()).unwrap();
        ctx.activate_wakeup().unwrap();
        let handle = ctx.wakeup_handle().unwrap();

        let signaler = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.notify().unwrap();
        });

        let start = Instant::now();
        let out = ctx.wait().unwrap();
        signaler.join().unwrap();

        assert!(out.woken);
        assert!(!out.timed_out);
        assert_eq!(out.dispatched, 0);
        assert!(conn.borrow().seen.is_empty());
        assert!(!ctx.has_error());
        assert!(start.elapsed() < Duration::from_secs(5));

        ctx.set_timeout(Some(Duration::ZERO));
        assert!(!ctx.wait().unwrap().woken);
    }

    #[test]
    fn test_readiness_dispatch() {
        let mut ctx = UniversalContext::new();
        ctx.set_timeout(Some(Duration::from_secs(5)));
        let (quiet, _quiet_peer) = sock_pair();
        let (busy, mut busy_peer) = sock_pair();
        ctx.register_connection(quiet.clone()).unwrap();
        ctx.register_connection(busy.clone()).unwrap();

        busy_peer.write_all(b"x").unwrap();
        let out = ctx.wait().unwrap();

        assert_eq!(out.dispatched, 1);
        assert!(quiet.borrow().seen.is_empty());
        assert!(busy.borrow().seen[0].is_readable());
    }

    #[test]
    fn test_unknown_option_leaves_state() {
        let mut ctx = UniversalContext::new();
        ctx.set_option(UniversalOption::DontTrackPackets, true);

        let err = ctx.set_raw_option(7, true).unwrap_err();
        assert_eq!(err.code(), ReturnCode::InvalidOption);
        assert_eq!(ctx.error_code(), ReturnCode::InvalidOption);
        assert!(!ctx.is_non_blocking());
        assert!(!ctx.is_tracking_packets());
    }

    #[test]
    fn test_batch_options_apply_best_effort() {
        let mut ctx = UniversalContext::new();
        let err = ctx
            .set_options(&[0, 42, 1], true)
            .unwrap_err();

        assert_eq!(err, UniversalError::InvalidOption(42));
        assert!(ctx.is_non_blocking());
        assert!(!ctx.is_tracking_packets());
    }

    #[test]
    fn test_dont_track_packets() {
        let mut ctx = UniversalContext::new();
        let kept: PacketRef = Rc::new(String::from("SUBMIT_JOB"));
        let id = ctx.register_packet(kept.clone()).unwrap();
        assert_eq!(ctx.packet_count(), 1);

        ctx.set_option(UniversalOption::DontTrackPackets, true);

        let other = ctx.register_packet(Rc::new(5u32)).unwrap();
        assert!(other.is_none());
        assert_eq!(ctx.packet_count(), 1);

        assert!(ctx.unregister_packet(id).is_none());
        assert_eq!(ctx.packet_count(), 1);
        assert!(!ctx.has_error());

        ctx.set_option(UniversalOption::DontTrackPackets, false);
        let back = ctx.unregister_packet(id).unwrap();
        assert_eq!(back.downcast_ref::<String>().map(String::as_str), Some("SUBMIT_JOB"));
        assert_eq!(ctx.packet_count(), 0);
        assert_counts(&ctx);
    }

    #[test]
    fn test_context_only_drops_references() {
        let (conn, _peer) = sock_pair();
        let packet = Rc::new(vec![1u8, 2, 3]);
        {
            let mut ctx = UniversalContext::new();
            ctx.register_connection(conn.clone()).unwrap();
            ctx.register_packet(packet.clone()).unwrap();
            assert_eq!(Rc::strong_count(&conn), 2);
            assert_eq!(Rc::strong_count(&packet), 2);
        }
        assert_eq!(Rc::strong_count(&conn), 1);
        assert_eq!(Rc::strong_count(&packet), 1);
    }

    #[test]
    fn test_stale_connection_id() {
        let mut ctx = UniversalContext::new();
        let (a, _pa) = sock_pair();
        let (b, _pb) = sock_pair();

        let old = ctx.register_connection(a).unwrap();
        ctx.unregister_connection(old).unwrap();
        let new = ctx.register_connection(b).unwrap();

        assert!(ctx.unregister_connection(old).is_none());
        assert!(ctx.connection(new).is_some());
        assert_eq!(ctx.connection_count(), 1);
    }

    #[test]
    fn test_counts_hold_across_waits() {
        let mut ctx = UniversalContext::new();
        ctx.set_timeout(Some(Duration::ZERO));
        let mut live = Vec::new();

        for round in 0..12 {
            let (conn, peer) = sock_pair();
            let id = ctx.register_connection(conn).unwrap();
            live.push((id, peer));
            if round % 4 == 3 {
                let (id, _peer) = live.remove(1);
                ctx.unregister_connection(id).unwrap();
            }
            ctx.wait().unwrap();
            assert_eq!(ctx.connection_count(), live.len());
            assert_counts(&ctx);
        }
    }

    #[test]
    fn test_log_hook_filtering() {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);

        let mut ctx = UniversalContext::new();
        ctx.set_log_hook(
            move |level: Verbose, args: &fmt::Arguments<'_>| {
                sink.borrow_mut().push(format!("{}: {}", level, args));
            },
            Verbose::Info,
        );

        ctx.log(Verbose::Error, format_args!("lost {}", "server"));
        ctx.log(Verbose::Debug, format_args!("too chatty"));
        ctx.log(Verbose::Never, format_args!("never shown"));

        assert_eq!(*lines.borrow(), vec!["ERROR: lost server".to_string()]);
    }

    #[test]
    fn test_failures_do_not_reach_log_hook() {
        let lines = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&lines);

        let mut ctx = UniversalContext::new();
        ctx.set_log_hook(
            move |_: Verbose, _: &fmt::Arguments<'_>| *sink.borrow_mut() += 1,
            Verbose::Debug,
        );

        assert!(ctx.set_raw_option(7, true).is_err());
        assert!(ctx.add_server_option("").is_err());
        ctx.activate_wakeup().unwrap();
        ctx.signal_wakeup().unwrap();
        ctx.wait().unwrap();

        assert!(ctx.has_error());
        assert_eq!(*lines.borrow(), 0);
    }

    #[test]
    fn test_namespace() {
        let mut ctx = UniversalContext::new();
        assert_eq!(ctx.apply_namespace("reverse"), "reverse");

        ctx.set_namespace(Some("staging:"));
        assert_eq!(ctx.namespace(), Some("staging:"));
        assert_eq!(ctx.apply_namespace("reverse"), "staging:reverse");

        ctx.set_namespace(Some(""));
        assert!(ctx.namespace().is_none());
    }

    #[test]
    fn test_server_options() {
        let mut ctx = UniversalContext::new();
        ctx.add_server_option("exceptions").unwrap();
        ctx.add_server_option("exceptions").unwrap();
        ctx.add_server_option("priority").unwrap();
        assert_eq!(ctx.server_option_count(), 2);
        assert_eq!(
            ctx.server_options().collect::<Vec<_>>(),
            vec!["exceptions", "priority"]
        );

        let err = ctx.add_server_option("").unwrap_err();
        assert_eq!(err.code(), ReturnCode::InvalidArgument);
        assert!(ctx.has_error());

        assert!(ctx.remove_server_option("exceptions"));
        assert!(!ctx.remove_server_option("exceptions"));
        assert_eq!(ctx.server_option_count(), 1);
    }

    #[test]
    fn test_send_accounting() {
        let mut ctx = UniversalContext::new();
        ctx.begin_send();
        ctx.begin_send();
        assert_eq!(ctx.sending(), 2);
        ctx.end_send();
        ctx.end_send();
        ctx.end_send();
        assert_eq!(ctx.sending(), 0);
    }

    #[test]
    fn test_allocator_failure_recorded() {
        let mut ctx = UniversalContext::new();
        let buf = ctx.allocate_buffer(16).unwrap();
        assert_eq!(ctx.allocator().in_use(), 1);
        ctx.release_buffer(buf);

        let err = ctx.allocate_buffer(usize::MAX).unwrap_err();
        assert_eq!(err.code(), ReturnCode::AllocationFailed);
        assert_eq!(ctx.error_code(), ReturnCode::AllocationFailed);
    }

    struct Exhausted;

    impl Allocator for Exhausted {
        fn allocate(&self, _len: usize) -> Option<Vec<u8>> {
            None
        }

        fn reallocate(&self, _buf: Vec<u8>, _new_len: usize) -> Option<Vec<u8>> {
            None
        }

        fn release(&self, _buf: Vec<u8>) {}

        fn in_use(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_custom_allocator() {
        let mut ctx = UniversalContext::new();
        assert_eq!(ctx.allocator().name(), "heap");

        ctx.set_allocator(Arc::new(Exhausted));
        assert_eq!(ctx.allocator().name(), "custom");
        assert!(ctx.allocate_buffer(8).is_err());
        assert!(ctx.reallocate_buffer(vec![0; 4], 8).is_err());
        assert_eq!(ctx.error_code(), ReturnCode::AllocationFailed);
    }

    #[test]
    fn test_from_config() {
        let config = UniversalConfig::new()
            .option(UniversalOption::NonBlocking)
            .timeout(Some(Duration::from_millis(10)))
            .namespace("ns-")
            .wakeup(true)
            .max_retained_descriptors(Some(8));

        let ctx = UniversalContext::from_config(config).unwrap();
        assert!(ctx.is_non_blocking());
        assert_eq!(ctx.timeout(), Some(Duration::from_millis(10)));
        assert_eq!(ctx.namespace(), Some("ns-"));
        assert!(ctx.is_wakeup_active());

        let bad = UniversalConfig::new().max_retained_descriptors(Some(0));
        let err = UniversalContext::from_config(bad).unwrap_err();
        assert_eq!(err.code(), ReturnCode::InvalidArgument);
    }

    #[test]
    fn test_set_error_by_collaborator() {
        let mut ctx = UniversalContext::new();
        ctx.set_error(ReturnCode::Timeout, 0, "no response from server");
        assert_eq!(ctx.error_message(), Some("no response from server"));
        assert_eq!(ctx.error_code(), ReturnCode::Timeout);

        ctx.set_error(ReturnCode::Success, 0, "");
        assert!(!ctx.has_error());
    }
}
