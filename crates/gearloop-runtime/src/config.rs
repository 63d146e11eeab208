//! Universal context configuration

use std::time::Duration;

use gearloop_core::env::{env_get_bool, env_get_opt, env_is_set};
use gearloop_core::options::UniversalOption;
use gearloop_core::verbose::Verbose;

/// Configuration applied by [`UniversalContext::from_config`](crate::UniversalContext::from_config)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniversalConfig {
    /// Options switched on at construction
    pub options: Vec<UniversalOption>,

    /// Readiness wait timeout; `None` waits forever (default)
    pub timeout: Option<Duration>,

    /// Verbosity threshold for the log hook (default: `Never`)
    pub verbose: Verbose,

    /// Prefix collaborators put in front of queue/function names
    pub namespace: Option<String>,

    /// Create the wakeup channel at construction
    pub wakeup: bool,

    /// Cap on descriptor-table capacity kept between waits; `None` keeps
    /// the high-water mark (default)
    pub max_retained_descriptors: Option<usize>,
}

impl UniversalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `GEARLOOP_*` environment variables.
    ///
    /// - `GEARLOOP_TIMEOUT_MS` - wait timeout, negative waits forever
    /// - `GEARLOOP_NON_BLOCKING`, `GEARLOOP_DONT_TRACK_PACKETS` - option flags
    /// - `GEARLOOP_VERBOSE` - never, fatal, error, warning, notice, info, debug
    /// - `GEARLOOP_NAMESPACE` - namespace prefix
    /// - `GEARLOOP_WAKEUP` - activate the wakeup channel
    /// - `GEARLOOP_MAX_DESCRIPTORS` - retained descriptor capacity cap
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_get_opt::<i64>("GEARLOOP_TIMEOUT_MS") {
            config.timeout = u64::try_from(ms).ok().map(Duration::from_millis);
        }
        if env_get_bool("GEARLOOP_NON_BLOCKING", false) {
            config.options.push(UniversalOption::NonBlocking);
        }
        if env_get_bool("GEARLOOP_DONT_TRACK_PACKETS", false) {
            config.options.push(UniversalOption::DontTrackPackets);
        }
        if let Some(verbose) = env_get_opt::<Verbose>("GEARLOOP_VERBOSE") {
            config.verbose = verbose;
        }
        if env_is_set("GEARLOOP_NAMESPACE") {
            config.namespace = env_get_opt::<String>("GEARLOOP_NAMESPACE").filter(|s| !s.is_empty());
        }
        config.wakeup = env_get_bool("GEARLOOP_WAKEUP", false);
        config.max_retained_descriptors = env_get_opt("GEARLOOP_MAX_DESCRIPTORS");

        config
    }

    /// Switch an option on at construction
    pub fn option(mut self, option: UniversalOption) -> Self {
        if !self.options.contains(&option) {
            self.options.push(option);
        }
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: Verbose) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn wakeup(mut self, enable: bool) -> Self {
        self.wakeup = enable;
        self
    }

    pub fn max_retained_descriptors(mut self, cap: Option<usize>) -> Self {
        self.max_retained_descriptors = cap;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(ns) = &self.namespace {
            if ns.is_empty() {
                return Err("namespace must not be empty (use None)");
            }
        }
        if self.max_retained_descriptors == Some(0) {
            return Err("max_retained_descriptors must be at least 1");
        }
        Ok(())
    }
}

/// Timeout as the millisecond argument of `poll(2)`.
///
/// `None` maps to -1. Sub-millisecond remainders round up so a tiny
/// non-zero timeout never turns into a busy poll; values beyond
/// `i32::MAX` ms are clamped.
pub fn timeout_to_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let mut ms = d.as_millis();
            if d.subsec_nanos() % 1_000_000 != 0 {
                ms += 1;
            }
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}
