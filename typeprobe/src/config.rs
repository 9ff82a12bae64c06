//! Harvest configuration
//!
//! Loaded from a TOML file; every key is optional.
//!
//! ```toml
//! include-builtins = true
//! deny = ["eval", "exec", "open"]
//! match-mode = "substring"
//! binary-ops = ["+", "-", "==", "<"]
//! unary-ops = ["-", "not"]
//! probe-timeout-ms = 50
//! worker-limit = 16
//! layout = "flat"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};
use crate::kb::Layout;
use crate::members::{Exclusions, MatchMode};
use crate::runtime::sandbox::DEFAULT_WORKER_LIMIT;
use crate::runtime::{BinaryOp, UnaryOp};

/// Names that evaluate code, touch the process or the terminal, or are
/// too slow to probe.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "open",
    "input",
    "print",
    "help",
    "breakpoint",
    "exit",
    "quit",
    "system",
    "fork",
    "kill",
    "pow",
];

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProbeConfig {
    pub include_builtins: bool,
    pub include_locals: bool,
    pub deny: Vec<String>,
    pub match_mode: MatchMode,
    pub skip_dunder: bool,
    pub binary_ops: Vec<BinaryOp>,
    pub unary_ops: Vec<UnaryOp>,
    pub probe_timeout_ms: u64,
    /// Sandbox worker threads alive at once, stalled ones included.
    pub worker_limit: usize,
    pub layout: Layout,
    pub pretty: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            include_builtins: true,
            include_locals: true,
            deny: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            match_mode: MatchMode::Substring,
            skip_dunder: true,
            binary_ops: BinaryOp::ALL.to_vec(),
            unary_ops: UnaryOp::ALL.to_vec(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            worker_limit: DEFAULT_WORKER_LIMIT,
            layout: Layout::Grouped,
            pretty: true,
        }
    }
}

impl ProbeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ProbeError::io(path, e))?;
        Self::parse(&text).map_err(|e| match e {
            ProbeError::Config { message, .. } => ProbeError::config(path, message),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ProbeError::config("<inline>", e.to_string()))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn exclusions(&self) -> Exclusions {
        Exclusions::new(self.deny.clone(), self.match_mode, self.skip_dunder)
    }
}
