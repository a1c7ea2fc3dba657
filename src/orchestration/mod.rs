//! Report orchestration: starting-snapshot lookup, genesis bootstrap and
//! per-scope run serialization.

pub mod service;

pub use service::{ReportService, DEFAULT_GENESIS_MS};
