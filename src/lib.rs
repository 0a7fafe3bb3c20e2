//! driftgate: policy-gated drift detection for governance checks.
//!
//! Each definition names a shell pipeline (e.g. "list IAM policies"). A pass
//! runs every pipeline through a whitelist/blacklist [`policy::PolicyGate`],
//! diffs the output line by line against the stored baseline, and fires the
//! definition's alert when more lines changed than its limit allows. The
//! baseline is then replaced so the same delta never alerts twice.
//!
//! # Architecture
//!
//! - **[`policy`]**: whitelist/blacklist gate, regex or substring matching.
//! - **[`exec`]**: gated shell execution with per-process stdout capture.
//! - **[`baseline`]**: `.<name>` baseline files with atomic replace.
//! - **[`drift`]**: Myers line diff and the change count.
//! - **[`alert`]**: force-alert templates and the symbolic alert table.
//! - **[`registry`]**: section-file parsing and `[input]` materialization.
//! - **[`engine`]**: sequential/parallel passes and the serverless handler.
//! - **[`config`]**: embedded defaults + user overlay merge.
//! - **[`logging`]**: terminal and hourly file logging.

/// Alert dispatch on threshold breach.
pub mod alert;
/// Baseline records, one dotfile per definition.
pub mod baseline;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Line diff and drift scoring.
pub mod drift;
/// Evaluation passes and entrypoints.
pub mod engine;
/// Crate error type.
pub mod error;
/// Policy-gated command execution.
pub mod exec;
/// Terminal and file logging setup.
pub mod logging;
/// Whitelist/blacklist admission control.
pub mod policy;
/// Definitions, policy lists, and materialization.
pub mod registry;

pub use engine::{Engine, PassSummary, handle_request};
pub use error::{Error, Result};

/// Build an engine from `config` using the network fetcher and run one pass.
///
/// This is the main entry point for simple usage. Hosts that evaluate
/// repeatedly should build an [`Engine`] once and call
/// [`handle_request`] per trigger.
pub fn evaluate_all(config: &config::Config) -> Result<PassSummary> {
    Engine::from_config(config, &registry::NetworkFetcher)?.evaluate_all()
}
