use gantry_core::GatewayKey;
use gantry_gateway::GatewayError;
use std::fmt;
use thiserror::Error;

/// Per-key reconciliation step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Read,
    Upstream,
    Targets,
    Service,
    AuthPlugin,
    Route,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Read => "read",
            Step::Upstream => "upstream",
            Step::Targets => "targets",
            Step::Service => "service",
            Step::AuthPlugin => "auth-plugin",
            Step::Route => "route",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why reconciliation of one gateway key stopped early.
///
/// Scoped to that key: the other keys of the cycle still run, and the next
/// cycle retries from the top.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{key}: {step} step failed: {source}")]
    Step {
        key: GatewayKey,
        step: Step,
        #[source]
        source: GatewayError,
    },

    #[error("{key}: gateway paths {paths:?} map to the same key")]
    KeyCollision { key: GatewayKey, paths: Vec<String> },
}

impl ReconcileError {
    pub fn key(&self) -> &GatewayKey {
        match self {
            ReconcileError::Step { key, .. } | ReconcileError::KeyCollision { key, .. } => key,
        }
    }

    /// The failed step; `None` when the key was refused before any step ran.
    pub fn step(&self) -> Option<Step> {
        match self {
            ReconcileError::Step { step, .. } => Some(*step),
            ReconcileError::KeyCollision { .. } => None,
        }
    }
}
