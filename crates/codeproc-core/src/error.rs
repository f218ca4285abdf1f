//! Error kinds raised by the engine
//!
//! [`InternalError`] marks a broken contract between the engine and its
//! collaborators and aborts the whole pass. [`PluginError`] is handed back to
//! a plugin that misused the callback surface; the pass carries on.

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalError {
    #[error("malformed node info for rule '{rule}' at line {line}: {reason}")]
    MalformedNodeInfo {
        rule: &'static str,
        line: usize,
        reason: String,
    },
    #[error("malformed {what}: {reason}")]
    MalformedNode { what: String, reason: String },
    #[error("unknown rule '{name}' at line {line}")]
    UnknownRule { name: String, line: usize },
    #[error("cannot exit scope: the scope stack is empty")]
    ScopeStackUnderflow,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("invalid context: {0} is only available inside a rule callback")]
    InvalidContext(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("fatal error in pass '{pass}': {source}")]
    Internal {
        pass: String,
        #[source]
        source: InternalError,
    },
}

impl ProcessError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessError::Internal { .. })
    }
}
