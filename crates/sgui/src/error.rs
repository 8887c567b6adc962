//! Error types for the reconciler.

use thiserror::Error;

/// Errors surfaced by reconciliation, host operations, and user hooks.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A component's render function failed.
    #[error("render failed for `{kind}`: {message}")]
    Render { kind: String, message: String },

    /// A lifecycle hook failed.
    #[error("lifecycle hook `{hook}` failed for `{kind}`: {message}")]
    Lifecycle {
        kind: String,
        hook: &'static str,
        message: String,
    },

    /// A host scene operation failed.
    #[error("host operation `{op}` failed: {message}")]
    Host { op: &'static str, message: String },

    /// Module import through the host failed.
    #[error("module import failed: {0}")]
    ModuleImport(String),

    /// Scene bootstrap could not produce a scene module.
    #[error("scene initialization failed: {0}")]
    SceneInit(String),

    /// An operation required an initialized scene.
    #[error("scene is not initialized")]
    SceneNotInitialized,

    /// An operation required a mounted element.
    #[error("element is not mounted")]
    Unmounted,

    /// Internal bookkeeping invariant violated; indicates engine bugs or
    /// caller misuse (e.g. an element foreign to the tree). Not retryable.
    #[error("structural invariant violated: {0}")]
    Structural(String),
}

impl Error {
    pub fn render(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn host(op: &'static str, message: impl Into<String>) -> Self {
        Self::Host {
            op,
            message: message.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;
