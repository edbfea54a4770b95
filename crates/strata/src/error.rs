//! Error types for Strata operations.
//!
//! [`LayoutError`] covers everything that can go wrong between building the
//! layout request and reconciling the engine response. [`StrataError`] is the
//! type returned to callers: fatal layout errors reach it as
//! [`StrataError::Render`], carrying the diagram source and the engine
//! version so the failure can be reproduced.

use std::io;

use thiserror::Error;

use strata_core::model::ShapeType;

use crate::engine::{EngineError, ProcessState};

/// Errors raised while building, submitting or solving a layout request.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout engine returned an empty document")]
    EmptyResponse,

    #[error("layout engine did not terminate normally ({state}){}", cause_suffix(.cause))]
    Timeout {
        state: ProcessState,
        cause: Option<String>,
    },

    #[error("response has no `<svg width=\"..pt\" height=\"..pt\"` header")]
    MissingHeader,

    #[error("no geometry found for shape `{uid}`")]
    MissingShape { uid: String },

    #[error("cannot read geometry of shape {} for entity `{entity}`", .shape.name())]
    UnrecognizedShape { shape: ShapeType, entity: String },

    #[error("cannot find color {color} in response")]
    UnlocatableColor { color: String },

    #[error("malformed `{attribute}` attribute at offset {offset}")]
    MalformedAttribute {
        attribute: &'static str,
        offset: usize,
    },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("link `{link}` has no laid-out endpoint `{entity}`")]
    UnresolvedEndpoint { link: String, entity: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn cause_suffix(cause: &Option<String>) -> String {
    cause
        .as_ref()
        .map(|cause| format!(": {cause}"))
        .unwrap_or_default()
}

impl LayoutError {
    /// Returns true for errors that can only come from a construction bug or
    /// an incompatible engine version, never from user input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader
                | Self::MissingShape { .. }
                | Self::UnrecognizedShape { .. }
                | Self::UnlocatableColor { .. }
                | Self::MalformedAttribute { .. }
                | Self::InvalidOperation(_)
        )
    }
}

/// The main error type for Strata operations.
#[derive(Debug, Error)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A fatal layout failure for one diagram.
    #[error("{err}")]
    Render {
        err: LayoutError,
        src: String,
        engine_version: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(Box<dyn std::error::Error>),
}

impl From<crate::export::Error> for StrataError {
    fn from(error: crate::export::Error) -> Self {
        Self::Export(Box::new(error))
    }
}

impl StrataError {
    /// Create a new `Render` error with the associated source text.
    pub fn new_render_error(
        err: LayoutError,
        src: impl Into<String>,
        engine_version: Option<String>,
    ) -> Self {
        Self::Render {
            err,
            src: src.into(),
            engine_version,
        }
    }
}
