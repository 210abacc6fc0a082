//! Error Types
//!
//! This module defines the error types used throughout the render task graph.
//!
//! # Overview
//!
//! Failures fall into four classes, and each class maps onto a dedicated
//! enum so callers can react to them differently:
//!
//! - **Wiring errors** ([`GraphError`]): raised while a task is being built
//!   (duplicate job names, varyings from another graph) or when a varying is
//!   read before it was produced. Fatal; no partial graph is returned.
//! - **Precondition violations** ([`RenderError::MissingViewFrustum`],
//!   [`GpuError::NoActiveFrame`], [`GpuError::TimerMismatch`]): abort the
//!   current frame.
//! - **Resource failures** ([`GpuError::InvalidFramebufferSize`] and
//!   friends): jobs catch these, log them and fall back to a previous or
//!   placeholder resource.
//! - **Configuration errors** ([`ConfigError`]): unknown paths or malformed
//!   JSON handed to the config registry. Out-of-range values are not errors;
//!   they are clamped.
//!
//! # Usage
//!
//! Graph-level APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RenderError>`. Every narrower error converts into
//! [`RenderError`] with `?`.
//!
//! ```rust,ignore
//! use umbra_core::errors::Result;
//!
//! fn build_view() -> Result<()> {
//!     let (task, _) = Task::build("RenderMainView", |b, input| { /* ... */ Ok(()) })?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Errors raised while wiring or evaluating a task graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two jobs in the same task share a name.
    #[error("Duplicate job name '{name}' in task '{task}'")]
    DuplicateJobName {
        /// Path of the task that already owns the name.
        task: String,
        /// The rejected job name.
        name: String,
    },

    /// A varying created by one graph was handed to a job of another graph.
    #[error("Job '{job}' consumes a varying from graph {found} but belongs to graph {expected}")]
    ForeignVarying {
        /// Job being registered.
        job: String,
        /// Graph id of the task under construction.
        expected: u64,
        /// Graph id carried by the varying.
        found: u64,
    },

    /// A varying refers to a slot no earlier job produces.
    #[error("Job '{job}' consumes slot {slot}, which no earlier job produces")]
    UnproducedInput {
        /// Job being registered.
        job: String,
        /// The offending slot.
        slot: usize,
    },

    /// A varying was read before its producer ran this frame.
    #[error("Varying slot {slot} was read before it was produced")]
    Unproduced {
        /// The slot that is still empty.
        slot: usize,
    },

    /// A producer tried to write a slot twice in the same frame.
    #[error("Varying slot {slot} was produced twice in one frame")]
    AlreadyProduced {
        /// The slot that already holds a value.
        slot: usize,
    },

    /// The stored value does not have the type the varying claims.
    #[error("Varying slot {slot} does not hold a value of type {expected}")]
    TypeMismatch {
        /// The slot being read.
        slot: usize,
        /// Type name requested by the reader.
        expected: &'static str,
    },

    /// A multi-output projection names a field the output does not have.
    #[error("Varying slot {slot} has no output field {index}")]
    MissingField {
        /// The slot being read.
        slot: usize,
        /// Field index requested by the projection.
        index: usize,
    },

    /// The varying belongs to a different varyings store.
    #[error("Varying from graph {found} read from the store of graph {expected}")]
    WrongStore {
        /// Graph id of the store.
        expected: u64,
        /// Graph id carried by the varying.
        found: u64,
    },
}

/// Errors raised by the recording GPU layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// A batch was submitted or a timer opened outside `begin_frame`/`end_frame`.
    #[error("No frame is being recorded")]
    NoActiveFrame,

    /// `begin_frame` was called twice without `end_frame`.
    #[error("A frame is already being recorded")]
    FrameAlreadyActive,

    /// Framebuffers need a non-zero extent.
    #[error("Invalid framebuffer size {width}x{height}")]
    InvalidFramebufferSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The requested extent exceeds the device limits.
    #[error("Framebuffer size {width}x{height} exceeds the limit of {max}")]
    FramebufferTooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Largest supported dimension.
        max: u32,
    },

    /// The handle does not name a live resource.
    #[error("Unknown {kind} handle")]
    UnknownResource {
        /// Resource kind, e.g. `"framebuffer"`.
        kind: &'static str,
    },

    /// A named texture could not be found.
    #[error("Texture not found: {0}")]
    TextureNotFound(String),

    /// Timer ranges must close in strict LIFO order.
    #[error("Timer range '{found}' closed while '{expected}' is innermost")]
    TimerMismatch {
        /// Name of the innermost open range.
        expected: String,
        /// Name of the range being closed.
        found: String,
    },

    /// `end_frame` was reached with open timer ranges.
    #[error("Frame ended with {0} open timer range(s)")]
    UnclosedTimers(usize),
}

/// Errors raised by the config registry.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config is registered at the path.
    #[error("No config registered at '{0}'")]
    UnknownPath(String),

    /// The config at the path is not of the requested type.
    #[error("Config at '{path}' is not a {expected}")]
    TypeMismatch {
        /// Registry path.
        path: String,
        /// Requested config type name.
        expected: &'static str,
    },

    /// A JSON update was not an object keyed by path.
    #[error("Expected a JSON object for '{0}'")]
    NotAnObject(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The umbrella error type of the render task graph.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Graph
    // ========================================================================
    /// Wiring or varying evaluation error.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    // ========================================================================
    // GPU
    // ========================================================================
    /// Recording or resource error.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    // ========================================================================
    // Configuration
    // ========================================================================
    /// Config registry error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    // ========================================================================
    // Job preconditions
    // ========================================================================
    /// A camera-dependent job ran without a view frustum in the render args.
    #[error("Job '{job}' requires a view frustum")]
    MissingViewFrustum {
        /// Job that detected the missing frustum.
        job: &'static str,
    },

    /// A job detected a broken precondition of its own.
    #[error("Job '{job}' failed: {message}")]
    JobFailed {
        /// Job that failed.
        job: &'static str,
        /// Human-readable reason.
        message: String,
    },
}

impl RenderError {
    /// Returns `true` for errors that stem from graph wiring.
    #[must_use]
    pub fn is_wiring(&self) -> bool {
        matches!(
            self,
            RenderError::Graph(
                GraphError::DuplicateJobName { .. }
                    | GraphError::ForeignVarying { .. }
                    | GraphError::UnproducedInput { .. }
            )
        )
    }
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
