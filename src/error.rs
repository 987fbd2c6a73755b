// In: src/error.rs

//! This module defines the single, unified error type for the entire tambak graph
//! engine. It uses the `thiserror` crate to provide ergonomic, context-aware error
//! handling.
//!
//! Every engine failure carries an [`ErrorKind`] (the stable taxonomy callers match
//! on), a human-readable message, and the call site that raised it.

use std::fmt;
use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, TambakError>;

//==================================================================================
// 1. Error Kinds
//==================================================================================

/// The closed taxonomy of failure classes. This is what callers should branch on;
/// the message attached to an error is for humans only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Generic,
    Allocation,
    SrcSizeTooSmall,
    DstCapacityTooSmall,
    Corruption,
    GraphInvalid,
    SuccessorInvalid,
    NodeInvalid,
    NodeDefinitionInvalid,
    InputTypeUnsupported,
    ParameterInvalid,
    FormatVersionUnsupported,
    NodeVersionMismatch,
    TransformExecutionFailure,
    CompressedChecksumWrong,
    ContentChecksumWrong,
    LogicError,
}

impl ErrorKind {
    /// The stable, wire-independent name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Generic => "GENERIC",
            ErrorKind::Allocation => "allocation",
            ErrorKind::SrcSizeTooSmall => "srcSize_tooSmall",
            ErrorKind::DstCapacityTooSmall => "dstCapacity_tooSmall",
            ErrorKind::Corruption => "corruption",
            ErrorKind::GraphInvalid => "graph_invalid",
            ErrorKind::SuccessorInvalid => "successor_invalid",
            ErrorKind::NodeInvalid => "node_invalid",
            ErrorKind::NodeDefinitionInvalid => "nodeDefinition_invalid",
            ErrorKind::InputTypeUnsupported => "inputType_unsupported",
            ErrorKind::ParameterInvalid => "parameter_invalid",
            ErrorKind::FormatVersionUnsupported => "formatVersion_unsupported",
            ErrorKind::NodeVersionMismatch => "nodeVersion_mismatch",
            ErrorKind::TransformExecutionFailure => "transform_executionFailure",
            ErrorKind::CompressedChecksumWrong => "compressedChecksum_wrong",
            ErrorKind::ContentChecksumWrong => "contentChecksum_wrong",
            ErrorKind::LogicError => "logicError",
        }
    }

    /// Failure classes that permissive compression may downgrade to a warning
    /// plus a fallback path. Everything else always aborts the call.
    pub fn is_permissive_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::TransformExecutionFailure
                | ErrorKind::InputTypeUnsupported
                | ErrorKind::NodeVersionMismatch
                | ErrorKind::NodeInvalid
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The message and call site attached to every engine error.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub location: &'static Location<'static>,
}

impl Diagnostic {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}:{}]",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

//==================================================================================
// 2. The Unified Error Type
//==================================================================================

#[derive(Error, Debug)]
pub enum TambakError {
    // =========================================================================
    // === High-Level, Semantic Errors
    // =========================================================================
    #[error("{0}")]
    Generic(Diagnostic),

    #[error("Allocation limit exceeded: {0}")]
    Allocation(Diagnostic),

    #[error("Source too small: {0}")]
    SrcSizeTooSmall(Diagnostic),

    #[error("Destination capacity too small: {0}")]
    DstCapacityTooSmall(Diagnostic),

    #[error("Corrupted frame: {0}")]
    Corruption(Diagnostic),

    #[error("Invalid graph: {0}")]
    GraphInvalid(Diagnostic),

    #[error("Invalid successor: {0}")]
    SuccessorInvalid(Diagnostic),

    #[error("Invalid node: {0}")]
    NodeInvalid(Diagnostic),

    #[error("Invalid transform definition: {0}")]
    NodeDefinitionInvalid(Diagnostic),

    #[error("Unsupported input type: {0}")]
    InputTypeUnsupported(Diagnostic),

    #[error("Invalid parameter: {0}")]
    ParameterInvalid(Diagnostic),

    #[error("Unsupported format version: {0}")]
    FormatVersionUnsupported(Diagnostic),

    #[error("Node requires a newer format version: {0}")]
    NodeVersionMismatch(Diagnostic),

    #[error("Transform execution failed: {0}")]
    TransformExecutionFailure(Diagnostic),

    #[error("Compressed checksum mismatch: {0}")]
    CompressedChecksumWrong(Diagnostic),

    #[error("Content checksum mismatch: {0}")]
    ContentChecksumWrong(Diagnostic),

    #[error("Internal logic error (this is a bug): {0}")]
    Logic(Diagnostic),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error from an I/O operation, such as opening a log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while exporting or loading
    /// a configuration.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String),

    // =========================================================================
    // === Context Wrapper
    // =========================================================================
    #[error("Execution failed at stage '{stage}': {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<TambakError>,
    },
}

impl TambakError {
    /// Builds an engine error of the given kind, capturing the caller's location.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let diag = Diagnostic::new(message);
        match kind {
            ErrorKind::Generic => TambakError::Generic(diag),
            ErrorKind::Allocation => TambakError::Allocation(diag),
            ErrorKind::SrcSizeTooSmall => TambakError::SrcSizeTooSmall(diag),
            ErrorKind::DstCapacityTooSmall => TambakError::DstCapacityTooSmall(diag),
            ErrorKind::Corruption => TambakError::Corruption(diag),
            ErrorKind::GraphInvalid => TambakError::GraphInvalid(diag),
            ErrorKind::SuccessorInvalid => TambakError::SuccessorInvalid(diag),
            ErrorKind::NodeInvalid => TambakError::NodeInvalid(diag),
            ErrorKind::NodeDefinitionInvalid => TambakError::NodeDefinitionInvalid(diag),
            ErrorKind::InputTypeUnsupported => TambakError::InputTypeUnsupported(diag),
            ErrorKind::ParameterInvalid => TambakError::ParameterInvalid(diag),
            ErrorKind::FormatVersionUnsupported => TambakError::FormatVersionUnsupported(diag),
            ErrorKind::NodeVersionMismatch => TambakError::NodeVersionMismatch(diag),
            ErrorKind::TransformExecutionFailure => {
                TambakError::TransformExecutionFailure(diag)
            }
            ErrorKind::CompressedChecksumWrong => TambakError::CompressedChecksumWrong(diag),
            ErrorKind::ContentChecksumWrong => TambakError::ContentChecksumWrong(diag),
            ErrorKind::LogicError => TambakError::Logic(diag),
        }
    }

    #[track_caller]
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corruption, message)
    }

    #[track_caller]
    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LogicError, message)
    }

    #[track_caller]
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Allocation, message)
    }

    #[track_caller]
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParameterInvalid, message)
    }

    #[track_caller]
    pub fn graph_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GraphInvalid, message)
    }

    #[track_caller]
    pub fn transform_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransformExecutionFailure, message)
    }

    /// Wraps this error with the name of the node or graph that produced it.
    pub fn at_stage(self, stage: impl Into<String>) -> Self {
        TambakError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// The taxonomy class of this error, looking through stage wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TambakError::Generic(_) => ErrorKind::Generic,
            TambakError::Allocation(_) => ErrorKind::Allocation,
            TambakError::SrcSizeTooSmall(_) => ErrorKind::SrcSizeTooSmall,
            TambakError::DstCapacityTooSmall(_) => ErrorKind::DstCapacityTooSmall,
            TambakError::Corruption(_) => ErrorKind::Corruption,
            TambakError::GraphInvalid(_) => ErrorKind::GraphInvalid,
            TambakError::SuccessorInvalid(_) => ErrorKind::SuccessorInvalid,
            TambakError::NodeInvalid(_) => ErrorKind::NodeInvalid,
            TambakError::NodeDefinitionInvalid(_) => ErrorKind::NodeDefinitionInvalid,
            TambakError::InputTypeUnsupported(_) => ErrorKind::InputTypeUnsupported,
            TambakError::ParameterInvalid(_) => ErrorKind::ParameterInvalid,
            TambakError::FormatVersionUnsupported(_) => ErrorKind::FormatVersionUnsupported,
            TambakError::NodeVersionMismatch(_) => ErrorKind::NodeVersionMismatch,
            TambakError::TransformExecutionFailure(_) => ErrorKind::TransformExecutionFailure,
            TambakError::CompressedChecksumWrong(_) => ErrorKind::CompressedChecksumWrong,
            TambakError::ContentChecksumWrong(_) => ErrorKind::ContentChecksumWrong,
            TambakError::Logic(_) => ErrorKind::LogicError,
            TambakError::Io(_) | TambakError::SerdeJson(_) | TambakError::PodCast(_) => {
                ErrorKind::Generic
            }
            TambakError::Stage { source, .. } => source.kind(),
        }
    }

    /// The diagnostic attached to an engine error, if any.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            TambakError::Generic(d)
            | TambakError::Allocation(d)
            | TambakError::SrcSizeTooSmall(d)
            | TambakError::DstCapacityTooSmall(d)
            | TambakError::Corruption(d)
            | TambakError::GraphInvalid(d)
            | TambakError::SuccessorInvalid(d)
            | TambakError::NodeInvalid(d)
            | TambakError::NodeDefinitionInvalid(d)
            | TambakError::InputTypeUnsupported(d)
            | TambakError::ParameterInvalid(d)
            | TambakError::FormatVersionUnsupported(d)
            | TambakError::NodeVersionMismatch(d)
            | TambakError::TransformExecutionFailure(d)
            | TambakError::CompressedChecksumWrong(d)
            | TambakError::ContentChecksumWrong(d)
            | TambakError::Logic(d) => Some(d),
            TambakError::Stage { source, .. } => source.diagnostic(),
            TambakError::Io(_) | TambakError::SerdeJson(_) | TambakError::PodCast(_) => None,
        }
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for TambakError {
    fn from(err: bytemuck::PodCastError) -> Self {
        TambakError::PodCast(err.to_string())
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_survives_stage_wrapping() {
        let err = TambakError::corruption("bad header").at_stage("entropy");
        assert_eq!(err.kind(), ErrorKind::Corruption);
        assert!(err.to_string().contains("entropy"));
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn test_new_round_trips_every_kind() {
        let kinds = [
            ErrorKind::Generic,
            ErrorKind::Allocation,
            ErrorKind::SrcSizeTooSmall,
            ErrorKind::DstCapacityTooSmall,
            ErrorKind::Corruption,
            ErrorKind::GraphInvalid,
            ErrorKind::SuccessorInvalid,
            ErrorKind::NodeInvalid,
            ErrorKind::NodeDefinitionInvalid,
            ErrorKind::InputTypeUnsupported,
            ErrorKind::ParameterInvalid,
            ErrorKind::FormatVersionUnsupported,
            ErrorKind::NodeVersionMismatch,
            ErrorKind::TransformExecutionFailure,
            ErrorKind::CompressedChecksumWrong,
            ErrorKind::ContentChecksumWrong,
            ErrorKind::LogicError,
        ];
        for kind in kinds {
            assert_eq!(TambakError::new(kind, "x").kind(), kind);
        }
    }

    #[test]
    fn test_location_points_at_caller() {
        let err = TambakError::logic("unreachable state");
        let diag = err.diagnostic().unwrap();
        assert!(diag.location.file().ends_with("error.rs"));
        assert_eq!(diag.message, "unreachable state");
    }

    #[test]
    fn test_permissive_recoverable_set() {
        assert!(ErrorKind::TransformExecutionFailure.is_permissive_recoverable());
        assert!(ErrorKind::InputTypeUnsupported.is_permissive_recoverable());
        assert!(!ErrorKind::Corruption.is_permissive_recoverable());
        assert!(!ErrorKind::Allocation.is_permissive_recoverable());
        assert!(!ErrorKind::LogicError.is_permissive_recoverable());
    }
}
