//! The plain-data contract every transform is registered with.

use serde::Serialize;

use crate::error::{ErrorKind, Result, TambakError};
use crate::graph::TransformId;
use crate::transform::TransformKind;
use crate::types::{StreamType, TypeMask};

/// The type an output stream is declared to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Fixed(StreamType),
    /// Same type and width as the transform's input.
    SameAsInput,
}

/// Declared type of one output. `elt_width: None` leaves the width to runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub stream_type: OutputType,
    pub elt_width: Option<usize>,
}

impl OutputSpec {
    pub fn serial() -> Self {
        Self {
            stream_type: OutputType::Fixed(StreamType::Serial),
            elt_width: Some(1),
        }
    }

    pub fn numeric(elt_width: usize) -> Self {
        Self {
            stream_type: OutputType::Fixed(StreamType::Numeric),
            elt_width: Some(elt_width),
        }
    }

    /// Numeric output whose width is picked at runtime.
    pub fn numeric_any() -> Self {
        Self {
            stream_type: OutputType::Fixed(StreamType::Numeric),
            elt_width: None,
        }
    }

    pub fn structs_any() -> Self {
        Self {
            stream_type: OutputType::Fixed(StreamType::Struct),
            elt_width: None,
        }
    }

    pub fn strings() -> Self {
        Self {
            stream_type: OutputType::Fixed(StreamType::String),
            elt_width: Some(0),
        }
    }

    pub fn same_as_input() -> Self {
        Self {
            stream_type: OutputType::SameAsInput,
            elt_width: None,
        }
    }

    /// Checks a produced (or parsed) stream against this declaration.
    pub fn accepts(&self, input: (StreamType, usize), actual: (StreamType, usize)) -> bool {
        let (expected_type, expected_width) = match self.stream_type {
            OutputType::Fixed(t) => (t, self.elt_width),
            OutputType::SameAsInput => (input.0, Some(input.1)),
        };
        actual.0 == expected_type
            && expected_width.map_or(true, |w| w == actual.1)
            && actual.0.is_valid_width(actual.1)
    }

    fn validate(&self) -> Result<()> {
        if let (OutputType::Fixed(t), Some(w)) = (self.stream_type, self.elt_width) {
            if !t.is_valid_width(w) {
                return Err(TambakError::new(
                    ErrorKind::NodeDefinitionInvalid,
                    format!("{} output cannot have width {}", t, w),
                ));
            }
        }
        Ok(())
    }
}

/// Identity and type contract of a transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformDescriptor {
    pub id: TransformId,
    pub name: String,
    pub input_mask: TypeMask,
    pub singleton_outputs: Vec<OutputSpec>,
    /// Present for transforms that emit a runtime-determined number of outputs.
    pub variable_output: Option<OutputSpec>,
    /// Oldest frame format version able to carry this transform.
    pub min_format_version: u32,
}

impl TransformDescriptor {
    pub fn new(id: u32, name: impl Into<String>, input_mask: TypeMask) -> Self {
        Self {
            id: TransformId(id),
            name: name.into(),
            input_mask,
            singleton_outputs: Vec::new(),
            variable_output: None,
            min_format_version: crate::frame::MIN_FORMAT_VERSION,
        }
    }

    pub fn with_output(mut self, spec: OutputSpec) -> Self {
        self.singleton_outputs.push(spec);
        self
    }

    pub fn with_variable_output(mut self, spec: OutputSpec) -> Self {
        self.variable_output = Some(spec);
        self
    }

    pub fn with_min_format_version(mut self, version: u32) -> Self {
        self.min_format_version = version;
        self
    }

    /// Number of outputs known at registration time.
    pub fn nb_singletons(&self) -> usize {
        self.singleton_outputs.len()
    }

    /// Validates the declaration against the dispatch shape it is registered as.
    pub fn validate(&self, kind: TransformKind) -> Result<()> {
        let invalid = |msg: String| {
            Err(TambakError::new(
                ErrorKind::NodeDefinitionInvalid,
                format!("transform '{}' ({}): {}", self.name, self.id, msg),
            ))
        };
        if self.input_mask.is_empty() {
            return invalid("accepts no input type".into());
        }
        if self.min_format_version > crate::frame::MAX_FORMAT_VERSION {
            return invalid(format!(
                "requires format version {}, newest supported is {}",
                self.min_format_version,
                crate::frame::MAX_FORMAT_VERSION
            ));
        }
        for spec in self.singleton_outputs.iter().chain(&self.variable_output) {
            spec.validate()?;
        }

        match kind {
            TransformKind::Pipe => {
                if self.input_mask != TypeMask::SERIAL
                    || self.singleton_outputs != [OutputSpec::serial()]
                    || self.variable_output.is_some()
                {
                    return invalid("byte-pipe transforms map one serial stream to one serial stream".into());
                }
            }
            TransformKind::Typed => {
                if self.singleton_outputs.is_empty() || self.variable_output.is_some() {
                    return invalid("typed transforms declare one or more fixed outputs and no variable output".into());
                }
            }
            TransformKind::VariableOutput => {
                if self.variable_output.is_none() {
                    return invalid("variable-output transforms must declare a variable output".into());
                }
            }
            TransformKind::Split => {
                if self.singleton_outputs != [OutputSpec::numeric(4)]
                    || self.variable_output != Some(OutputSpec::same_as_input())
                {
                    return invalid("split transforms emit a u32 size stream plus segments of the input type".into());
                }
            }
        }
        Ok(())
    }
}
