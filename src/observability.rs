// In: src/observability.rs

//! This module provides observability and diagnostics for the execution engine.
//!
//! A graph engine this adaptive needs visibility into its decisions: which graph
//! a stream entered, which node ran and how much it produced, how each selector
//! candidate scored, and when permissive mode swallowed an error. Those events
//! are reported to a [`DiagnosticSink`] held by each execution context, so no
//! global state is consulted and tests can run in parallel.
//!
//! The default sink discards everything. [`LogSink`] forwards to the `log`
//! facade, and [`enable_verbose_logging`] installs an `env_logger` backend.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};

use log::{Level, LevelFilter};

use crate::error::{ErrorKind, Result};
use crate::types::StreamType;

//==================================================================================
// 1. Events
//==================================================================================

/// A structured engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    GraphEntered {
        graph: String,
        stream_type: StreamType,
        nb_elts: usize,
    },
    NodeExecuted {
        node: String,
        input_bytes: usize,
        output_bytes: usize,
    },
    SelectorTrial {
        graph: String,
        candidate: String,
        cost: Option<usize>,
    },
    SelectorChoice {
        graph: String,
        candidate: String,
    },
    PermissiveFallback {
        graph: String,
        kind: ErrorKind,
        message: String,
    },
    FrameWritten {
        format_version: u32,
        nb_inputs: usize,
        frame_size: usize,
    },
    FrameRead {
        format_version: u32,
        nb_outputs: usize,
        frame_size: usize,
    },
}

impl Event {
    /// The `log` level this event is reported at.
    pub fn level(&self) -> Level {
        match self {
            Event::PermissiveFallback { .. } => Level::Warn,
            Event::FrameWritten { .. } | Event::FrameRead { .. } => Level::Info,
            Event::SelectorChoice { .. } => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::GraphEntered { graph, stream_type, nb_elts } => {
                write!(f, "graph '{}' <- {} stream of {} elements", graph, stream_type, nb_elts)
            }
            Event::NodeExecuted { node, input_bytes, output_bytes } => {
                write!(f, "node '{}': {} -> {} bytes", node, input_bytes, output_bytes)
            }
            Event::SelectorTrial { graph, candidate, cost } => match cost {
                Some(c) => write!(f, "selector '{}' trial '{}': {} bytes", graph, candidate, c),
                None => write!(f, "selector '{}' trial '{}': failed", graph, candidate),
            },
            Event::SelectorChoice { graph, candidate } => {
                write!(f, "selector '{}' chose '{}'", graph, candidate)
            }
            Event::PermissiveFallback { graph, kind, message } => write!(
                f,
                "graph '{}' failed ({}: {}), falling back to generic",
                graph, kind, message
            ),
            Event::FrameWritten { format_version, nb_inputs, frame_size } => write!(
                f,
                "wrote v{} frame: {} inputs, {} bytes",
                format_version, nb_inputs, frame_size
            ),
            Event::FrameRead { format_version, nb_outputs, frame_size } => write!(
                f,
                "read v{} frame: {} outputs, {} bytes",
                format_version, nb_outputs, frame_size
            ),
        }
    }
}

//==================================================================================
// 2. Sinks
//==================================================================================

/// Receives engine events. Implementations must be cheap when disabled.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &Event);

    /// Lets the engine skip building events nobody will read.
    fn enabled(&self) -> bool {
        true
    }
}

/// Discards every event. The default sink of every context.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&self, _event: &Event) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, event: &Event) {
        log::log!(target: "tambak_graph", event.level(), "{}", event);
    }

    fn enabled(&self) -> bool {
        log::log_enabled!(target: "tambak_graph", Level::Warn)
    }
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&self, event: &Event) {
        if let Ok(mut e) = self.events.lock() {
            e.push(event.clone());
        }
    }
}

//==================================================================================
// 3. Logger Installation
//==================================================================================

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend printing `[LEVEL] message` lines, optionally
/// appending to `log_file`. Only the first call has any effect.
pub fn enable_verbose_logging(log_file: Option<&Path>) -> Result<()> {
    let target = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Info);

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}
