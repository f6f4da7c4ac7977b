// src/logger.rs

//! Log router collaborator
//!
//! The engine emits leveled log lines into a router that fans them out
//! to any number of attached sinks. The router keeps a bounded circular
//! buffer of recent records and replays it into each newly attached
//! sink, so a sink attached late still sees recent history. Writes are
//! fire-and-forget: a failing sink never blocks or fails the caller.

use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::sync::{Mutex, RwLock};

/// Default replay buffer capacity
const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Log severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One emitted log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

/// A destination for log records
///
/// Sink failures are swallowed by the router; a sink that wants its
/// errors seen must report them out of band.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord) -> std::io::Result<()>;
}

/// Sink that forwards into the `tracing` ecosystem
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) -> std::io::Result<()> {
        match record.level {
            LogLevel::Critical | LogLevel::Error => tracing::error!("{}", record.message),
            LogLevel::Warning => tracing::warn!("{}", record.message),
            LogLevel::Notice | LogLevel::Info => tracing::info!("{}", record.message),
            LogLevel::Debug => tracing::debug!("{}", record.message),
            LogLevel::Trace => tracing::trace!("{}", record.message),
        }
        Ok(())
    }
}

/// Sink writing formatted lines to any `Write` target
pub struct StreamSink<W: Write + Send> {
    target: Mutex<W>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(target: W) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }
}

impl<W: Write + Send> LogSink for StreamSink<W> {
    fn write(&self, record: &LogRecord) -> std::io::Result<()> {
        let mut target = self
            .target
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "sink poisoned"))?;
        writeln!(target, "{} {}", record.level, record.message)
    }
}

/// Fans records out to attached sinks and keeps a bounded replay buffer
pub struct LogRouter {
    sinks: RwLock<Vec<Box<dyn LogSink>>>,
    buffer: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
}

impl LogRouter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a router whose replay buffer holds up to `capacity`
    /// records; the buffer is pre-reserved so writes never reallocate
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Attach a sink, replaying the buffered history into it first
    ///
    /// Holds the sink list exclusively for the whole replay-and-push,
    /// so a record written concurrently is seen exactly once: either in
    /// the replay or through the normal fan-out, never both or neither.
    pub fn attach(&self, sink: Box<dyn LogSink>) {
        let mut sinks = self.sinks.write().expect("sink list poisoned");
        {
            let buffer = self.buffer.lock().expect("log buffer poisoned");
            for record in buffer.iter() {
                let _ = sink.write(record);
            }
        }
        sinks.push(sink);
    }

    /// Number of attached sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.read().expect("sink list poisoned").len()
    }

    /// Emit one record to the buffer and every attached sink
    ///
    /// Never blocks on a sink and ignores sink write errors.
    pub fn write(&self, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord {
            level,
            message: message.into(),
        };

        // Sink list first, buffer second: the same order `attach` uses,
        // and holding the list across buffering plus fan-out keeps
        // attach from slipping between them
        let sinks = self.sinks.read().expect("sink list poisoned");
        {
            let mut buffer = self.buffer.lock().expect("log buffer poisoned");
            if self.capacity > 0 {
                if buffer.len() == self.capacity {
                    buffer.pop_front();
                }
                buffer.push_back(record.clone());
            }
        }

        for sink in sinks.iter() {
            let _ = sink.write(&record);
        }
    }

    /// Snapshot of the current replay buffer, oldest first
    pub fn buffered(&self) -> Vec<LogRecord> {
        self.buffer
            .lock()
            .expect("log buffer poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for LogRouter {
    fn default() -> Self {
        Self::new()
    }
}
