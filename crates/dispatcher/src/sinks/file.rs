//! NdjsonSink - writes output events as newline-delimited JSON

use contracts::{Event, MorphError, StreamReceiver};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Configuration for a file-backed NdjsonSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output.ndjson"));

        Self { path }
    }
}

/// Sink that writes one JSON event per line
pub struct NdjsonSink<W: Write> {
    name: String,
    writer: W,
    written: u64,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            written: 0,
        }
    }

    /// Events written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &Event) -> Result<(), MorphError> {
        serde_json::to_writer(&mut self.writer, event)
            .map_err(|e| MorphError::sink_write(&self.name, e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

impl NdjsonSink<BufWriter<File>> {
    /// Create the output file, including missing parent directories
    pub fn create(name: impl Into<String>, config: &FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&config.path)?;
        debug!(path = %config.path.display(), "NdjsonSink file created");
        Ok(Self::new(name, BufWriter::new(file)))
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::create(name, &config)
    }
}

impl NdjsonSink<std::io::Stdout> {
    pub fn stdout(name: impl Into<String>) -> Self {
        Self::new(name, std::io::stdout())
    }
}

impl<W: Write> StreamReceiver for NdjsonSink<W> {
    fn start_record(&mut self, id: &str) -> Result<(), MorphError> {
        self.write_event(&Event::start_record(id))
    }

    fn end_record(&mut self) -> Result<(), MorphError> {
        self.write_event(&Event::EndRecord)
    }

    fn start_entity(&mut self, name: &str) -> Result<(), MorphError> {
        self.write_event(&Event::start_entity(name))
    }

    fn end_entity(&mut self) -> Result<(), MorphError> {
        self.write_event(&Event::EndEntity)
    }

    fn literal(&mut self, name: &str, value: &str) -> Result<(), MorphError> {
        self.write_event(&Event::literal(name, value))
    }

    #[instrument(name = "ndjson_sink_close", skip(self), fields(sink = %self.name))]
    fn close_stream(&mut self) -> Result<(), MorphError> {
        self.writer.flush()?;
        debug!(sink = %self.name, written = self.written, "NdjsonSink closed");
        Ok(())
    }
}
