//! NDJSON event source.
//!
//! One event per line, in the wire shape of [`contracts::Event`]:
//! `{"event":"literal","name":"title","value":"Dune"}`. Blank lines are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use contracts::Event;

use crate::error::{CliError, Result};

/// Iterator over the events of an NDJSON stream
pub struct EventReader<R> {
    lines: io::Lines<R>,
    line: u64,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Number of the last line read (1-based)
    pub fn line(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;

            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(text)
                    .map_err(|e| CliError::invalid_event(self.line, e.to_string())),
            );
        }
    }
}

/// Open `input`, or stdin when it is `None` or `-`
pub fn open(input: Option<&Path>) -> Result<EventReader<Box<dyn BufRead>>> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) if path != Path::new("-") => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };
    Ok(EventReader::new(reader))
}
