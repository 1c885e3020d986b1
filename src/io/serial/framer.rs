// src/io/serial/framer.rs
//
// Delimiter-based framing for the base station byte stream.
// Vote events arrive one per line; the framer cuts the stream at each
// newline and force-splits runaway lines at `max_length`.

/// Line terminator the base station ends each event with
pub const LINE_DELIMITER: u8 = b'\n';

/// A complete frame extracted from the serial stream
#[derive(Debug, Clone, PartialEq)]
pub struct SerialFrame {
    /// Frame data bytes, delimiter excluded
    pub bytes: Vec<u8>,
    /// True when the frame was cut by the length guard
    pub incomplete: bool,
}

/// Stateful line framer for streaming data.
pub struct LineFramer {
    buffer: Vec<u8>,
    max_length: usize,
    /// Set after a forced split; the rest of that line is swallowed
    discarding: bool,
}

impl LineFramer {
    pub fn new(max_length: usize) -> Self {
        LineFramer {
            buffer: Vec::with_capacity(max_length.min(1024)),
            max_length: max_length.max(1),
            discarding: false,
        }
    }

    /// Feed raw bytes into the framer.
    /// Returns any complete frames that were parsed. An over-long line yields
    /// one incomplete frame holding its first `max_length` bytes; everything
    /// after that up to the next newline is dropped.
    pub fn feed(&mut self, data: &[u8]) -> Vec<SerialFrame> {
        let mut frames = Vec::new();

        for &byte in data {
            if byte == LINE_DELIMITER {
                if !self.discarding && !self.buffer.is_empty() {
                    frames.push(SerialFrame {
                        bytes: self.buffer.drain(..).collect(),
                        incomplete: false,
                    });
                }
                self.discarding = false;
                continue;
            }

            if self.discarding {
                continue;
            }

            self.buffer.push(byte);

            // Force split on max length
            if self.buffer.len() >= self.max_length {
                frames.push(SerialFrame {
                    bytes: self.buffer.drain(..).collect(),
                    incomplete: true,
                });
                self.discarding = true;
            }
        }

        frames
    }

    /// Drop a partial line, e.g. after the port was reopened.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
