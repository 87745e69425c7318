use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::trace;

use crate::frame::{FrameError, parse_hex};

/// Label used for lines that carry no source label.
pub const DEFAULT_SOURCE_LABEL: &str = "input";

/// Errors returned while reading frames from an input.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The input itself failed; no further frames can be read.
    #[error("failed to read frame input")]
    Io(#[from] std::io::Error),
    /// One line could not be turned into frame bytes; reading may continue.
    #[error("line {line} from `{label}` is not a frame")]
    Frame {
        line: usize,
        label: String,
        source: FrameError,
    },
}

/// One raw frame together with the label of the input it came from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceFrame {
    label: String,
    bytes: Vec<u8>,
}

impl SourceFrame {
    #[must_use]
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Splits into label and bytes.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.label, self.bytes)
    }
}

/// Producer of raw frames for the gateway.
#[async_trait]
pub trait FrameSource: Send {
    /// Returns the next frame, or `None` once the input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Frame`] for a malformed entry, after which the
    /// caller may keep reading, and [`SourceError::Io`] when the input fails.
    async fn next_frame(&mut self) -> Result<Option<SourceFrame>, SourceError>;
}

/// Reads frames from text lines of the form `[label ]HEX`.
///
/// Blank lines and lines starting with `#` are skipped. The hex part may
/// contain spaces, so a label is only recognised when the first word is not
/// itself hex.
#[derive(Debug)]
pub struct LineFrameSource<R> {
    lines: LinesStream<R>,
    line_number: usize,
}

impl<R> LineFrameSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            lines: LinesStream::new(reader.lines()),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R> FrameSource for LineFrameSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<SourceFrame>, SourceError> {
        while let Some(line) = self.lines.next().await {
            let line = line?;
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (label, text) = split_label(trimmed);
            trace!(line = self.line_number, label, "read frame line");
            return match parse_hex(text) {
                Ok(bytes) => Ok(Some(SourceFrame::new(label, bytes))),
                Err(source) => Err(SourceError::Frame {
                    line: self.line_number,
                    label: label.to_string(),
                    source,
                }),
            };
        }
        Ok(None)
    }
}

fn split_label(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((first, rest)) if !is_hex_word(first) => (first, rest.trim_start()),
        _ => (DEFAULT_SOURCE_LABEL, line),
    }
}

fn is_hex_word(word: &str) -> bool {
    word.len() % 2 == 0 && word.chars().all(|character| character.is_ascii_hexdigit())
}
