use std::io;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::instrument;

use crate::cli::OutputFormat;
use crate::dispatch::Dispatcher;
use crate::terminal::TerminalClient;

use super::ui::{DecodedMessageView, Painter, RejectedFrameView};

/// JSON line emitted for a frame that failed validation.
#[derive(Serialize)]
struct RejectedFrame<'a> {
    source: &'a str,
    input: &'a str,
    rejected: bool,
    error: String,
}

/// Arguments for the `decode` command.
#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Frames as hexadecimal text, 12 bytes each. Quote frames that contain spaces.
    #[arg(required = true, value_name = "HEX")]
    frames: Vec<String>,
    /// Source label recorded on every decoded message.
    #[arg(long, default_value = "cli")]
    source: String,
}

impl DecodeArgs {
    /// Creates decode arguments for the given hex frames.
    ///
    /// ```
    /// use busgate::DecodeArgs;
    ///
    /// let args = DecodeArgs::new(["610C0000000000000000C4F1"]).with_source("bench");
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(frames: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
            source: "cli".to_string(),
        }
    }

    /// Overrides the source label.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Executes the `decode` command.
///
/// Rejected frames are printed and never fail the command.
#[instrument(skip_all, level = "info", fields(frames = args.frames.len(), ?output_format))]
pub(crate) fn run<W>(
    dispatcher: &Dispatcher,
    args: &DecodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let painter = Painter::new(terminal_client.stdout_is_terminal());
    let catalog = dispatcher.catalog().current();

    for text in &args.frames {
        let result = dispatcher.process_hex(&args.source, text);
        match (output_format, result) {
            (OutputFormat::Pretty, Ok(message)) => {
                let descriptor = catalog.lookup(u32::from(message.message_id()));
                writeln!(out, "{}", DecodedMessageView::new(&message, descriptor, &painter))?;
            }
            (OutputFormat::Pretty, Err(error)) => {
                writeln!(out, "{}", RejectedFrameView::new(&args.source, &error, &painter))?;
            }
            (OutputFormat::Json, Ok(message)) => {
                serde_json::to_writer(&mut *out, &message)?;
                writeln!(out)?;
            }
            (OutputFormat::Json, Err(error)) => {
                let rejected = RejectedFrame {
                    source: &args.source,
                    input: text,
                    rejected: true,
                    error: error.to_string(),
                };
                serde_json::to_writer(&mut *out, &rejected)?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}
