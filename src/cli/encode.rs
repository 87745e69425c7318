use std::io;
use std::str::FromStr;

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use tracing::instrument;

use crate::catalog::MessageRef;
use crate::cli::OutputFormat;
use crate::codec::{SignalCodec, SignalMap};
use crate::dispatch::Dispatcher;
use crate::error::CliConfigError;
use crate::frame::MAX_DEVICE_ADDRESS;
use crate::terminal::TerminalClient;
use crate::utils::format_hex;

use super::ui::{Painter, Table};

/// JSON result emitted by the `encode` command.
#[derive(Serialize)]
struct EncodedFrame<'a> {
    message: &'a str,
    message_id: u32,
    device_address: u8,
    frame_hex: String,
}

/// One `name=value` pair given with `--signal`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SignalAssignment {
    name: String,
    value: f64,
}

impl FromStr for SignalAssignment {
    type Err = CliConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let Some((name, value)) = text.split_once('=') else {
            return Err(CliConfigError::InvalidSignalAssignment {
                value: text.to_string(),
            });
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(CliConfigError::InvalidSignalAssignment {
                value: text.to_string(),
            });
        }
        let value = value
            .trim()
            .parse()
            .map_err(|source| CliConfigError::InvalidSignalValue {
                value: text.to_string(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Arguments for the `encode` command.
#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// Message to encode, by catalog name or numeric id.
    #[arg(long, value_name = "NAME|ID")]
    message: MessageRef,
    /// Device address placed in the frame header.
    #[arg(
        long,
        value_name = "0..31",
        value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_DEVICE_ADDRESS))
    )]
    device: u8,
    /// Signal value; repeat once per signal of the message.
    #[arg(long = "signal", value_name = "NAME=VALUE")]
    signals: Vec<SignalAssignment>,
}

impl EncodeArgs {
    fn values(&self) -> Result<SignalMap, CliConfigError> {
        let mut values = SignalMap::new();
        for assignment in &self.signals {
            if values
                .insert(assignment.name.clone(), assignment.value)
                .is_some()
            {
                return Err(CliConfigError::DuplicateSignalAssignment {
                    signal: assignment.name.clone(),
                });
            }
        }
        Ok(values)
    }
}

/// Executes the `encode` command.
#[instrument(skip_all, level = "info", fields(message = %args.message, device = args.device))]
pub(crate) fn run<W>(
    dispatcher: &Dispatcher,
    args: &EncodeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let values = args.values()?;
    let catalog = dispatcher.catalog().current();
    let descriptor = catalog.resolve(&args.message)?;

    let problems = SignalCodec::check_values(&values, descriptor);
    if !problems.is_empty() {
        let details: Vec<String> = problems.iter().map(ToString::to_string).collect();
        bail!(
            "cannot encode message `{}`:\n  {}",
            descriptor.name(),
            details.join("\n  ")
        );
    }

    let frame = dispatcher.encode(args.device, &args.message, &values)?;
    let frame_hex = hex::encode_upper(frame);
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            let table = Table::key_value(
                &painter,
                vec![
                    ("message", painter.value(descriptor.name())),
                    ("id", descriptor.id().to_string()),
                    ("device", args.device.to_string()),
                    ("bytes", format_hex(&frame)),
                ],
            );
            writeln!(out, "{}", painter.heading("Encoded frame:"))?;
            writeln!(out, "{table}")?;
            writeln!(out, "{}", painter.success(&frame_hex))?;
        }
        OutputFormat::Json => {
            let encoded = EncodedFrame {
                message: descriptor.name(),
                message_id: descriptor.id(),
                device_address: args.device,
                frame_hex,
            };
            serde_json::to_writer(&mut *out, &encoded)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
