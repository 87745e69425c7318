use std::io;

use anyhow::Result;
use clap::Args;
use tracing::instrument;

use crate::catalog::{MessageCatalog, MessageRef};
use crate::cli::OutputFormat;
use crate::terminal::TerminalClient;

use super::ui::{CatalogView, MessageDetailView, Painter};

/// Arguments for the `message` command.
#[derive(Debug, Args)]
pub struct MessageArgs {
    /// Message to show, by catalog name or numeric id.
    #[arg(value_name = "NAME|ID")]
    message: MessageRef,
}

impl MessageArgs {
    #[must_use]
    pub fn new(message: MessageRef) -> Self {
        Self { message }
    }
}

/// Executes the `catalog` command.
#[instrument(skip_all, level = "info", fields(?output_format))]
pub(crate) fn run_catalog<W>(
    catalog: &MessageCatalog,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", CatalogView::new(catalog, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &catalog.info())?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Executes the `message` command.
#[instrument(skip_all, level = "info", fields(message = %args.message, ?output_format))]
pub(crate) fn run_message<W>(
    catalog: &MessageCatalog,
    args: &MessageArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let message = catalog.resolve(&args.message)?;
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", MessageDetailView::new(message, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, message)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
