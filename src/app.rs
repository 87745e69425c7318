use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::catalog::{CatalogHandle, CatalogOptions, JsonCatalogSource, MessageCatalog};
use crate::cli::{Args, Command, OutputFormat};
use crate::dispatch::Dispatcher;
use crate::error::{CliConfigError, GatewayError};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Loads and validates the JSON catalog at `path`.
///
/// ```no_run
/// use busgate::{CatalogOptions, load_catalog};
///
/// let catalog = load_catalog("catalog.json", CatalogOptions::default())?;
/// println!("{} messages", catalog.len());
/// # Ok::<(), busgate::GatewayError>(())
/// ```
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when the
/// catalog fails validation.
pub fn load_catalog(
    path: impl AsRef<Path>,
    options: CatalogOptions,
) -> Result<MessageCatalog, GatewayError> {
    let source = JsonCatalogSource::from_path(path)?;
    Ok(MessageCatalog::load(&source, options)?)
}

/// Runs the CLI command against the real terminal.
///
/// ```no_run
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = busgate::Args::try_parse_from([
///     "busgate",
///     "--catalog",
///     "catalog.json",
///     "decode",
///     "640C1027000000000000AB12",
/// ])?;
/// let mut out = Vec::new();
/// busgate::run(args, &mut out).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the catalog cannot be
/// loaded, the command fails, or output writing fails.
pub async fn run<W>(args: Args, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    run_with_terminal(args, out, &SystemTerminalClient).await
}

/// Runs the CLI command with an injected terminal client.
///
/// ```no_run
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl busgate::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = busgate::Args::try_parse_from([
///     "busgate",
///     "--catalog",
///     "catalog.json",
///     "--log-level",
///     "trace",
///     "catalog",
/// ])?;
/// let mut out = Vec::new();
/// busgate::run_with_terminal(args, &mut out, &FakeTerminal).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the catalog cannot be
/// loaded, the command fails, or output writing fails.
#[instrument(
    skip_all,
    level = "info",
    fields(command = %args.command().name(), log_level = ?args.log_level())
)]
pub async fn run_with_terminal<W>(
    args: Args,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "busgate",
        terminal_client.stderr_is_terminal(),
        args.log_level().map(|level| level.as_level_filter()),
    )?;

    let output_format = args.output_format().unwrap_or(if terminal_client.stdout_is_terminal() {
        OutputFormat::Pretty
    } else {
        OutputFormat::Json
    });
    let path = args.catalog().ok_or(CliConfigError::MissingCatalog)?;
    let catalog = load_catalog(path, args.catalog_options())
        .with_context(|| format!("failed to load catalog `{}`", path.display()))?;
    let handle = CatalogHandle::new(catalog);

    match args.into_command() {
        Command::Decode(decode_args) => crate::cli::decode::run(
            &Dispatcher::new(handle),
            &decode_args,
            out,
            terminal_client,
            output_format,
        ),
        Command::Encode(encode_args) => crate::cli::encode::run(
            &Dispatcher::new(handle),
            &encode_args,
            out,
            terminal_client,
            output_format,
        ),
        Command::Catalog => {
            crate::cli::catalog::run_catalog(&handle.current(), out, terminal_client, output_format)
        }
        Command::Message(message_args) => crate::cli::catalog::run_message(
            &handle.current(),
            &message_args,
            out,
            terminal_client,
            output_format,
        ),
        Command::Serve(serve_args) => {
            crate::cli::serve::run(handle, &serve_args, out, terminal_client, output_format).await
        }
    }
}
