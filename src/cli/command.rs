use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::catalog::CatalogOptions;
use crate::cli::catalog::MessageArgs;
use crate::cli::decode::DecodeArgs;
use crate::cli::encode::EncodeArgs;
use crate::cli::serve::ServeArgs;

/// Command-line options for the bus-frame gateway.
#[derive(Debug, Parser)]
#[command(
    name = "busgate",
    about = "Decode CRC-protected bus frames into named signal values."
)]
pub struct Args {
    /// JSON message catalog describing every message and signal.
    #[arg(long, global = true, env = "BUSGATE_CATALOG")]
    catalog: Option<PathBuf>,
    /// Rejects catalogs whose signals share payload bits instead of warning.
    #[arg(long, global = true)]
    strict_catalog: bool,
    /// Overrides `RUST_LOG` with a single log level.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output style; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output_format: Option<OutputFormat>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use busgate::{Args, Command};
    ///
    /// let args = Args::new(Command::Catalog).with_catalog("catalog.json");
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            catalog: None,
            strict_catalog: false,
            log_level: None,
            output_format: None,
            command,
        }
    }

    /// Sets the catalog path.
    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<PathBuf>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Sets an explicit output format.
    #[must_use]
    pub fn with_output_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = Some(output_format);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&PathBuf> {
        self.catalog.as_ref()
    }

    #[must_use]
    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            strict: self.strict_catalog,
        }
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    #[must_use]
    pub fn command(&self) -> &Command {
        &self.command
    }

    #[must_use]
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode hex frames given on the command line.
    Decode(DecodeArgs),
    /// Encode signal values into a complete wire frame.
    Encode(EncodeArgs),
    /// Summarise the loaded catalog.
    Catalog,
    /// Show the signal layout of one message.
    Message(MessageArgs),
    /// Run the gateway over a line-oriented frame input until EOF or Ctrl+C.
    Serve(ServeArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Decode(_args) => "decode",
            Self::Encode(_args) => "encode",
            Self::Catalog => "catalog",
            Self::Message(_args) => "message",
            Self::Serve(_args) => "serve",
        }
    }
}

/// Log level accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Rendering of command results.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Coloured tables for people.
    Pretty,
    /// One JSON document per line for programs.
    Json,
}
