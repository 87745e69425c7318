use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader, BufWriter};
use tracing::{info, instrument};

use crate::catalog::CatalogHandle;
use crate::cli::OutputFormat;
use crate::dispatch::StatsSnapshot;
use crate::gateway::{Gateway, GatewayConfig};
use crate::sink::JsonLinesSink;
use crate::source::LineFrameSource;
use crate::terminal::TerminalClient;

use super::ui::{Painter, StatsView};

/// Path value meaning the standard stream.
const STANDARD_STREAM: &str = "-";

/// Arguments for the `serve` command.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Frame input, one `[label ]HEX` frame per line; `-` reads stdin.
    #[arg(long, default_value = STANDARD_STREAM, value_name = "PATH|-")]
    input: PathBuf,
    /// JSON-lines output; `-` writes stdout.
    #[arg(long, default_value = STANDARD_STREAM, value_name = "PATH|-")]
    output: PathBuf,
    /// Number of decode workers.
    #[arg(long, env = "BUSGATE_WORKERS", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,
    /// Frames buffered ahead of the workers before new frames are dropped.
    #[arg(long, env = "BUSGATE_QUEUE_CAPACITY", default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..))]
    queue_capacity: u32,
    /// Decoded messages buffered ahead of the output before new ones are dropped.
    #[arg(long, env = "BUSGATE_OUTPUT_CAPACITY", default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..))]
    output_capacity: u32,
    /// Time allowed to drain queued frames on shutdown (e.g. `500ms`, `5s`).
    #[arg(long, env = "BUSGATE_SHUTDOWN_GRACE", default_value = "5s", value_parser = parse_duration)]
    shutdown_grace: Duration,
}

impl ServeArgs {
    /// Creates serve arguments with default gateway settings.
    ///
    /// ```
    /// use busgate::ServeArgs;
    ///
    /// let args = ServeArgs::new("frames.txt", "decoded.jsonl");
    /// assert_eq!(4, args.gateway_config().workers());
    /// ```
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let defaults = GatewayConfig::default();
        Self {
            input: input.into(),
            output: output.into(),
            workers: u16::try_from(defaults.workers()).unwrap_or(u16::MAX),
            queue_capacity: u32::try_from(defaults.queue_capacity()).unwrap_or(u32::MAX),
            output_capacity: u32::try_from(defaults.output_capacity()).unwrap_or(u32::MAX),
            shutdown_grace: defaults.shutdown_grace(),
        }
    }

    /// Builds the gateway settings these arguments describe.
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::builder()
            .workers(usize::from(self.workers))
            .queue_capacity(self.queue_capacity as usize)
            .output_capacity(self.output_capacity as usize)
            .shutdown_grace(self.shutdown_grace)
            .build()
    }

    fn writes_stdout(&self) -> bool {
        self.output.as_os_str() == STANDARD_STREAM
    }
}

/// Executes the `serve` command.
///
/// Decoded messages go to the JSON-lines output. The final counters go to
/// `out`, or to stderr when the JSON lines already occupy stdout.
#[instrument(skip_all, level = "info", fields(input = %args.input.display(), output = %args.output.display()))]
pub(crate) async fn run<W>(
    catalog: CatalogHandle,
    args: &ServeArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let reader = open_input(args).await?;
    let writer = open_output(args).await?;
    let gateway = Gateway::start(&args.gateway_config(), catalog, JsonLinesSink::new(writer));
    let intake = gateway.intake();
    let mut source = LineFrameSource::new(reader);

    let fed = tokio::select! {
        result = intake.feed(&mut source) => result.map(|_accepted| ()).context("failed to read frame input"),
        signal = tokio::signal::ctrl_c() => {
            info!("interrupted; shutting down");
            signal.context("failed while waiting for Ctrl+C")
        }
    };
    let stats = gateway.shutdown().await;
    fed?;

    if args.writes_stdout() {
        let mut stderr = io::stderr();
        write_stats(&mut stderr, stats, terminal_client.stderr_is_terminal(), output_format)
    } else {
        write_stats(out, stats, terminal_client.stdout_is_terminal(), output_format)
    }
}

async fn open_input(args: &ServeArgs) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    if args.input.as_os_str() == STANDARD_STREAM {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = File::open(&args.input)
        .await
        .with_context(|| format!("failed to open frame input `{}`", args.input.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn open_output(args: &ServeArgs) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
    if args.writes_stdout() {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let file = File::create(&args.output)
        .await
        .with_context(|| format!("failed to create output `{}`", args.output.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn write_stats<W>(
    out: &mut W,
    stats: StatsSnapshot,
    use_colour: bool,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour);
            writeln!(out, "{}", StatsView::new(stats, &painter))?;
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, &stats)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
