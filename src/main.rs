use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use listen::core::config::{self, CliOverrides, ResolvedConfig};
use listen::core::guard::{Location, page_guard};
use listen::{EventContainer, HttpEventSource, LoopExit, Poller, SubscribeMode, WriterContainer};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "listen", about = "Long-poll an event endpoint and print rendered events")]
struct Args {
    /// Server base URL (default http://localhost:8000)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Page the poller runs on; polling stops when we leave it
    #[arg(long)]
    page: Option<String>,

    /// Seconds to wait between poll cycles (0 = none)
    #[arg(short, long)]
    delay: Option<f64>,

    /// How to send the subscribe request
    #[arg(long, value_enum)]
    subscribe_mode: Option<SubscribeMode>,

    /// End the loop on the first failed cycle instead of logging and continuing
    #[arg(long)]
    stop_on_error: bool,

    /// Escape event markup instead of inserting it verbatim
    #[arg(long)]
    escape: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Write rendered events to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read config from this file instead of ~/.listen/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            base_url: self.base_url.clone(),
            page: self.page.clone(),
            delay_secs: self.delay,
            subscribe_mode: self.subscribe_mode,
            stop_on_error: self.stop_on_error,
            escape: self.escape,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_logging(resolved: &ResolvedConfig) {
    let level = resolved
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Debug);

    // Log to a file; stdout carries the rendered events
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(level, log_config, log_file);
    }
}

/// First Ctrl-C leaves the page so the loop stops after the current cycle.
/// A second one exits immediately.
fn spawn_interrupt_handler(location: Location) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("Interrupt received, leaving the events page");
        eprintln!("Stopping after the current poll (Ctrl-C again to quit now)");
        location.navigate("/");

        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });
}

async fn run(
    resolved: &ResolvedConfig,
    container: &mut dyn EventContainer,
    once: bool,
) -> io::Result<()> {
    let source = HttpEventSource::with_timeout(
        resolved.base_url.clone(),
        resolved.endpoints.clone(),
        resolved.request_timeout,
    )
    .map_err(io::Error::other)?;
    let poller = Poller::new(Arc::new(source), resolved.poller.clone());

    // Start on the polling page; only an interrupt navigates away
    let location = Location::new(resolved.page.clone());
    spawn_interrupt_handler(location.clone());
    let guard = page_guard(location, resolved.page.clone(), once.then_some(1));

    let summary = poller.run(container, guard.as_ref()).await;
    log::info!(
        "Done: {} cycle(s), {} event(s), {} subscribe(s) ({} abandoned), {} failure(s)",
        summary.cycles,
        summary.rendered,
        summary.subscribes,
        summary.abandoned_subscribes,
        summary.failures
    );

    match summary.exit {
        // The container's own error decides how a closed output exits
        LoopExit::NavigatedAway | LoopExit::OutputClosed => Ok(()),
        LoopExit::Failed(e) => Err(io::Error::other(e)),
    }
}

/// A reader hanging up (`listen | head -1`) is a normal way to stop. Any other
/// write failure is reported.
fn output_result<W: Write>(container: &WriterContainer<W>) -> io::Result<()> {
    match container.error() {
        Some(e) if e.kind() != io::ErrorKind::BrokenPipe => {
            Err(io::Error::new(e.kind(), e.to_string()))
        }
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .map_err(io::Error::other)?;
    let resolved = config::resolve(&file_config, &args.overrides());

    init_logging(&resolved);
    log::info!(
        "Listen starting: base_url={}, page={}, delay={:?}",
        resolved.base_url,
        resolved.page,
        resolved.poller.delay
    );

    match &args.output {
        Some(path) => {
            let mut container = WriterContainer::new(File::create(path)?);
            run(&resolved, &mut container, args.once).await?;
            output_result(&container)?;
            container.into_inner().flush()
        }
        None => {
            let mut container = WriterContainer::new(io::stdout().lock());
            run(&resolved, &mut container, args.once).await?;
            output_result(&container)
        }
    }
}
