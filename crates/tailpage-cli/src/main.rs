//! `tailpage`: show a file or standard input with its styling, and keep
//! following it as it grows.

mod config;
mod logging;
mod render;

use std::{
    io::{self, IsTerminal},
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use tailpage::{DocumentId, Pager};
use tracing::{debug, info};

use crate::render::View;

/// Upper bound on one sleep, so stream chunks are picked up promptly.
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Page through plain, ANSI-colored, man-page and markup text as it arrives.
#[derive(Parser, Debug)]
#[command(name = "tailpage")]
#[command(version, about, long_about = None)]
struct Args {
    /// File to show. Reads standard input when absent or "-".
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Keep watching the file for appended data.
    #[arg(short, long)]
    follow: bool,

    /// Use this format instead of detecting one (see --list-formats).
    #[arg(long, value_name = "NAME")]
    format: Option<String>,

    /// Interval between size checks of a followed file.
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,

    /// Bytes parsed per work slice.
    #[arg(long, value_name = "BYTES")]
    slice_bytes: Option<usize>,

    /// JSON file with pager options.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write diagnostics here instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the registered formats in priority order and exit.
    #[arg(long)]
    list_formats: bool,

    /// Print a status line to stderr when done.
    #[arg(long)]
    status: bool,
}

impl Args {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            follow: self.follow,
            poll_ms: self.poll_ms,
            slice_bytes: self.slice_bytes,
        }
    }

    fn reads_stdin(&self) -> bool {
        self.file.as_ref().is_none_or(|p| p.as_os_str() == "-")
    }
}

fn open(pager: &mut Pager, args: &Args) -> Result<DocumentId> {
    let follow = pager.options().tail.follow;
    let id = match &args.file {
        Some(path) if !args.reads_stdin() => pager
            .open_file(path, follow)
            .with_context(|| format!("opening {}", path.display()))?,
        _ => pager.open_stream("<stdin>", io::stdin()),
    };
    if let Some(name) = &args.format {
        pager.override_format(id, name)?;
    }
    Ok(id)
}

fn run(args: &Args) -> Result<()> {
    let mut options = config::load(args.config.as_deref())?;
    config::apply(&mut options, args.overrides());
    let mut pager = Pager::new(options);

    if args.list_formats {
        for descriptor in pager.registry().descriptors() {
            println!(
                "{:>4}  {:<12} {}",
                descriptor.priority(),
                descriptor.kind().slug(),
                descriptor.name()
            );
        }
        return Ok(());
    }

    let id = open(&mut pager, args)?;
    let stdout = io::stdout();
    let mut view = View::new(stdout.is_terminal());
    let mut out = stdout.lock();

    loop {
        let report = pager.pump(Instant::now());
        if report != tailpage::PumpReport::default() {
            debug!(?report, "pumped");
        }
        for (_, event) in pager.take_signals() {
            view.note(&event);
        }
        let document = pager.document(id).context("document closed unexpectedly")?;
        view.flush(&mut out, document.committed())?;

        if pager.has_queued_work() {
            continue;
        }
        if !pager.has_live_sources() {
            break;
        }
        let sleep = pager
            .next_deadline()
            .map_or(IDLE_SLEEP, |due| due.saturating_duration_since(Instant::now()))
            .min(IDLE_SLEEP);
        thread::sleep(sleep);
    }

    if let Some(document) = pager.document(id) {
        info!(summary = %document.status_summary(), "done");
        if args.status {
            eprintln!("{}", document.status_summary());
        }
    }
    pager.close(id)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;
    run(&args)
}
