//! Newsroom entrypoint.
//!
//! Wires the desk to the real world: logging, configuration, the single
//! instance lock, persisted stories, the tokio event loop with its tick
//! and pump intervals, poller fetches, terminal input, and the terminal
//! surface.

mod instance;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{Event as TermEvent, EventStream, KeyCode, KeyModifiers, MouseEventKind};
use tokio_stream::StreamExt;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use core_config::Config;
use core_desk::dragdrop::accepted_drops;
use core_desk::NewsDesk;
use core_headline::fit::ScaledMetrics;
use core_poller::transport::{ReqwestTransport, Transport};
use core_reporter::registry::ReporterRegistry;
use core_settings::Document;
use core_story::{StoryInfo, persist};
use core_types::{ChyronId, FixedDisplays, FontSpec, HeadlineId, Rect};

use instance::RunGuard;
use surface::TerminalSurface;

const DEFAULT_STYLESHEET: &str =
    "color: white; background-color: rgb(75, 75, 75); border: 1px solid black;";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "newsroom", version, about = "Desktop headline aggregator")]
struct Args {
    /// Local text files to start covering at startup.
    pub stories: Vec<PathBuf>,
    /// Configuration file path (overrides discovery of `newsroom.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Settings document path (overrides the configured location).
    #[arg(long = "settings")]
    pub settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = core_config::load_from(args.config.clone())?;

    let runtime_dir = core_config::runtime_dir();
    std::fs::create_dir_all(&runtime_dir)
        .with_context(|| format!("creating runtime directory {}", runtime_dir.display()))?;

    let _log_guard = configure_logging(&config, &runtime_dir)?;
    install_panic_hook();
    info!(target: "runtime", "startup");

    let Some(_instance) = RunGuard::try_acquire(&runtime_dir)? else {
        eprintln!("another newsroom instance is already running");
        std::process::exit(1);
    };

    let registry = ReporterRegistry::with_builtins();
    if registry.is_empty() {
        anyhow::bail!("no reporters loaded; cannot cover anything");
    }
    info!(target: "runtime", reporters = registry.len(), "reporters_loaded");

    // the desk holds single-threaded state, so the loop runs on a
    // current-thread runtime; only fetches and timers live in tasks
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args, config, registry, runtime_dir))
}

fn configure_logging(config: &Config, runtime_dir: &std::path::Path) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::never(runtime_dir, &config.file.logging.file);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.file.logging.filter.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn install_panic_hook() {
    let default = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(target: "runtime", %panic_info, "panic");
        default(panic_info);
    }));
}

fn settings_path(args: &Args, config: &Config, runtime_dir: &std::path::Path) -> PathBuf {
    args.settings
        .clone()
        .or_else(|| config.file.settings.path.clone())
        .unwrap_or_else(|| runtime_dir.join("settings.json"))
}

/// Load persisted stories and start covering them. Failures skip the story
/// and keep the rest of startup intact.
fn restore_stories(
    desk: &mut NewsDesk,
    doc: &mut Document,
    registry: &ReporterRegistry,
    now: u64,
) {
    let count = persist::story_count(doc);
    for mut story in persist::load_stories(doc, count) {
        let Some(mut reporter) = registry.instantiate(&story.reporter_id) else {
            warn!(target: "runtime", reporter = %story.reporter_id,
                story = %story.identity, "reporter_unavailable");
            continue;
        };
        reporter.unsecure(&mut story.reporter_parameters);
        if let Err(e) = reporter.set_requirements(&story.reporter_parameters) {
            warn!(target: "runtime", story = %story.identity, error = %e,
                "requirements_rejected");
            continue;
        }
        let identity = story.identity.clone();
        if let Err(e) = desk.add_story(story, reporter, now) {
            warn!(target: "runtime", story = %identity, error = %e, "restore_failed");
        }
    }
}

/// Cover local text files named on the command line.
fn cover_cli_stories(
    desk: &mut NewsDesk,
    registry: &ReporterRegistry,
    paths: &[PathBuf],
    now: u64,
) {
    let urls: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    for path in accepted_drops(&urls) {
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone())
            .display()
            .to_string();
        match registry.best_for("Local", &absolute) {
            Ok(reporter) => {
                let story = StoryInfo {
                    story: absolute.clone(),
                    identity: absolute.clone(),
                    reporter_beat: "Local".into(),
                    reporter_id: reporter.plugin_id().to_string(),
                    ..StoryInfo::default()
                };
                if let Err(e) = desk.add_story(story, reporter, now) {
                    warn!(target: "runtime", story = %absolute, error = %e, "cover_failed");
                }
            }
            Err(e) => warn!(target: "runtime", story = %absolute, error = %e, "no_reporter"),
        }
    }
}

async fn run(
    args: Args,
    config: Config,
    registry: ReporterRegistry,
    runtime_dir: PathBuf,
) -> Result<()> {
    let settings_path = settings_path(&args, &config, &runtime_dir);
    // a parse failure keeps the on-disk file untouched and starts fresh
    let mut doc = match Document::load("newsroom", &settings_path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(target: "runtime", error = %e, "settings_unreadable");
            Document::new("newsroom")
        }
    };
    let styles = persist::load_styles(&mut doc, DEFAULT_STYLESHEET);

    let logical = Rect::new(
        0,
        0,
        config.file.surface.width,
        config.file.surface.height,
    );
    let (signal_tx, mut signal_rx) = unbounded_channel();
    let mut desk = NewsDesk::new(
        Arc::new(FixedDisplays::single(logical)),
        Box::new(ScaledMetrics),
        styles,
        FontSpec::default(),
        signal_tx,
    );

    restore_stories(&mut desk, &mut doc, &registry, 0);
    cover_cli_stories(&mut desk, &registry, &args.stories, 0);

    let mut surface = TerminalSurface::new(logical)?;
    let transport = ReqwestTransport::new();
    let (fetch_tx, mut fetch_rx) = unbounded_channel::<(String, Result<Vec<u8>, String>)>();

    let start = Instant::now();
    let now_ms = |start: Instant| start.elapsed().as_millis() as u64;

    let mut tick = tokio::time::interval(Duration::from_millis(desk.tick_interval_ms()));
    let mut pump = tokio::time::interval(Duration::from_millis(desk.pump_interval_ms()));
    let mut input = EventStream::new();
    let mut hovered: Option<(ChyronId, HeadlineId)> = None;

    info!(target: "runtime.events", "event_loop_started");
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = now_ms(start);
                desk.tick(now);
                surface.render(&desk.paints())?;
            }
            _ = pump.tick() => {
                let now = now_ms(start);
                for job in desk.pump_pollers(now) {
                    let fetch = transport.fetch(job.request, job.auth);
                    let tx = fetch_tx.clone();
                    let url = job.poller_url;
                    tokio::spawn(async move {
                        let result = fetch.await;
                        let _ = tx.send((url, result));
                    });
                }
            }
            Some(signal) = signal_rx.recv() => {
                desk.handle_signal(signal, now_ms(start));
            }
            Some((url, result)) = fetch_rx.recv() => {
                desk.handle_fetch_result(&url, now_ms(start), result);
            }
            Some(event) = input.next() => {
                match event {
                    Ok(event) => {
                        if handle_input(&mut desk, &mut surface, &mut hovered, event, now_ms(start)) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(target: "runtime.events", error = %e, "input_error");
                        break;
                    }
                }
            }
        }
    }

    desk.save(&mut doc);
    doc.flush(&settings_path)
        .with_context(|| format!("flushing settings to {}", settings_path.display()))?;
    info!(target: "runtime", "shutdown");
    Ok(())
}

/// Returns true when the application should quit.
fn handle_input(
    desk: &mut NewsDesk,
    surface: &mut TerminalSurface,
    hovered: &mut Option<(ChyronId, HeadlineId)>,
    event: TermEvent,
    now: u64,
) -> bool {
    match event {
        TermEvent::Key(key) => {
            matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                || (key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL))
        }
        TermEvent::Resize(cols, rows) => {
            surface.resize(cols, rows);
            false
        }
        TermEvent::Mouse(mouse) if matches!(mouse.kind, MouseEventKind::Moved) => {
            let point = surface.cell_to_logical(mouse.column, mouse.row);
            let hit = desk.hit_test(point);
            if hit != *hovered {
                if let Some((chyron, headline)) = hovered.take() {
                    desk.pointer_leave(chyron, headline, now);
                }
                if let Some((chyron, headline)) = hit {
                    desk.pointer_enter(chyron, headline, now);
                }
                *hovered = hit;
            }
            false
        }
        _ => false,
    }
}
