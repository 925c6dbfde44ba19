mod app;
mod catalog;
mod command;
mod config;
mod error;
mod event;
mod input;
mod logging;
mod media;
mod queue;
mod runner;
mod supervisor;
mod terminal;
mod ui;
mod watcher;

use std::io;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, LeaveAlternateScreen},
};
use tracing::{error, info, warn};

use crate::app::Context;
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::input::KeyboardInput;
use crate::media::{MediaHandler, RomFilter, SystemMedia};
use crate::queue::EventQueue;
use crate::runner::MainLoop;
use crate::supervisor::{ProcessSupervisor, SystemProcessControl};
use crate::terminal::TerminalDisplay;

#[derive(Parser)]
#[command(name = "rom-kiosk", about = "Game kiosk with USB hot-loading")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the ROM directory from the config file
    #[arg(long)]
    catalog_dir: Option<PathBuf>,

    /// Override the menu frame rate from the config file
    #[arg(long)]
    fps: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("logging disabled: {e}");
    }

    let mut settings = config::load_settings(&cli.config);
    if let Some(dir) = cli.catalog_dir {
        settings.catalog.dir = dir;
    }
    if let Some(fps) = cli.fps {
        settings.menu.fps = fps;
    }
    settings.validate()?;
    info!(?settings, "configuration loaded");

    std::fs::create_dir_all(&settings.catalog.dir).with_context(|| {
        format!(
            "cannot create catalog directory {}",
            settings.catalog.dir.display()
        )
    })?;

    // ── Terminal setup ──────────────────────────────────────────
    let display = TerminalDisplay::new()?;

    // Panic hook: restore terminal before printing the panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
        original_hook(info);
    }));

    // ── Run ─────────────────────────────────────────────────────
    let result = run(display, &settings);
    if let Err(e) = &result {
        error!("fatal: {e:#}");
    }

    // ── Terminal teardown ───────────────────────────────────────
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)?;

    result
}

fn run(display: TerminalDisplay, settings: &Settings) -> Result<()> {
    let queue = EventQueue::new();
    let privilege = settings.emulator.privilege().map(String::from);

    // ── Hotplug watcher thread ──────────────────────────────────
    let handler = MediaHandler::new(
        SystemMedia::new(&settings.media.mount_root, privilege.clone()),
        RomFilter::new(&settings.media.extensions, &settings.media.sidecar_prefix),
        settings.catalog.dir.clone(),
        queue.clone(),
    );
    let _watcher = match watcher::spawn(
        &settings.media.watch_dir,
        &settings.media.sys_block_dir,
        settings.media.debounce_ms,
        handler,
    ) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("USB hot-loading disabled: {e:#}");
            None
        }
    };

    // ── Process supervisor ──────────────────────────────────────
    let supervisor = ProcessSupervisor::new(
        SystemProcessControl::new(
            settings.emulator.command.clone(),
            settings.emulator.args.clone(),
            privilege,
        ),
        queue.clone(),
        settings.emulator.poll_interval(),
    );

    let catalog = Catalog::load(&settings.catalog.dir);
    info!(dir = %catalog.dir().display(), count = catalog.items().len(), "catalog loaded");

    let context = Context::new(catalog, display, supervisor);
    MainLoop::new(
        context,
        queue,
        KeyboardInput::new(settings.menu.cursor_step),
        settings.menu.frame_duration(),
    )
    .run()
}
