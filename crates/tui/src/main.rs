//! Terminal viewer for `.thread.jsonl` conversation logs.

mod app;
mod config;
mod tail;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::tail::FileTail;

#[derive(Parser)]
#[command(name = "threadview", version, about = "Terminal viewer for thread conversation logs")]
struct Cli {
    /// Path to a .thread.jsonl log
    log: PathBuf,

    /// Keep watching the log and show appended content live
    #[arg(long, short = 'f')]
    follow: bool,

    /// Write debug logs to this file (the terminal itself is in raw mode)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;
    let config = config::load();

    let mut tail = FileTail::new(
        cli.log.clone(),
        Duration::from_millis(config.live.debounce_ms),
    );
    let thread = tail.load_now()?;
    let mut app = App::new(thread, tail, cli.follow, &config);

    enable_raw_mode().context("enable raw mode")?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &config);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    config: &config::Config,
) -> Result<()> {
    let tick = Duration::from_millis(config.live.poll_interval_ms);
    loop {
        app.poll_live();
        terminal.draw(|frame| ui::render(frame, app))?;
        app.after_frame();

        if event::poll(tick)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.handle_key(key);
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env("THREADVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .init();
    Ok(())
}
