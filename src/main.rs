//! Reactz terminal frontend
//!
//! Buttons are read from stdin, one name per line (`confirm`, `up`, `down`,
//! `left`, `right`, `cancel`). Frames are printed whenever they change.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};

use reactz::app::{App, Button, DrawSurface, Tone};
use reactz::network::{Transport, UdpTransport};
use reactz::protocol::DEFAULT_PORT;
use reactz::time::MonotonicClock;
use reactz::Config;

const FRAME_MS: u32 = 50;

/// Multiplayer reaction game over a broadcast LAN
#[derive(Parser)]
#[command(name = "reactz", version)]
struct Cli {
    /// Local address to bind
    #[arg(long, default_value_t = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))]
    bind: SocketAddrV4,

    /// Destination of room advertisements
    #[arg(long, default_value_t = SocketAddrV4::new(Ipv4Addr::BROADCAST, DEFAULT_PORT))]
    broadcast: SocketAddrV4,

    /// JSON file overriding the default timings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Prints frames to stdout, skipping repeats
#[derive(Default)]
struct Terminal {
    tone: Option<Tone>,
    lines: Vec<String>,
    shown: Vec<String>,
}

impl DrawSurface for Terminal {
    fn begin_frame(&mut self, tone: Tone) {
        self.tone = Some(tone);
        self.lines.clear();
    }

    fn text(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn end_frame(&mut self) {
        if self.lines == self.shown {
            return;
        }
        println!("---- {:?} ----", self.tone.unwrap_or(Tone::Menu));
        for line in &self.lines {
            println!("{line}");
        }
        self.shown = self.lines.clone();
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = load_config(cli.config.as_deref())?;
    let transport = UdpTransport::bind(cli.bind, cli.broadcast)
        .with_context(|| format!("binding {}", cli.bind))?;
    tracing::info!("listening on {} as {}", cli.bind, transport.local_identity());

    let mut app = App::new(
        Arc::new(transport),
        Arc::new(MonotonicClock::new()),
        config,
        StdRng::from_entropy(),
    );
    let mut terminal = Terminal::default();
    app.draw(&mut terminal);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut frames = tokio::time::interval(Duration::from_millis(FRAME_MS.into()));

    while !app.should_quit() {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Button>() {
                    Ok(button) => {
                        if let Err(e) = app.handle_button(button).await {
                            eprintln!("{e}");
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            _ = frames.tick() => app.update(FRAME_MS),
        }
        app.draw(&mut terminal);
    }

    Ok(())
}
