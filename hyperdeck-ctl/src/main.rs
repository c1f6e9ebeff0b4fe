//! hyperdeck-ctl entry point.
//!
//! ```text
//! hyperdeck-ctl status                      One-shot command with defaults
//! hyperdeck-ctl --host 10.0.0.5 watch       Stream events until Ctrl-C
//! hyperdeck-ctl --config <path> clips       Use custom config TOML
//! hyperdeck-ctl --gen-config                Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hyperdeck_core::{Command, Deck, DeckEvent};
use hyperdeck_ctl::config::CtlConfig;
use hyperdeck_ctl::render;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hyperdeck-ctl", about = "Control a HyperDeck over Ethernet")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "hyperdeck-ctl.toml")]
    config: PathBuf,

    /// Deck address (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Deck control port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print events until Ctrl-C or until the connection drops.
    Watch {
        /// One JSON object per event.
        #[arg(long)]
        json: bool,
    },
    /// Check the deck answers.
    Ping,
    /// Start recording.
    Record {
        /// Clip name.
        #[arg(long)]
        name: Option<String>,
    },
    Stop,
    /// Start playback.
    Play {
        /// Stop at the end of the current clip.
        #[arg(long)]
        single: bool,
        #[arg(long = "loop")]
        looped: bool,
        /// Speed multiplier, clamped to ±16.
        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        speed: f64,
    },
    /// Select a clip.
    Goto(GotoArgs),
    /// Jump to a timecode.
    Jog { timecode: String },
    /// List clips.
    Clips,
    /// Show transport status.
    Status,
    /// Show or change the active media slot.
    Slot {
        #[arg(long)]
        select: Option<u32>,
    },
    /// Send a protocol command verbatim.
    Raw { text: String },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct GotoArgs {
    /// 0-based clip index.
    #[arg(long)]
    index: Option<i64>,
    /// Relative move from the current clip.
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<i64>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&CtlConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = CtlConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(action) = cli.command else {
        return Err("no command given; see --help".into());
    };

    info!("hyperdeck-ctl v{}", env!("CARGO_PKG_VERSION"));
    let deck = Deck::new(config.connection_info(), config.engine_config());
    deck.connect().await?;

    let outcome = run(&deck, action).await;
    deck.close().await;
    outcome
}

async fn run(deck: &Deck, action: Action) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        Action::Watch { json } => watch(deck, json).await?,
        Action::Ping => report(deck.connected().await?),
        Action::Record { name: Some(name) } => report(deck.record_named(name).await?),
        Action::Record { name: None } => report(deck.record().await?),
        Action::Stop => report(deck.stop().await?),
        Action::Play {
            single,
            looped,
            speed,
        } => report(deck.play(single, looped, speed).await?),
        Action::Goto(GotoArgs {
            index: Some(index), ..
        }) => report(deck.select_clip_by_index(index).await?),
        Action::Goto(GotoArgs {
            offset: Some(offset),
            ..
        }) => report(deck.select_clip_by_offset(offset).await?),
        Action::Goto(_) => return Err("goto needs --index or --offset".into()),
        Action::Jog { timecode } => report(deck.jog_to_timecode(timecode).await?),
        Action::Clips => println!("{}", render::clip_table(&deck.clips())),
        Action::Status => println!("{}", render::properties(&deck.status())),
        Action::Slot { select: Some(slot) } => report(deck.select_slot(slot).await?),
        Action::Slot { select: None } => {
            println!("{}", render::properties(&deck.slot_info(None).await?));
        }
        Action::Raw { text } => {
            let response = deck.send(Command::Raw(text)).await?;
            println!("{}", render::response(&response));
        }
    }
    Ok(())
}

fn report(accepted: bool) {
    if accepted {
        println!("ok");
    } else {
        println!("rejected by deck");
    }
}

async fn watch(deck: &Deck, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = deck.subscribe();
    println!("{}", render::clip_table(&deck.clips()));
    println!("{}", render::properties(&deck.status()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if json {
                    println!("{}", render::event_json(&event)?);
                } else {
                    println!("{}", render::event_line(&event));
                }
                if let DeckEvent::ConnectionLost { .. } = event {
                    warn!("deck connection lost");
                    break;
                }
            }
        }
    }
    Ok(())
}
