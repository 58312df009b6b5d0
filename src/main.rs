//! Binary entrypoint for the mudlink CLI.
//!
//! Commands:
//! - `play [--world <file>]` - run an interactive session against the local world
//! - `init` - write a starter `config.toml` and a sample world file
//! - `check-world <file>` - validate a world file and print a summary
//!
//! See the library crate docs for module-level details: `mudlink::`.
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use mudlink::audio::{LogOutput, PlaybackHub, PlaybackSynchronizer};
use mudlink::backend::{LocalWorld, WorldSeed};
use mudlink::config::Config;
use mudlink::metrics;
use mudlink::services::Services;
use mudlink::session::Session;
use mudlink::term::{MetaCommand, TerminalPresenter};

#[derive(Parser)]
#[command(name = "mudlink")]
#[command(about = "Terminal client and session engine for text multiplayer worlds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Play {
        /// World file to load instead of the configured one
        #[arg(short, long)]
        world: Option<String>,
    },
    /// Write a default configuration and sample world
    Init,
    /// Validate a world file
    CheckWorld {
        /// Path to the world JSON file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    let interactive = matches!(cli.command, Commands::Play { .. });
    init_logging(&pre_config, cli.verbose, interactive);

    match cli.command {
        Commands::Play { world } => {
            let config = match pre_config {
                Some(config) => config,
                None => {
                    warn!("No usable config at {}; using defaults", cli.config);
                    Config::default()
                }
            };
            play(config, world).await?;
        }
        Commands::Init => {
            if Path::new(&cli.config).exists() {
                println!("Config {} already exists; leaving it alone.", cli.config);
            } else {
                Config::create_default(&cli.config).await?;
                println!("Wrote {}", cli.config);
            }
            let config = Config::load(&cli.config).await?;
            if Path::new(&config.world.file).exists() {
                println!("World {} already exists; leaving it alone.", config.world.file);
            } else {
                WorldSeed::sample().save(&config.world.file).await?;
                println!("Wrote sample world {}", config.world.file);
            }
            println!("Run `mudlink play` to start.");
        }
        Commands::CheckWorld { file } => {
            let seed = WorldSeed::load(&file).await?;
            let npcs: usize = seed.rooms.iter().map(|r| r.npcs.len()).sum();
            println!(
                "{}: OK ({} rooms, {} regions, {} NPCs, start room '{}')",
                file,
                seed.rooms.len(),
                seed.regions.len(),
                npcs,
                seed.start_room
            );
        }
    }

    Ok(())
}

async fn play(config: Config, world_override: Option<String>) -> Result<()> {
    let world_file = world_override.unwrap_or_else(|| config.world.file.clone());
    let world = Arc::new(LocalWorld::from_file(&world_file).await?);
    info!("Starting mudlink v{} with world {}", env!("CARGO_PKG_VERSION"), world_file);

    let hub = PlaybackHub::global();
    hub.configure(config.audio.enabled, config.audio.volume);
    let playback = PlaybackSynchronizer::attach(hub, LogOutput::boxed);
    let mut session = Session::new(config.session.clone(), Services::from_backend(world), playback);
    let mut presenter = TerminalPresenter::new();

    loop {
        flush(&mut presenter, &session);
        print!("{}", session.prompt());
        if !session.prompt().ends_with(' ') {
            print!(" ");
        }
        std::io::stdout().flush()?;

        let secret = session.expects_secret();
        let read = tokio::task::spawn_blocking(move || read_line(secret));
        tokio::pin!(read);
        let line = loop {
            tokio::select! {
                res = &mut read => break res??,
                event = session.next_event() => {
                    session.handle_event(event).await;
                    flush(&mut presenter, &session);
                }
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match MetaCommand::parse(&line) {
            None => session.handle_input(&line).await,
            Some(MetaCommand::Complete(partial)) => match session.autocomplete(&partial) {
                Some(candidate) => println!("-> {}", candidate),
                None => println!("(no completions)"),
            },
            Some(MetaCommand::Previous) => {
                println!("{}", session.recall_previous().unwrap_or_default())
            }
            Some(MetaCommand::Next) => println!("{}", session.recall_next().unwrap_or_default()),
            Some(MetaCommand::Audio(on)) => session.set_audio(on).await,
            Some(MetaCommand::TrackEnd) => session.on_track_end().await,
            Some(MetaCommand::Metrics) => {
                let snap = metrics::snapshot();
                println!(
                    "rendered={} dropped={} commands={} failed_submissions={} playback_starts={} playback_errors={}",
                    snap.lines_rendered,
                    snap.dropped_total(),
                    snap.commands_dispatched,
                    snap.submissions_failed,
                    snap.playback_starts,
                    snap.playback_errors
                );
            }
            Some(MetaCommand::Quit) => break,
            Some(MetaCommand::Unknown(what)) => println!("Unknown client command :{}", what),
        }
    }
    info!("Session ended");
    Ok(())
}

fn flush(presenter: &mut TerminalPresenter, session: &Session) {
    for text in presenter.drain(session.display()) {
        println!("{}", text);
    }
}

/// Read one line from stdin; `None` at end of input. Secret lines are read without echo.
fn read_line(secret: bool) -> std::io::Result<Option<String>> {
    if secret {
        return rpassword::read_password().map(Some);
    }
    let mut buf = String::new();
    if std::io::stdin().read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string()))
}

fn init_logging(config: &Option<Config>, verbosity: u8, interactive: bool) {
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|cfg| cfg.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let format_line = |record: &log::Record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        format!("{} [{}] {}: {}", ts, record.level(), record.target(), record.args())
    };
    let log_file = config.as_ref().and_then(|cfg| cfg.logging.file.clone());
    let security_path = config
        .as_ref()
        .and_then(|cfg| cfg.logging.security_file.clone());
    match log_file.and_then(|file| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    }) {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Echo to the console only for one-shot commands on a terminal; during play the
            // console belongs to the transcript.
            let echo = !interactive && atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let line = format_line(record);
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }
                if echo {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            if interactive && verbosity == 0 {
                builder.filter_level(base_level.min(log::LevelFilter::Warn));
            }
            builder.format(move |fmt, record| writeln!(fmt, "{}", format_line(record)));
        }
    }
    let _ = builder.try_init();
}
