use clap::{ArgAction, Parser, Subcommand};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pitchpenguin::api::{GameApi, HttpGameApi};
use pitchpenguin::config::ClientConfig;
use pitchpenguin::mascot::{Mascot, StatusWatcher, TriggerRegistry};
use pitchpenguin::session::{mascot_options, Session};
use pitchpenguin::socket::RoomSocket;
use pitchpenguin::store::LocalStore;
use pitchpenguin::sync::{Navigator, PhaseSync, Route, SyncOptions, SyncView, SystemClock};
use pitchpenguin::types::{MascotSpecies, Player};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "pitchpenguin")]
#[command(about = "Terminal client for Pitch Penguin rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a room: phase, countdown, redirects and mascot reactions
    Watch {
        /// Room code (defaults to the last joined room)
        code: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
        /// Page to start on, e.g. `lobby` or `pitch`
        #[arg(short, long, default_value = "lobby")]
        page: String,
        /// Poll only, without the push socket
        #[arg(long)]
        no_socket: bool,
    },
    /// Create a room and join it as host
    Create {
        name: String,
        #[arg(short, long)]
        mascot: Option<String>,
    },
    /// Join an existing room
    Join {
        code: String,
        name: String,
        #[arg(short, long)]
        mascot: Option<String>,
    },
    /// Leave a room and forget it locally
    Leave {
        code: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Mark yourself ready (or not ready with --not)
    Ready {
        code: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        not: bool,
    },
    /// List mascots, or pick one
    Mascot {
        species: Option<String>,
        #[arg(short, long)]
        code: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Turn sound effects on or off
    Sound {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

/// Navigator for a terminal: there is no page to swap, so redirects are logged
struct LogNavigator;

impl Navigator for LogNavigator {
    fn replace(&self, path: &str) {
        tracing::info!("Navigate to {}", path);
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitchpenguin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    tracing::debug!("Using API at {}", config.api_url);

    if let Err(e) = run(cli.command, config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: ClientConfig) -> CliResult<()> {
    let api: Arc<dyn GameApi> = Arc::new(HttpGameApi::from_config(&config)?);
    let store = match LocalStore::open(&config.store_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                "Failed to open {}: {}. Local state will not persist.",
                config.store_path.display(),
                e
            );
            LocalStore::in_memory()
        }
    };
    let session = Session::new(api.clone(), store);

    match command {
        Commands::Watch {
            code,
            name,
            page,
            no_socket,
        } => {
            let code = resolve_code(&session, code)?;
            let name = name.or_else(|| session.player_for(&code));
            let (page, _) = Route::parse(&format!("/{}/{}", page.trim_matches('/'), code));
            watch(api, &config, code, name, page, no_socket).await
        }
        Commands::Create { name, mascot } => {
            let code = session
                .create_room(&name, mascot.as_deref().map(MascotSpecies::from_id))
                .await?;
            println!("Created room {}", code);
            Ok(())
        }
        Commands::Join { code, name, mascot } => {
            session
                .join(&code, &name, mascot.as_deref().map(MascotSpecies::from_id))
                .await?;
            println!("Joined {} as {}", code.to_uppercase(), name.trim());
            Ok(())
        }
        Commands::Leave { code, name } => {
            let code = resolve_code(&session, code)?;
            let name = resolve_name(&session, &code, name)?;
            session.leave(&code, &name).await?;
            println!("Left room {}", code);
            Ok(())
        }
        Commands::Ready { code, name, not } => {
            let code = resolve_code(&session, code)?;
            let name = resolve_name(&session, &code, name)?;
            session.set_ready(&code, &name, !not).await?;
            println!("{} is {}", name, if not { "not ready" } else { "ready" });
            Ok(())
        }
        Commands::Mascot {
            species,
            code,
            name,
        } => {
            let code = resolve_code(&session, code)?;
            let name = resolve_name(&session, &code, name)?;
            let roster = api.room(&code).await?.players;

            match species {
                Some(species) => {
                    let species = MascotSpecies::from_id(&species);
                    session.select_mascot(&code, &name, species, &roster).await?;
                    println!("{} is now the {}", name, species);
                }
                None => {
                    for option in mascot_options(&roster, Some(&name)) {
                        let holder = option
                            .taken_by
                            .map(|holder| format!(" (taken by {})", holder))
                            .unwrap_or_default();
                        let marker = if option.disabled { "-" } else { "*" };
                        println!("{} {}{}", marker, option.species, holder);
                    }
                }
            }
            Ok(())
        }
        Commands::Sound { enabled } => {
            session.set_sfx_enabled(enabled);
            println!("Sound effects {}", if enabled { "on" } else { "off" });
            Ok(())
        }
    }
}

fn resolve_code(session: &Session, code: Option<String>) -> CliResult<String> {
    code.map(|c| c.trim().to_uppercase())
        .or_else(|| session.last_room())
        .ok_or_else(|| "No room code given and no room joined yet".into())
}

fn resolve_name(session: &Session, code: &str, name: Option<String>) -> CliResult<String> {
    name.or_else(|| session.player_for(code))
        .ok_or_else(|| format!("No player name known for room {}", code).into())
}

async fn watch(
    api: Arc<dyn GameApi>,
    config: &ClientConfig,
    code: String,
    name: Option<String>,
    page: Route,
    no_socket: bool,
) -> CliResult<()> {
    let (socket, pushes) = match (&name, no_socket) {
        (Some(name), false) => match RoomSocket::connect(&config.socket_url(), &code, name).await {
            Ok((socket, pushes)) => (Some(socket), Some(pushes)),
            Err(e) => {
                tracing::warn!("{}. Falling back to polling only.", e);
                (None, None)
            }
        },
        _ => (None, None),
    };

    let mut options = SyncOptions::new(code.clone(), page).with_poll_interval(config.poll_interval);
    if let Some(name) = &name {
        options = options.with_player(name.clone());
    }

    let handle = PhaseSync::spawn(
        api,
        Arc::new(LogNavigator),
        Arc::new(SystemClock),
        options,
        pushes,
    );

    let registry = TriggerRegistry::new();
    let mut mascots = HashMap::new();
    let mut watcher = StatusWatcher::new();
    let mut updates = handle.subscribe();
    let mut last_status = String::new();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();

                mount_mascots(&registry, &mut mascots, &view.players);
                for (player, event) in watcher.observe(&view, &registry) {
                    match mascots.get(&player.to_lowercase()) {
                        Some(mascot) => println!("  {} {}: {}", player, event, mascot.frame().classes().join(" ")),
                        None => println!("  {} {}", player, event),
                    }
                }

                let status = status_line(&view);
                if status != last_status {
                    println!("{}", status);
                    last_status = status;
                }

                if view.room_missing {
                    println!("Room {} no longer exists", code);
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    handle.stop().await;
    if let Some(socket) = socket {
        if let Err(e) = socket.leave().await {
            tracing::debug!("Socket leave failed: {}", e);
        }
    }
    Ok(())
}

/// Keep one registered mascot per roster player that picked one
fn mount_mascots(registry: &TriggerRegistry, mascots: &mut HashMap<String, Mascot>, players: &[Player]) {
    for player in players {
        let Some(species) = player.mascot else {
            continue;
        };
        let key = player.name.to_lowercase();
        if mascots.get(&key).map(Mascot::species) != Some(species) {
            let mascot = Mascot::new(species);
            registry.register(&player.name, Some(mascot.trigger_fn()));
            mascots.insert(key, mascot);
        }
    }

    mascots.retain(|key, _| {
        let present = players
            .iter()
            .any(|p| p.mascot.is_some() && p.name.to_lowercase() == *key);
        if !present {
            registry.register(key, None);
        }
        present
    });
}

fn status_line(view: &SyncView) -> String {
    let phase = view
        .phase
        .map(|p| p.to_string())
        .unwrap_or_else(|| "connecting".to_string());
    let mut line = format!("[{}] round {}", phase, view.round);
    if let Some(secs) = view.seconds_left {
        line.push_str(&format!(", {}s left", secs));
    }
    if !view.ready.is_empty() {
        let ready = view.ready.values().filter(|r| **r).count();
        line.push_str(&format!(", {}/{} ready", ready, view.ready.len()));
    }
    if !view.scores.is_empty() {
        let mut scores: Vec<_> = view.scores.iter().collect();
        scores.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let scores: Vec<String> = scores
            .into_iter()
            .map(|(name, score)| format!("{} {}", name, score))
            .collect();
        line.push_str(&format!(", scores: {}", scores.join(", ")));
    }
    if let Some(page) = view.page {
        line.push_str(&format!(" on {}", page));
    }
    line
}
