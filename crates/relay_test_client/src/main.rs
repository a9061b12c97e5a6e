//! # Frag Relay - Player Simulation Client
//!
//! Opens several WebSocket players against a running relay and plays a
//! crude match: every player wanders around sending position chatter and
//! now and then reports a kill on a random peer it knows about. At the end
//! each player prints what it saw, and the run prints the kill counts the
//! relay should be reporting.

use clap::Parser;
use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::{interval, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate")]
#[command(about = "Frag Relay - multiplayer match simulation client")]
struct Args {
    /// Relay WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8887")]
    url: String,

    /// Number of simultaneous players to simulate
    #[arg(short, long, default_value = "4")]
    players: u32,

    /// Simulation duration in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// Kill reports per player per minute
    #[arg(short, long, default_value = "6.0")]
    kill_freq: f64,

    /// Position updates per player per second
    #[arg(short, long, default_value = "5.0")]
    move_freq: f64,

    /// Side length of the square arena
    #[arg(long, default_value = "100.0")]
    arena: f32,
}

/// A frame received from the relay, classified by its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ServerFrame {
    Identity(u8),
    Joined(u8),
    Left(u8),
    Kill { killer: String, killed: String },
    Other(String),
}

impl ServerFrame {
    fn parse(text: &str) -> Self {
        let mut chars = text.chars();
        let tag = chars.next();
        let rest = chars.as_str();

        match tag {
            Some('I') => rest.parse().map(Self::Identity).ok(),
            Some('J') => rest.parse().map(Self::Joined).ok(),
            Some('L') => rest.parse().map(Self::Left).ok(),
            Some('K') => rest.split_once(';').map(|(killer, killed)| Self::Kill {
                killer: killer.to_string(),
                killed: killed.to_string(),
            }),
            _ => None,
        }
        .unwrap_or_else(|| Self::Other(text.to_string()))
    }
}

/// What a single player saw and sent during the run.
#[derive(Debug, Default)]
struct PlayerReport {
    id: Option<u8>,
    joins_seen: u32,
    leaves_seen: u32,
    kills_seen: u32,
    chatter_seen: u32,
    moves_sent: u32,
    kills_sent: u32,
}

/// Simulated player state.
struct SimulatedPlayer {
    index: u32,
    id: Option<u8>,
    position: (f32, f32),
    peers: BTreeSet<u8>,
    rng: StdRng,
    report: PlayerReport,
}

impl SimulatedPlayer {
    fn new(index: u32, arena: f32) -> Self {
        let mut rng = StdRng::from_entropy();
        let position = (rng.gen_range(0.0..arena), rng.gen_range(0.0..arena));
        Self {
            index,
            id: None,
            position,
            peers: BTreeSet::new(),
            rng,
            report: PlayerReport::default(),
        }
    }

    fn observe(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Identity(id) => {
                info!("🎮 Player #{} was given id {}", self.index, id);
                self.id = Some(id);
                self.report.id = Some(id);
            }
            ServerFrame::Joined(id) => {
                debug!("Player #{} sees {} join", self.index, id);
                self.peers.insert(id);
                self.report.joins_seen += 1;
            }
            ServerFrame::Left(id) => {
                debug!("Player #{} sees {} leave", self.index, id);
                self.peers.remove(&id);
                self.report.leaves_seen += 1;
            }
            ServerFrame::Kill { killer, killed } => {
                debug!("Player #{} sees {} kill {}", self.index, killer, killed);
                self.report.kills_seen += 1;
            }
            ServerFrame::Other(text) => {
                // position chatter carries the sender's id first
                if let Some(sender) = text
                    .strip_prefix('P')
                    .and_then(|rest| rest.split(';').next())
                    .and_then(|id| id.parse::<u8>().ok())
                {
                    self.peers.insert(sender);
                }
                self.report.chatter_seen += 1;
            }
        }
    }

    /// Moves one random step and returns the position frame to send.
    fn step(&mut self, arena: f32) -> Option<String> {
        let id = self.id?;
        let (x, y) = self.position;
        let dx: f32 = self.rng.gen_range(-2.0..=2.0);
        let dy: f32 = self.rng.gen_range(-2.0..=2.0);
        self.position = ((x + dx).clamp(0.0, arena), (y + dy).clamp(0.0, arena));
        self.report.moves_sent += 1;
        Some(format!("P{};{:.1};{:.1}", id, self.position.0, self.position.1))
    }

    /// Picks a known peer to kill and returns the report frame.
    fn kill(&mut self) -> Option<(u8, String)> {
        let id = self.id?;
        if self.peers.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range(0..self.peers.len());
        let victim = *self.peers.iter().nth(pick)?;
        self.report.kills_sent += 1;
        Some((victim, format!("K{id};{victim}")))
    }
}

async fn simulate_player(index: u32, args: Args) -> Result<PlayerReport, BoxError> {
    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut player = SimulatedPlayer::new(index, args.arena);

    let mut move_timer = interval(Duration::from_secs_f64(1.0 / args.move_freq));
    move_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut kill_timer = interval(Duration::from_secs_f64(60.0 / args.kill_freq));
    kill_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // skip the immediate first tick so nobody shoots before anyone joined
    kill_timer.tick().await;

    let deadline = Instant::now() + Duration::from_secs(args.duration);

    loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => player.observe(ServerFrame::parse(text.as_str())),
                Some(Ok(Message::Close(frame))) => {
                    info!("🔌 Player #{} closed by relay: {:?}", index, frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("⚠️ Player #{} WebSocket error: {}", index, e);
                    break;
                }
                None => {
                    info!("🔌 Player #{} connection ended", index);
                    break;
                }
            },
            _ = move_timer.tick() => {
                if let Some(frame) = player.step(args.arena) {
                    ws_sender.send(Message::text(frame)).await?;
                }
            }
            _ = kill_timer.tick() => {
                if let Some((victim, frame)) = player.kill() {
                    info!("💥 Player #{} reports a kill on {}", index, victim);
                    ws_sender.send(Message::text(frame)).await?;
                }
            }
            _ = sleep_until(deadline) => {
                let _ = ws_sender.close().await;
                break;
            }
        }
    }

    Ok(player.report)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    if args.move_freq <= 0.0 || args.kill_freq <= 0.0 || args.arena <= 0.0 {
        return Err("--move-freq, --kill-freq and --arena must be positive".into());
    }

    info!("🚀 Starting match simulation");
    info!("   • Players: {}", args.players);
    info!("   • Duration: {} seconds", args.duration);
    info!("   • Movement: {:.1} Hz", args.move_freq);
    info!("   • Kills: {:.1}/min per player", args.kill_freq);
    info!("   • Relay: {}", args.url);

    let mut handles = Vec::new();
    for index in 0..args.players {
        let args = args.clone();
        handles.push(tokio::spawn(async move {
            (index, simulate_player(index, args).await)
        }));

        // stagger connections so join order is predictable
        sleep(Duration::from_millis(100)).await;
    }

    let mut expected_scores: BTreeMap<u8, u32> = BTreeMap::new();
    for handle in handles {
        match handle.await {
            Ok((index, Ok(report))) => {
                info!(
                    "📋 Player #{} (id {:?}): sent {} moves, {} kills | saw {} joins, {} leaves, {} kills, {} chatter",
                    index,
                    report.id,
                    report.moves_sent,
                    report.kills_sent,
                    report.joins_seen,
                    report.leaves_seen,
                    report.kills_seen,
                    report.chatter_seen
                );
                if let Some(id) = report.id {
                    if report.kills_sent > 0 {
                        *expected_scores.entry(id).or_default() += report.kills_sent;
                    }
                }
            }
            Ok((index, Err(e))) => error!("❌ Player #{} simulation failed: {}", index, e),
            Err(e) => error!("❌ Player task panicked: {}", e),
        }
    }

    info!("✅ Simulation complete");
    info!("🏆 Kill counts the relay should have credited while players were connected:");
    for (id, kills) in expected_scores {
        info!("   • client {}: {}", id, kills);
    }

    Ok(())
}
