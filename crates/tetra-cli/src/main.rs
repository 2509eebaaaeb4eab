use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use tetra_cam::autodetect::{autodetect_camera, default_candidate_bauds, default_candidate_devs, AutodetectResult};
use tetra_cam::doctor as cam_doctor;
use tetra_cam::{Camera, CameraConfig, Grid, LinkStats, Viewport};
use tetra_link::SerialTransport;
use tetra_proto::event::ScanEvent;
use tetra_proto::report::ScanReport;
use tetra_scan::doctor as scan_doctor;
use tetra_scan::{Alliance, Deadline, FieldSide, Opcode, ScanConfig, Scanner, StartingPosition};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "tetra", version, about = "tetrascan - CMUcam2 grid scanner for tetra pickup")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config, grid, scan program and translation table.
    Doctor,
    /// Probe serial ports/bauds for a camera that answers a ping.
    Autodetect,
    /// Print the grid cells and the window each one is read through.
    Grid,
    /// Print the scan program, or one starting position's block.
    Program {
        #[arg(long)]
        position: Option<u8>,
    },
    /// Read and classify a single cell, dumping the raw reply.
    Probe { x: u16, y: u16 },
    /// Run a full scan and print the result as JSON.
    Scan {
        #[arg(long)]
        alliance: Option<Alliance>,
        #[arg(long)]
        side: Option<FieldSide>,
        /// Raw starting position; overrides alliance/side.
        #[arg(long)]
        position: Option<u8>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    camera: CameraConfig,
    #[serde(default)]
    grid: GridCfg,
    #[serde(default)]
    scan: ScanConfig,
    #[serde(default)]
    robot: RobotCfg,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct GridCfg {
    width: u16,
    height: u16,
    x_cells: u16,
    y_cells: u16,
}

impl Default for GridCfg {
    fn default() -> Self {
        Self { width: 160, height: 150, x_cells: 26, y_cells: 26 }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RobotCfg {
    alliance: Option<Alliance>,
    side: Option<FieldSide>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Autodetect => autodetect(&cfg)?,
        Command::Grid => print_grid(&cfg)?,
        Command::Program { position } => print_program(&cfg, position)?,
        Command::Probe { x, y } => probe(&cfg, x, y)?,
        Command::Scan { alliance, side, position } => {
            let alliance = alliance.or(cfg.robot.alliance);
            let side = side.or(cfg.robot.side);
            let position = match position {
                Some(p) => StartingPosition::new(p),
                None => StartingPosition::from_field(
                    alliance.context("robot.alliance missing (or pass --alliance)")?,
                    side.context("robot.side missing (or pass --side)")?,
                ),
            };
            scan(&cfg, position, alliance, side).await?
        }
    }
    Ok(())
}

fn build_grid(cfg: &Config) -> Result<Grid> {
    let g = &cfg.grid;
    cam_doctor::check_grid(Viewport { width: g.width, height: g.height }, g.x_cells, g.y_cells).context("grid")
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    cam_doctor::check_camera(&cfg.camera)?;
    let grid = build_grid(cfg)?;
    scan_doctor::check_timing(&cfg.scan)?;

    let program = cfg.scan.program().context("scan.program")?;
    let translation = cfg.scan.translation().context("scan.translation")?;
    scan_doctor::check_program(&program, &grid)?;
    scan_doctor::check_translation(&program, &translation)?;

    if cfg.camera.autodetect {
        info!("doctor: camera autodetect enabled (OK)");
    }
    let worst = cfg.camera.polling.worst_case(cfg.camera.polling.ack_polls * 2 + cfg.camera.polling.mean_polls);
    if worst > cfg.scan.tick_budget() {
        warn!("doctor: one unanswered probe can take {:?}, longer than the {:?} tick budget", worst, cfg.scan.tick_budget());
    }

    info!("doctor: OK");
    Ok(())
}

fn autodetect(cfg: &Config) -> Result<()> {
    let res = run_camera_autodetect(&cfg.camera)?;
    if let Some((dev, baud)) = res.chosen {
        println!("CHOSEN: {} @ {}", dev, baud);
    } else {
        println!("CHOSEN: none");
    }
    for p in res.probes {
        println!("probe dev={} baud={} ack={} {}ms note={}", p.dev, p.baud, p.acked, p.elapsed_ms, p.note);
    }
    Ok(())
}

fn print_grid(cfg: &Config) -> Result<()> {
    let grid = build_grid(cfg)?;
    let (xs, ys) = grid.steps();
    let (xr, yr) = grid.residuals();
    println!("steps={}x{} residuals={}x{}", xs, ys, xr, yr);
    for (x, y, b) in grid.cells() {
        println!("cell {:>2} {:>2}: x {:>3}..{:<3} y {:>3}..{:<3} {}", x, y, b.x0, b.x1, b.y0, b.y1, b.window());
    }
    Ok(())
}

fn print_program(cfg: &Config, position: Option<u8>) -> Result<()> {
    let program = cfg.scan.program().context("scan.program")?;
    let translation = cfg.scan.translation().context("scan.translation")?;

    let ops: &[Opcode] = match position {
        Some(p) => program.block(p).with_context(|| format!("no scan block for position {}", p))?,
        None => program.ops(),
    };
    for (i, op) in ops.iter().enumerate() {
        println!("{:>3} {}", i, serde_json::to_string(op)?);
    }
    if let Some(p) = position {
        let pos = StartingPosition::new(p);
        println!("targets={:?} translation={:?}", program.virtual_targets(p), translation.row(pos));
    }
    Ok(())
}

fn open_camera(cam: &CameraConfig) -> Result<Camera<SerialTransport>> {
    let (dev, baud) = resolve_camera_port(cam)?;
    let link = SerialTransport::open(&dev, baud).context("camera open")?;
    info!("camera: using {} @ {}", link.dev(), link.baud());
    Ok(Camera::new(link, cam))
}

fn probe(cfg: &Config, x: u16, y: u16) -> Result<()> {
    let grid = build_grid(cfg)?;
    let mut cam_cfg = cfg.camera.clone();
    cam_cfg.verbose = true;
    let mut cam = open_camera(&cam_cfg)?;

    cam.initialize().context("camera setup")?;
    let sample = cam.sample(&grid, x, y).with_context(|| format!("probe cell ({}, {})", x, y))?;
    println!("cell {} {}: {:?} bytes={:?}", x, y, sample.category, sample.bytes);
    print_stats(cam.stats());
    Ok(())
}

async fn scan(cfg: &Config, position: StartingPosition, alliance: Option<Alliance>, side: Option<FieldSide>) -> Result<()> {
    let grid = build_grid(cfg)?;
    let program = cfg.scan.program().context("scan.program")?;
    let translation = cfg.scan.translation().context("scan.translation")?;
    scan_doctor::check_program(&program, &grid)?;
    if !position.is_known() {
        warn!("scan: {} is not on the field; the scan will report zeros", position);
    }
    if let Err(e) = scan_doctor::check_translation(&program, &translation) {
        warn!("{:#}", e);
    }

    let camera = open_camera(&cfg.camera)?;
    let (ev_tx, ev_rx) = mpsc::channel::<ScanEvent>(256);
    let logger = tokio::spawn(log_events(ev_rx));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let tick = cfg.scan.tick();
    let budget = cfg.scan.tick_budget();
    let mut scanner = Scanner::new(camera, program, translation, grid).with_events(ev_tx);
    info!("scan: {} tick={:?} budget={:?}", position, tick, budget);

    // The camera link is blocking; run the tick loop off the async runtime.
    let outcome = tokio::task::spawn_blocking(move || {
        let mut next = Instant::now();
        loop {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let mut deadline = Deadline::after(budget);
            if let Some(result) = scanner.step(position, &mut deadline) {
                return Some((result, scanner.ticks(), scanner.camera().stats().clone()));
            }
            next += tick;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                next = now;
            }
        }
    })
    .await
    .context("scan task")?;

    // Scanner (and its event sender) is gone; the logger drains and exits.
    let _ = logger.await;

    let (result, ticks, stats) = outcome.context("scan interrupted")?;
    let report = ScanReport {
        ts_unix_ms: (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
        position: position.index(),
        alliance: alliance.map(|a| a.to_string()).unwrap_or_default(),
        side: side.map(|s| s.to_string()).unwrap_or_default(),
        counts: result.counts(),
        best_target: result.best(),
        ticks,
        acks: stats.acks,
        nacks: stats.nacks,
        timeouts: stats.timeouts,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    print_stats(&stats);
    Ok(())
}

async fn log_events(mut rx: mpsc::Receiver<ScanEvent>) {
    while let Some(ev) = rx.recv().await {
        let line = serde_json::to_string(&ev).unwrap_or_else(|_| format!("{:?}", ev));
        match ev {
            ScanEvent::PhaseEntered { .. } => debug!("scan event: {}", line),
            ScanEvent::CommandFailed { .. } | ScanEvent::NoStartMarker { .. } | ScanEvent::Untranslated { .. } => {
                warn!("scan event: {}", line)
            }
            ScanEvent::Sighting { .. } | ScanEvent::Finished { .. } => info!("scan event: {}", line),
        }
    }
}

fn print_stats(stats: &LinkStats) {
    println!(
        "link: acks={} nacks={} timeouts={} io_errors={} last={:?}",
        stats.acks, stats.nacks, stats.timeouts, stats.io_errors, stats.last_command
    );
}

fn run_camera_autodetect(cam: &CameraConfig) -> Result<AutodetectResult> {
    let devs = cam.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
    let bauds = cam.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
    autodetect_camera(devs, bauds, &cam.polling)
}

fn resolve_camera_port(cam: &CameraConfig) -> Result<(String, u32)> {
    if cam.autodetect {
        let res = run_camera_autodetect(cam)?;
        if let Some((dev, baud)) = res.chosen {
            return Ok((dev, baud));
        }
        anyhow::bail!("camera autodetect failed: nothing acknowledged a ping");
    } else {
        let dev = cam.serial_dev.clone().context("camera.serial_dev missing (autodetect=false)")?;
        Ok((dev, cam.baud))
    }
}
