mod auto;
mod cli;
mod config;
mod desk;
mod ui;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use auto::{stop_signal, Alternator, AutoSettings, StopHandle};
use cli::{Cli, Command};
use config::Config;
use desk::bluetooth::{self, DEFAULT_SCAN_SECS};
use desk::{Desk, Link, MoveOptions, Session};
use ui::DesktopNotifier;

/// How long blocked tasks (an open countdown dialog) may delay exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Move to `target_cm` and print where the desk ended up
async fn move_and_report<L: Link>(desk: &mut Desk<L>, target_cm: f32) -> Result<()> {
    log::info!("=== Moving to {:.1}cm ===", target_cm);
    let reached = desk
        .move_to_cm(target_cm, MoveOptions::default())
        .await
        .context("Move failed")?;

    let status = if reached { "Reached" } else { "Timeout" };
    println!("{}: {}", status, desk.height());
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn spawn_shutdown_listener(handle: StopHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        log::info!("Stop requested");
        handle.stop();
    })
}

fn auto_settings(interval_min: u64, countdown_secs: u64) -> AutoSettings {
    AutoSettings {
        interval: Duration::from_secs(interval_min.saturating_mul(60)),
        countdown_secs,
        move_options: MoveOptions::default(),
    }
}

async fn run_auto<L: Link>(
    desk: &mut Desk<L>,
    config: &Config,
    interval_min: u64,
    countdown_secs: u64,
) -> Result<()> {
    println!("Connected. Height: {}", desk.height());

    let (handle, mut stop) = stop_signal();
    let listener = spawn_shutdown_listener(handle);

    let settings = auto_settings(interval_min, countdown_secs);
    let mut alternator = Alternator::new(config.presets(), settings, DesktopNotifier);
    let result = alternator.run(desk, &mut stop).await;
    listener.abort();

    let summary = result.context("Auto mode stopped on a transport failure")?;
    log::info!(
        "Auto mode finished: {} reached, {} timed out, {} skipped",
        summary.reached,
        summary.timed_out,
        summary.skipped
    );
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn prompt_cm(label: &str, default: f32) -> Result<f32> {
    let input = prompt(&format!("{} in cm [{}]: ", label, default))?;
    if input.is_empty() {
        return Ok(default);
    }
    input
        .parse()
        .with_context(|| format!("Invalid height: {}", input))
}

/// Scan for desks, pick one and save it with the presets
async fn setup(mut config: Config) -> Result<()> {
    println!("Scanning for desks...");
    let addresses = bluetooth::scan(DEFAULT_SCAN_SECS).await?;

    let address = match addresses.as_slice() {
        [] => {
            println!("No desks found. Make sure your desk is powered on and in range.");
            return Ok(());
        }
        [only] => {
            println!("Found desk: {}", only);
            only.clone()
        }
        many => {
            println!("Found multiple desks:");
            for (i, a) in many.iter().enumerate() {
                println!("  {}. {}", i + 1, a);
            }
            let choice = prompt("Select desk number: ")?;
            match choice
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| many.get(i))
            {
                Some(a) => a.clone(),
                None => {
                    println!("Invalid selection.");
                    return Ok(());
                }
            }
        }
    };

    config.sit_cm = prompt_cm("Sit height", config.sit_cm)?;
    config.stand_cm = prompt_cm("Stand height", config.stand_cm)?;
    config.desk_address = Some(address);
    config.save()?;

    println!("Config saved to {}", Config::config_file()?.display());
    println!("  address  = {}", config.desk_address.as_deref().unwrap_or_default());
    println!("  sit_cm   = {}", config.sit_cm);
    println!("  stand_cm = {}", config.stand_cm);
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let command = match cli.command {
        Some(command) => command,
        None => {
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    if !command.needs_desk() {
        return match command {
            Command::Setup => setup(config).await,
            _ => {
                println!("Scanning...");
                for address in bluetooth::scan(DEFAULT_SCAN_SECS).await? {
                    println!("  {}", address);
                }
                Ok(())
            }
        };
    }

    let address = cli
        .address
        .or_else(|| config.desk_address.clone())
        .ok_or_else(|| {
            anyhow!("No desk address configured. Run 'desk setup' first, or pass --address.")
        })?;

    let mut session = Session::open(&address).await?;
    let desk = &mut session.desk;

    let result = match command {
        Command::Height => {
            match desk.height().cm() {
                Some(cm) => println!("{:.1} cm", cm),
                None => println!("No data"),
            }
            Ok(())
        }
        Command::Sit => move_and_report(desk, config.sit_cm).await,
        Command::Stand => move_and_report(desk, config.stand_cm).await,
        Command::Move { cm } => move_and_report(desk, cm).await,
        Command::Auto { interval, countdown } => {
            run_auto(desk, &config, interval, countdown).await
        }
        Command::Setup | Command::Scan => Ok(()),
    };

    session.close().await;
    result
}

/// Drive `future` on a fresh runtime, then shut it down without waiting
/// longer than [`SHUTDOWN_GRACE`] for blocking tasks still in flight.
fn run_to_completion<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    log::debug!("Configuration loaded: {:?}", config);

    run_to_completion(run(cli, config))?
}
