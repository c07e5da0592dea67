use anyhow::{Context, Result};
use clap::Parser;
use g2_types::Slot;
use log::{error, info};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::{join, signal};

use crate::cli::{Cli, LevelFilter};
use crate::primary_worker::{spawn_usb_handler, DeviceCommand, DeviceSender};
use crate::settings::SettingsHandle;
use crate::shutdown::Shutdown;

mod bringup;
mod cli;
mod device;
mod dispatch;
mod primary_worker;
mod settings;
mod shutdown;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        match args.log_level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        },
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;
    log_panics::init();

    if is_root() {
        if args.force_root {
            error!("G2 Utility running as root, this is generally considered bad.");
        } else {
            error!("The G2 Daemon is not designed to be run as root, and should run as the");
            error!("current active user. If you're having problems with permissions, make sure");
            error!("your user can access the G2's USB device.");
            error!("");
            error!("To override this message, please start with --force-root");
            std::process::exit(-1);
        }
    }

    info!("Starting G2 Daemon v{}", VERSION);
    let settings = SettingsHandle::load(args.config).await?;

    let mut shutdown = Shutdown::new();

    let (usb_tx, usb_rx) = mpsc::channel(32);
    let usb_handle = tokio::spawn(spawn_usb_handler(
        usb_rx,
        shutdown.clone(),
        settings,
        args.offline,
    ));

    if let Some(path) = args.load {
        if let Err(e) = load_file(&usb_tx, path, args.slot).await {
            error!("{:#}", e);
        }
    }

    // Setup Ctrl+C Monitoring..
    tokio::spawn(await_ctrl_c(shutdown.clone()));

    shutdown.recv().await;
    info!("Shutting down daemon");

    let _ = join!(usb_handle);
    Ok(())
}

async fn load_file(sender: &DeviceSender, path: PathBuf, slot: Slot) -> Result<()> {
    let (tx, rx) = oneshot::channel();
    sender
        .send(DeviceCommand::LoadFile(path.clone(), slot, tx))
        .await
        .map_err(|_| anyhow::anyhow!("Device worker has stopped"))?;
    rx.await
        .context("Device worker dropped the request")?
        .with_context(|| format!("Unable to load {}", path.display()))?;

    info!("Loaded {}", path.display());
    Ok(())
}

async fn await_ctrl_c(shutdown: Shutdown) {
    if signal::ctrl_c().await.is_ok() {
        shutdown.trigger();
    }
}

#[cfg(target_family = "unix")]
fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(target_family = "unix"))]
fn is_root() -> bool {
    // On non-unix systems, we can't root check, assume we're good!
    false
}
