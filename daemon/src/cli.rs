use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use g2_types::Slot;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LevelFilter,

    /// Location of the daemon configuration file on disk
    #[clap(long, default_value_os_t = default_config_location())]
    pub config: PathBuf,

    /// Don't look for a G2, only work with files
    #[clap(long)]
    pub offline: bool,

    /// A patch (.pch2) or performance (.prf2) file to load at startup
    #[clap(long)]
    pub load: Option<PathBuf>,

    /// The slot a patch file is loaded into
    #[clap(long, value_enum, default_value = "a")]
    pub slot: Slot,

    /// Force Run the Daemon as Root
    #[clap(long)]
    pub force_root: bool,
}

fn default_config_location() -> PathBuf {
    match ProjectDirs::from("org", "G2-Utility", "G2-Utility") {
        Some(proj_dirs) => proj_dirs.config_dir().join("settings.json"),
        None => PathBuf::from("g2-settings.json"),
    }
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}
