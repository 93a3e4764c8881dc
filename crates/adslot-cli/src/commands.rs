//! CLI command definitions.

use adslot_core::AdKind;
use clap::{Args, Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum Commands {
    /// Load then show one ad against the simulated provider
    Demo(DemoArgs),

    /// List configured placements
    Placements,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct DemoArgs {
    /// Identifier or placement id from the configuration, or a raw placement id
    #[arg(short, long)]
    pub placement: Option<String>,

    /// Ad format, when the placement is not configured
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Load timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Simulated fetch latency in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// How long the simulated ad stays on screen
    #[arg(long)]
    pub display_ms: Option<u64>,

    /// Make every load fail with this provider code
    #[arg(long)]
    pub load_error: Option<i32>,

    /// Make every display fail with this provider code
    #[arg(long)]
    pub show_error: Option<i32>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Interstitial,
    Rewarded,
    RewardedInterstitial,
    AppOpen,
}

impl From<KindArg> for AdKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Interstitial => AdKind::Interstitial,
            KindArg::Rewarded => AdKind::Rewarded,
            KindArg::RewardedInterstitial => AdKind::RewardedInterstitial,
            KindArg::AppOpen => AdKind::AppOpen,
        }
    }
}
