//! CLI argument definitions for almanac.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `areas` | List JMA forecast offices |
//! | `forecast` | Refresh one office's forecast and print the current snapshot |
//! | `snapshot` | Print the stored snapshot without fetching |
//! | `periods` | List every stored target period |
//! | `at` | Best-known row for one target period |
//! | `tables` | Search e-Stat statistics tables |
//! | `stats` | Refresh one e-Stat table and print the newest generation |
//!
//! # Examples
//!
//! ```bash
//! almanac forecast 130000 --name 東京都 --pretty
//! almanac at 130000 2026-10-21
//! ESTAT_APP_ID=... almanac stats --keyword 宿泊 --pick 2
//! ```

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "almanac",
    author,
    version,
    about = "Fetch, store and query JMA forecasts and e-Stat statistics"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Request timeout in milliseconds, overriding ALMANAC_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List forecast offices from the JMA area list.
    Areas,
    /// Refresh a forecast and print the current snapshot.
    Forecast(ForecastArgs),
    /// Print the stored snapshot for an office.
    Snapshot(EntityArgs),
    /// List stored target periods for an office.
    Periods(EntityArgs),
    /// Print the most recently published row for one period.
    At(AtArgs),
    /// Search statistics tables by keyword.
    Tables(TablesArgs),
    /// Refresh a statistics table and print its newest generation.
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ForecastArgs {
    /// JMA office code, e.g. 130000.
    pub code: String,

    /// Display name stored with the rows; defaults to the code.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct EntityArgs {
    /// JMA office code, e.g. 130000.
    pub code: String,
}

#[derive(Debug, Clone, Args)]
pub struct AtArgs {
    /// JMA office code, e.g. 130000.
    pub code: String,

    /// Target period as YYYY-MM-DD.
    pub period: String,
}

#[derive(Debug, Clone, Args)]
pub struct TablesArgs {
    /// Search keyword, e.g. 宿泊.
    pub keyword: String,
}

#[derive(Debug, Clone, Args)]
pub struct StatsArgs {
    /// Table identifier; takes precedence over --keyword.
    #[arg(long)]
    pub stats_data_id: Option<String>,

    /// Search keyword used when no table identifier is given.
    #[arg(long, default_value = "宿泊")]
    pub keyword: String,

    /// Which search result to use, starting at 1.
    #[arg(long, default_value_t = 1)]
    pub pick: usize,
}
