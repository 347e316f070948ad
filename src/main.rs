#![deny(unsafe_code)]
pub mod commands;
mod version;

use anyhow::Result;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use commands::command::Command;
use commands::fastq::Fastq;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use log::info;

/// Help output styling: green headers, cyan flags and placeholders.
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Bounded-memory conversion of coordinate-sorted BAM to paired FASTQ.
#[derive(Parser, Debug)]
#[command(name = "bamfq", styles = STYLES, version = version::VERSION)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
enum Subcommand {
    #[command(display_order = 1)]
    Fastq(Fastq),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Captured before parsing so the log shows the invocation exactly as typed
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let args = Args::parse();

    info!("Running bamfq version {}", version::VERSION);
    info!("Command line: {command_line}");
    args.subcommand.execute(&command_line)
}
