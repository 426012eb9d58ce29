//! # segfile CLI
//!
//! Inspect SPK, CK, PCK and DSK kernels and the DAF and DAS files under them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use segfile_config::logging::{init_logging, LogLevel};
use segfile_config::Config;

mod comments;
mod coverage;
mod kernel;

use kernel::KernelFile;

/// segfile - segmented kernel file toolkit
#[derive(Parser)]
#[command(name = "segfile")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the file record of a kernel
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List segment descriptors in directory order
    Segments {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print JSON instead of one segment per line
        #[arg(long)]
        json: bool,
    },

    /// Read or edit the comment area
    Comments(comments::CommentsArgs),

    /// Time coverage of a body, frame or instrument
    Coverage(coverage::CoverageArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
}

fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("warning: {}; using default configuration", e);
        Config::default()
    });
    init_logging(LogLevel::parse(&config.logging.level));

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { file } => cmd_info(&file),
        Commands::Segments { file, json } => cmd_segments(&file, json, config.storage.pretty_json),
        Commands::Comments(args) => comments::run(args, config.storage.line_length),
        Commands::Coverage(args) => coverage::run(args, config.storage.pretty_json),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(&config),
            ConfigCommands::Path => {
                cmd_config_path();
                Ok(())
            }
        },
    }
}

fn cmd_info(path: &Path) -> Result<()> {
    let mut file = KernelFile::open_read(path)?;
    println!("File:          {}", path.display());
    println!("Type:          {}", file.file_type());

    if let Some(daf) = file.daf() {
        let record = daf.file_record();
        println!("Internal name: {}", record.internal_name);
        println!("Byte order:    {:?}", record.byte_order);
        println!("ND / NI:       {} / {}", record.nd, record.ni);
        println!("Comment recs:  {}", record.reserved_records());
        println!("Summary recs:  {} .. {}", record.fward, record.bward);
        println!("Free address:  {}", record.free);
        println!("Segments:      {}", daf.count_segments()?);
    }
    if let Some(das) = file.das() {
        let record = das.file_record();
        let last = das.last_addresses()?;
        println!("Internal name: {}", record.internal_name);
        println!("Byte order:    {:?}", record.byte_order);
        println!(
            "Comment recs:  {} ({} chars)",
            record.comment_records, record.comment_chars
        );
        println!(
            "Words:         {} chars, {} doubles, {} ints",
            last.chars, last.doubles, last.ints
        );
    }
    match &file {
        KernelFile::Dsk(dsk) => println!("Segments:      {}", dsk.segment_count()?),
        KernelFile::Dla(dla) => println!("Segments:      {}", dla.segment_count()?),
        _ => {}
    }
    file.close()?;
    Ok(())
}

fn cmd_segments(path: &Path, json: bool, pretty: bool) -> Result<()> {
    let mut file = KernelFile::open_read(path)?;
    let rows = file
        .segments()
        .with_context(|| format!("Failed to list segments of {}", path.display()))?;
    file.close()?;

    if json {
        let out = if pretty {
            serde_json::to_string_pretty(&rows)?
        } else {
            serde_json::to_string(&rows)?
        };
        println!("{}", out);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No segments");
    }
    for row in &rows {
        println!("{}", row);
    }
    Ok(())
}

fn cmd_config_show(config: &Config) -> Result<()> {
    let toml = toml::to_string_pretty(config).context("Failed to serialize config")?;
    print!("{}", toml);
    Ok(())
}

fn cmd_config_path() {
    match Config::global_config_path() {
        Some(path) => println!("Global:  {}", path.display()),
        None => println!("Global:  (no home directory)"),
    }
    println!("Project: .segfile/config.toml");
}
