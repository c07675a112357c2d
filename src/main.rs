// src/main.rs
use clap::{ArgAction, Parser};
use env_logger::Builder;
use flatfs::{format_image, script, FlatFs};
use log::{info, LevelFilter};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flatfs")]
#[command(version = "1.0.0")]
#[command(about = "Contiguous-allocation file system inside a 128 KiB disk image", long_about = "Runs a command script against disk images of 128 blocks of 1 KiB.\n\nEach line is one command: M <disk>, C <name> <size>, D <name>, R <name> <block>,\nW <name> <block>, B [text], L, E <name> <size>, O, Y <dir>.\nListings go to stdout, errors to stderr.")]
struct Cli {
    #[arg(value_name = "COMMAND_FILE")]
    command_file: Option<PathBuf>,
    /// Create a blank, mountable image before running the script
    #[arg(long, value_name = "IMAGE")]
    init: Vec<PathBuf>,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Builder::new()
    .format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(buf, "[{} {}] {}",
                 buf.timestamp_seconds(),
                 style.value(record.level()),
                 record.args()
        )
    })
    .filter(None, level)
    .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        init_logger(cli.verbose);
    } else {
        env_logger::init();
    }

    for image in &cli.init {
        format_image(image)
            .map_err(|e| anyhow::anyhow!("Cannot create image {}: {}", image.display(), e))?;
        info!("Initialised {:?}", image);
    }

    let command_file = match cli.command_file {
        Some(path) => path,
        None if !cli.init.is_empty() => return Ok(()),
        None => anyhow::bail!("Usage: flatfs <command_file>"),
    };

    let file = File::open(&command_file)
        .map_err(|_| anyhow::anyhow!("Cannot open command file {}", command_file.display()))?;

    let mut fs = FlatFs::new();
    let stdout = io::stdout();
    let stderr = io::stderr();
    script::run(
        BufReader::new(file),
        &command_file.display().to_string(),
        &mut fs,
        &mut stdout.lock(),
        &mut stderr.lock(),
    )?;

    if fs.is_mounted() {
        fs.unmount()?;
    }
    Ok(())
}
