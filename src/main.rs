//! guestloop - CLI

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guestloop::util::config::{self, HostConfig};
use guestloop::util::logger::{self, LogLevel};
use guestloop::{NAME, VERSION};

/// Embed guest run-loops and feed them work from the host
#[derive(Parser, Debug)]
#[command(name = "guestloop")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (RON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine and run each stdin line as work on the main loop
    Run {
        /// Additional module search path (repeatable)
        #[arg(short = 'm', long = "module-path", value_name = "PATH")]
        module_paths: Vec<String>,

        /// Worker loops to run next to the main loop
        #[arg(short, long)]
        workers: Option<usize>,

        /// Arguments passed to the guest engine
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the user config file
        #[arg(long)]
        save: bool,
    },

    /// Print version information
    Version,
}

fn load_config(args: &Args) -> Result<HostConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => config::load_user_config().context("Failed to load user config")?,
    };
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;
    Ok(config)
}

fn run(
    mut config: HostConfig,
    module_paths: Vec<String>,
    workers: Option<usize>,
    args: Vec<String>,
) -> Result<()> {
    config.start.module_search_paths.extend(module_paths);
    config.start.process_arguments.extend(args);
    if let Some(workers) = workers {
        config.worker_loops = workers;
    }

    let embedding = guestloop::start(&config)?;
    let host = &embedding.host;

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == ":loops" {
            for loop_ref in host.registry().snapshot() {
                println!("{} on {:?}", loop_ref, loop_ref.thread_id());
            }
            continue;
        }
        host.enqueue_on_main(move |cx| {
            println!("[{}] {}", cx.loop_ref().id(), line);
        })?;
    }

    host.enqueue_on_main(|cx| cx.request_stop())?;
    embedding.launcher.wait();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.verbose {
        logger::init_with_level(LogLevel::Debug);
        eprintln!("guestloop version: {}", VERSION);
        eprintln!("Host: {}", std::env::consts::OS);
    } else {
        logger::init_with_level(config.log_level());
    }

    match args.command {
        Commands::Run {
            module_paths,
            workers,
            args,
        } => {
            run(config, module_paths, workers, args).context("Failed to run guest engine")?;
        }
        Commands::Config { save } => {
            print!("{}", config::to_ron_string(&config)?);
            println!();
            if save {
                let path = config::save_user_config(&config)?;
                eprintln!("Saved to {}", path.display());
            }
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
