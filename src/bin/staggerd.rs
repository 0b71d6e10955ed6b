//! Binary entry point for the companion daemon.
#![forbid(unsafe_code)]

use std::error::Error;
use std::net::IpAddr;

use clap::Parser;
use stagger::server::{self, ServeOptions, DEFAULT_PORT};
use stagger::{Companion, CompanionConfig};

#[derive(Parser, Debug)]
#[command(
    name = "staggerd",
    version,
    about = "Aggregation companion daemon for distributed random-walk ranking"
)]
struct Cli {
    #[arg(long, env = "STAGGER_HOST", default_value = "127.0.0.1", help = "Interface to bind")]
    host: IpAddr,

    #[arg(long, env = "STAGGER_PORT", default_value_t = DEFAULT_PORT, help = "Port to bind")]
    port: u16,

    #[arg(
        long,
        default_value_t = CompanionConfig::default().max_outstanding,
        help = "Maximum concurrently in-flight batches"
    )]
    max_outstanding: usize,

    #[arg(
        long,
        default_value_t = CompanionConfig::default().buffer_capacity,
        help = "Initial capacity of each per-source staging buffer"
    )]
    buffer_capacity: usize,

    #[arg(
        long,
        default_value_t = CompanionConfig::default().drain_threshold,
        help = "Staged visits per source before a buffer is merged"
    )]
    drain_threshold: usize,

    #[arg(
        long,
        default_value_t = CompanionConfig::default().top_k,
        help = "Entries written per source on export"
    )]
    top_k: usize,

    #[arg(
        long,
        default_value_t = CompanionConfig::default().worker_threads,
        help = "Worker threads for batch processing"
    )]
    worker_threads: usize,
}

impl Cli {
    fn companion_config(&self) -> CompanionConfig {
        CompanionConfig {
            buffer_capacity: self.buffer_capacity,
            drain_threshold: self.drain_threshold,
            max_outstanding: self.max_outstanding,
            top_k: self.top_k,
            worker_threads: self.worker_threads,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.companion_config();
    let options = ServeOptions {
        host: cli.host,
        port: cli.port,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.worker_threads)
        .enable_all()
        .build()?;
    let companion = Companion::new(config);
    runtime.block_on(server::serve(companion, options))?;
    Ok(())
}
