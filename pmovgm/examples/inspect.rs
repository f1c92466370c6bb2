//! Opens a game Ogg container and prints what the loader found.
//!
//! Usage:
//! ```bash
//! cargo run --example inspect -- path/to/bgm.kvs [config.yaml]
//! ```

use std::path::PathBuf;

use anyhow::Context;
use pmovgm::{LoaderConfig, open_path};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().context("missing input file")?);
    let config_path = args.next().map(PathBuf::from);

    let config = LoaderConfig::load(config_path.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.tracing_filter()))
        .init();

    let mut stream = open_path(&path, &config)?;
    info!(path = %path.display(), "opened");

    println!("Variant:     {}", stream.meta.description());
    println!("Channels:    {}", stream.channels);
    println!("Sample rate: {} Hz", stream.sample_rate);
    println!("Samples:     {}", stream.num_samples);
    println!("Stream size: {} bytes", stream.stream_size);
    match stream.loop_region {
        Some(region) => println!("Loop:        {}..{}", region.start, region.end),
        None => println!("Loop:        none"),
    }

    let reader = stream.session_mut().reader_mut();
    let first = reader.read_dec_packet_itl()?;
    println!(
        "First packet: {} samples",
        first.map(|samples| samples.len()).unwrap_or(0)
    );
    Ok(())
}
