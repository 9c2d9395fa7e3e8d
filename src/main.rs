// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "isp-export")]
#[command(about = "Diagnostics for zero-copy ISP to EGL frame export")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a resolution and allocate one NV12 output buffer for it
    Probe {
        /// Frame width in pixels
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "1080")]
        height: u32,

        /// dma-heap device node (default: from configuration, else linux,cma)
        #[arg(long)]
        heap: Option<PathBuf>,
    },

    /// Report EGL dma-buf import support
    Egl,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=isp_export=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            width,
            height,
            heap,
        } => cli::probe(width, height, heap),
        Commands::Egl => cli::egl_info(),
    }
}
