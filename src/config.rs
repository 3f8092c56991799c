//! Command-line configuration.
//!
//! Every option can also be set through an environment variable with the
//! `TIFF_STACK_` prefix:
//!
//! - `TIFF_STACK_PATH` - Stack to load (default: ./testDataset_dpc.tif)
//! - `TIFF_STACK_VERBOSE` - Log the metadata dump at info level
//! - `TIFF_STACK_HOST` - Viewer bind address (default: 127.0.0.1)
//! - `TIFF_STACK_PORT` - Viewer port (default: 3000)
//! - `TIFF_STACK_NO_VIEW` - Load only, do not start the viewer
//! - `TIFF_STACK_BLOCK_SIZE` - Read cache block size in bytes (default: 64KB)
//! - `TIFF_STACK_CACHE_BLOCKS` - Read cache capacity in blocks (default: 64)
//! - `TIFF_STACK_MAX_PAGES` - Directory chain limit (default: 65535)

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::format::tiff::DEFAULT_MAX_DIRECTORIES;
use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};
use crate::stack::LoadOptions;

// =============================================================================
// Default Values
// =============================================================================

/// Stack loaded when no path is given.
pub const DEFAULT_PATH: &str = "./testDataset_dpc.tif";

pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Load a multi-page 16-bit grayscale TIFF and preview every page.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiff-stack")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// TIFF stack to load.
    #[arg(default_value = DEFAULT_PATH, env = "TIFF_STACK_PATH")]
    pub path: PathBuf,

    /// Log the page metadata dump and debug output.
    #[arg(short, long, default_value_t = false, env = "TIFF_STACK_VERBOSE")]
    pub verbose: bool,

    // =========================================================================
    // Viewer
    // =========================================================================
    /// Address the viewer binds to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TIFF_STACK_HOST")]
    pub host: String,

    /// Port the viewer listens on (0 picks a free port).
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TIFF_STACK_PORT")]
    pub port: u16,

    /// Load the stack without starting the viewer.
    #[arg(long, default_value_t = false, env = "TIFF_STACK_NO_VIEW")]
    pub no_view: bool,

    // =========================================================================
    // Reading
    // =========================================================================
    /// Block size in bytes for the read cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "TIFF_STACK_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks kept in the read cache.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "TIFF_STACK_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Stop following the directory chain after this many pages.
    #[arg(long, default_value_t = DEFAULT_MAX_DIRECTORIES, env = "TIFF_STACK_MAX_PAGES")]
    pub max_pages: usize,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("A stack path is required. Pass PATH or set TIFF_STACK_PATH".to_string());
        }

        if self.block_size < 512 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 512 bytes and 16MB".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        if self.max_pages == 0 {
            return Err("max_pages must be greater than 0".to_string());
        }

        if !self.no_view {
            self.bind_address()?;
        }

        Ok(())
    }

    /// Viewer bind address.
    pub fn bind_address(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid viewer address {}:{}: {}", self.host, self.port, e))
    }
}

impl From<&Config> for LoadOptions {
    fn from(config: &Config) -> Self {
        LoadOptions {
            verbose: config.verbose,
            block_size: config.block_size,
            cache_blocks: config.cache_blocks,
            max_pages: config.max_pages,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
