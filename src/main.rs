//! tiff-stack - load a multi-page 16-bit grayscale TIFF and preview it.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiff_stack::{show, BrowserSurface, Config, LoadOptions, StackLoader};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let loader = StackLoader::new(LoadOptions::from(&config));
    let stack = loader.load(&config.path);

    if stack.is_empty() {
        warn!("No pages loaded from {}", config.path.display());
        return ExitCode::FAILURE;
    }
    info!("{} page(s) loaded", stack.len());

    if config.no_view {
        return ExitCode::SUCCESS;
    }

    let addr = match config.bind_address() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut surface = BrowserSurface::new(addr);
    match show(stack.pages(), &mut surface) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Viewer failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tiff_stack=debug,tower_http=debug"
    } else {
        "tiff_stack=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
