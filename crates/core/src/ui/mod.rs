//! Desktop front end for shade-shot.
//!
//! A single always-on-top window that is excluded from screen capture. It
//! lists pending screenshots, takes an optional description and shows the
//! analysis result.
//!
//! # Architecture
//!
//! - [`window`]: viewport-backed [`WindowAttributes`](crate::window::WindowAttributes)
//! - [`rendering`]: formatting helpers for labels and the status footer
//! - [`main_view`]: the eframe application
//!
//! # Usage
//!
//! ```ignore
//! use shade_shot_core::{ui, Config};
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! ui::run_main_view(Config::load_with(|_| {})?, runtime.handle().clone())?;
//! ```

mod main_view;
mod rendering;
mod window;

pub use main_view::{AppController, MainView};
pub use window::ViewportWindow;

use crate::config::Config;
use crate::error::Result;
use tokio::runtime::Handle;

/// Opens the main window and blocks until the user closes it.
///
/// Capture and analysis are spawned on `runtime`, so it must outlive the
/// window.
pub fn run_main_view(config: Config, runtime: Handle) -> Result<()> {
    main_view::run(config, runtime)
}
