//! shade-shot core library
//!
//! A screenshot assistant whose own window never appears in its captures.
//! Screens are collected into a pending set, sent together with an optional
//! description to an analysis backend, and the structured answer is shown
//! in a window that stays hidden from screen sharing and recording.
//!
//! # Overview
//!
//! - **Window protection**: [`window::WindowGuard`] keeps the window
//!   excluded from capture except during a capture.
//! - **Screen capture**: PNG screenshots via [`capture`]
//! - **Pending screenshots**: the ordered set in [`store`]
//! - **Analysis**: seeded, HTTP and Gemini backends in [`analysis`]
//! - **Workflow**: the state machine in [`workflow`]
//! - **Shortcuts**: system-wide hotkeys in [`shortcuts`]
//! - **User interface**: the egui window in [`ui`]
//!
//! # Quick Start
//!
//! ```ignore
//! use shade_shot_core::ShadeShot;
//!
//! shade_shot_core::init();
//! let app = ShadeShot::load(|config| config.monitor_index = 1)?;
//! for monitor in ShadeShot::list_monitors()? {
//!     println!("{}", monitor);
//! }
//! app.run(runtime.handle().clone())?;
//! ```

pub mod analysis;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod settings;
pub mod shortcuts;
pub mod store;
pub mod ui;
pub mod window;
pub mod workflow;

// Re-export primary types for convenience
pub use analysis::{AnalysisClient, AnalysisResult, Backend};
pub use capture::{ScreenCapturer, ScreenshotArtifact};
pub use config::{BackendKind, Config};
pub use error::{AppError, Result};
pub use settings::Settings;
pub use workflow::{WorkflowController, WorkflowState};

use tokio::runtime::Handle;

/// Main entry point for the shade-shot application.
///
/// Holds the resolved configuration and launches the desktop window.
pub struct ShadeShot {
    config: Config,
}

impl ShadeShot {
    /// Loads configuration from `.env`, the environment and saved settings,
    /// with `overrides` applied on top before validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete, for example the
    /// Gemini backend without an API key.
    pub fn load(overrides: impl FnOnce(&mut Config)) -> Result<Self> {
        Ok(Self {
            config: Config::load_with(overrides)?,
        })
    }

    /// Describes every connected monitor.
    pub fn list_monitors() -> Result<Vec<String>> {
        Ok(ScreenCapturer::list_screens()?)
    }

    /// Opens the window and blocks until it is closed.
    pub fn run(self, runtime: Handle) -> Result<()> {
        ui::run_main_view(self.config, runtime)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Loads `.env` files if present.
///
/// Call this once at startup, before the logger and configuration read the
/// environment.
pub fn init() {
    let _ = dotenvy::dotenv();
}
