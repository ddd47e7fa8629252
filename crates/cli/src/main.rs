use anyhow::{Context, Result};
use clap::Parser;
use shade_shot_core::{BackendKind, Config, ShadeShot, init};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Analysis backend: seeded, server or gemini
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Base URL of the json-server used by the server backend
    #[arg(long)]
    server_url: Option<String>,

    /// Override the Gemini model defined in .env
    #[arg(short, long)]
    model: Option<String>,

    /// Select which monitor to capture
    #[arg(long)]
    monitor: Option<usize>,

    /// Milliseconds to wait after lifting protection before capturing
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Put screenshots back into the pending set when analysis fails
    #[arg(long, default_value_t = false)]
    restore_on_failure: bool,

    /// List available monitors and exit
    #[arg(long)]
    list_monitors: bool,

    /// Write the effective shortcuts and options to the settings file and exit
    #[arg(long)]
    save_settings: bool,
}

fn main() -> Result<()> {
    // Setup
    init();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Handle --list-monitors
    if args.list_monitors {
        let monitors = ShadeShot::list_monitors().context("Failed to enumerate monitors")?;
        println!("Available monitors:");
        for info in monitors {
            println!("{}", info);
        }
        return Ok(());
    }

    if args.save_settings {
        let config = Config::read_with(|config| apply_overrides(config, &args))
            .context("Failed to load configuration")?;
        match config.settings().save().context("Failed to save settings")? {
            Some(path) => println!("Settings written to {}", path.display()),
            None => println!("No configuration directory available; nothing written."),
        }
        return Ok(());
    }

    let app = ShadeShot::load(|config| apply_overrides(config, &args))
        .context("Failed to load configuration")?;
    log::info!(
        "Starting shade-shot with the {} backend on monitor {}",
        app.config().backend,
        app.config().monitor_index
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("shade-shot-worker")
        .build()
        .context("Failed to start async runtime")?;

    app.run(runtime.handle().clone()).context("UI error")?;

    log::info!("Window closed, shutting down");
    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(url) = &args.server_url {
        config.server_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.model_name = model.clone();
    }
    if let Some(monitor) = args.monitor {
        config.monitor_index = monitor;
    }
    if let Some(ms) = args.settle_ms {
        config.settle_delay = Duration::from_millis(ms);
    }
    if args.restore_on_failure {
        config.restore_on_failure = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_shot_core::Settings;

    #[test]
    fn flags_override_environment() {
        let args = Args::parse_from([
            "shade-shot",
            "--backend",
            "server",
            "--server-url",
            "http://127.0.0.1:4000",
            "--settle-ms",
            "50",
            "--restore-on-failure",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.backend, BackendKind::Server);
        assert_eq!(config.server_url, "http://127.0.0.1:4000");
        assert_eq!(config.settle_delay, Duration::from_millis(50));
        assert!(config.restore_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_apply_before_validation() {
        let args = Args::parse_from(["shade-shot", "--backend", "seeded"]);
        let env = |key: &str| (key == "SHADE_SHOT_BACKEND").then(|| "gemini".to_string());

        let config =
            Config::resolve(Settings::default(), env, |config| apply_overrides(config, &args)).unwrap();

        assert_eq!(config.backend, BackendKind::Seeded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Args::try_parse_from(["shade-shot", "--backend", "openai"]).is_err());
    }
}
