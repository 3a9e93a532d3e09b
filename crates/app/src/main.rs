use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::Context as _;
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use twinshelf_application::AppContext;
use twinshelf_core::Settings;
use twinshelf_remote::HttpBookApi;
use twinshelf_storage::Storage;
use twinshelf_ui::{Ui, UiExit};

const BASE_URL_ENV: &str = "TWINSHELF_API_BASE_URL";
const TOKEN_ENV: &str = "TWINSHELF_API_TOKEN";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dirs =
        ProjectDirs::from("dev", "twinshelf", "twinshelf").context("resolve project dirs")?;

    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir {}", config_dir.display()))?;
    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;

    init_tracing(&data_dir.join("twinshelf.log"))?;

    let db_path = config_dir.join("twinshelf.db");
    let storage = Storage::open(&db_path)?;
    let stored = storage.load_settings()?;
    let settings = with_env_overrides(stored.clone());
    tracing::info!(base_url = %settings.api_base_url, db = %db_path.display(), "starting");

    let mut ctx = AppContext::new(settings);
    if let Some(token) = env_value(TOKEN_ENV) {
        ctx.sign_in(&token, Instant::now());
    }

    loop {
        let api = HttpBookApi::new(&ctx.settings).context("create api client")?;
        let mut ui = Ui::new(ctx, Box::new(api))?;
        let outcome = ui.run()?;
        ctx = outcome.ctx;
        storage.save_settings(&settings_to_persist(&stored, &ctx.settings))?;

        match outcome.exit {
            UiExit::Quit => break,
            UiExit::Reconnect => {
                tracing::info!(base_url = %ctx.settings.api_base_url, "reconnecting");
                ctx.resume_session(Instant::now());
            }
        }
    }

    tracing::info!("exiting");
    Ok(())
}

/// Logs go to a file so the alternate screen stays clean.
fn init_tracing(log_path: &Path) -> anyhow::Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn with_env_overrides(mut settings: Settings) -> Settings {
    if let Some(url) = env_value(BASE_URL_ENV) {
        settings.api_base_url = url;
        settings.normalize();
    }
    settings
}

/// The env override is a per-run setting; keep the stored URL unless the
/// user picked a new one in the settings panel.
fn settings_to_persist(stored: &Settings, current: &Settings) -> Settings {
    let mut out = current.clone();
    if env_value(BASE_URL_ENV).is_some_and(|_| {
        with_env_overrides(stored.clone()).api_base_url == current.api_base_url
    }) {
        out.api_base_url = stored.api_base_url.clone();
    }
    out
}
