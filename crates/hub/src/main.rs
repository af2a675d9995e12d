mod config;
mod db;
mod state;
mod weather;
mod web;

use anyhow::Result;
use std::env;
use tracing_subscriber::EnvFilter;

use db::Db;
use state::SystemState;
use weather::{NoWeather, OpenWeather, Weather};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // ── Env config ──────────────────────────────────────────────────
    let db_url =
        env::var("DB_URL").unwrap_or_else(|_| "sqlite:plantcare.db?mode=rwc".to_string());
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let web_port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    // ── Database ────────────────────────────────────────────────────
    let db = Db::connect(&db_url).await?;
    db.migrate().await?;

    // ── Config file (seed pots) ─────────────────────────────────────
    let cfg = config::load(&config_path)?;
    config::apply(&cfg, &db).await?;

    // The store, not the file, is the source of truth from here on.
    let pots = db.load_pots().await?;
    if pots.is_empty() {
        tracing::warn!("no pots configured in the database");
    }
    tracing::info!(pots = pots.len(), "db ready");

    // ── Weather ─────────────────────────────────────────────────────
    let weather = match &cfg.weather {
        Some(entry) => {
            let w = OpenWeather::new(entry, env::var("OPENWEATHER_API_KEY").ok())?;
            tracing::info!(city = w.city(), "temperature from OpenWeather");
            Weather::OpenWeather(w)
        }
        None => {
            tracing::warn!("no [weather] section; every sync will fail until one is added");
            Weather::Unconfigured(NoWeather)
        }
    };

    // ── Shared state (ephemeral, for the API) ───────────────────────
    let shared = SystemState::shared();
    shared.write().await.record_system("hub started".to_string());

    // ── Web server ──────────────────────────────────────────────────
    let app = web::AppState::new(db, weather, shared, fastrand::Rng::new());
    web::serve(app, web_port).await
}
