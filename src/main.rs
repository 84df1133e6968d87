use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

mod app;
mod config;
mod core;
mod utils;

#[tokio::main]
async fn main() {
    let _ = dotenvy::from_path("./.env");
    let config = match config::Config::init() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to initialize configuration: {e}");
            return;
        }
    };
    init_logging(&config);

    if config.telegram.bot_token.is_empty() {
        tracing::error!("telegram.bot_token is not set");
        return;
    }

    let app = Arc::new(app::handlers::App::new(config));
    tracing::info!("Bot started, polling for updates");
    run_polling(app).await;
}

fn init_logging(config: &crate::config::Config) {
    tracing_subscriber::fmt()
        .with_max_level(Level::from_str(&config.logs.level).unwrap_or(Level::INFO))
        .init();
}

/// Long-poll loop. Each update is dispatched on its own task so one slow
/// /get does not stall the rest of the chat.
async fn run_polling(app: Arc<app::handlers::App>) {
    let mut offset: i64 = 0;
    loop {
        let updates = match app.bot().get_updates(offset).await {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("getUpdates failed: {e}");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                app.handle_update(update).await;
            });
        }
    }
}
