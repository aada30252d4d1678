use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use coursegate_node::api::{start_server, AppState};
use coursegate_node::auth::JwtVerifier;
use coursegate_node::config::{CatalogFile, Config};
use coursegate_node::notify::{LogDispatcher, NotificationDispatcher, WebhookDispatcher};
use coursegate_node::storage::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env();
    let store = Arc::new(MemoryStore::new());

    if let Some(path) = &config.catalog_path {
        let catalog = CatalogFile::load(Path::new(path))?;
        let seeded = catalog.apply(store.as_ref()).await?;
        log::info!("seeded {} course(s) from {path}", seeded.len());
    }

    let notifier: Arc<dyn NotificationDispatcher> = match &config.notify_webhook_url {
        Some(url) => {
            log::info!("dispatching access notifications to {url}");
            Arc::new(WebhookDispatcher::new(url.clone()))
        }
        None => {
            log::info!("no notification webhook configured; using log dispatcher");
            Arc::new(LogDispatcher)
        }
    };

    let state = AppState::new(
        store,
        Arc::new(JwtVerifier::new(&config.jwt_secret)),
        notifier,
        config.site_name.clone(),
    );

    println!("🚀 Starting CourseGate engine on port {}", config.port);
    start_server(state, config.port).await
}
