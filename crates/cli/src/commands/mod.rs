pub mod graph;
pub mod history;
pub mod prompt;

use threadline_config::AppConfig;
use threadline_store::PromptStore;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub async fn open_store(config: &AppConfig) -> Result<PromptStore, Box<dyn std::error::Error>> {
    let root = config.store_root();
    Ok(PromptStore::open(&root)
        .await
        .map_err(|e| format!("Failed to open store at {}: {e}", root.display()))?)
}
