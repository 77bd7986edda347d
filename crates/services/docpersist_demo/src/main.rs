// File: services/docpersist_demo/src/main.rs
use docpersist_common::logging;
use docpersist_config::{load_config, ConfigParams};
use docpersist_db::{
    DocumentDriver, Identifiable, PagingParams, PersistenceEngine, PersistenceError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

const CORRELATION_ID: &str = "docpersist-demo";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bookmark {
    id: Option<String>,
    url: String,
    title: String,
    #[serde(default)]
    visits: i64,
}

impl Identifiable<String> for Bookmark {
    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

fn bookmark(url: &str, title: &str) -> Bookmark {
    Bookmark {
        id: None,
        url: url.to_string(),
        title: title.to_string(),
        visits: 0,
    }
}

/// Used for whatever the loaded configuration leaves out
fn fallback_config() -> ConfigParams {
    ConfigParams::from_tuples([
        ("collection", "bookmarks"),
        ("connection.host", "localhost"),
        ("connection.port", "27017"),
        ("connection.database", "docpersist"),
    ])
}

#[cfg(feature = "mongodb")]
fn driver() -> Arc<dyn DocumentDriver> {
    Arc::new(docpersist_db::MongoDriver::new())
}

#[cfg(not(feature = "mongodb"))]
fn driver() -> Arc<dyn DocumentDriver> {
    Arc::new(docpersist_db::MemoryDriver::new())
}

async fn run(config: ConfigParams) -> Result<(), PersistenceError> {
    let engine = PersistenceEngine::<Bookmark, String>::builder("bookmarks", driver())
        .configure(config)
        .build()?;
    let cid = Some(CORRELATION_ID);

    engine.open(cid).await?;
    engine.clear(cid).await?;
    info!("Opened collection {:?}", engine.collection_name());

    let rust = engine
        .create(cid, bookmark("https://www.rust-lang.org", "Rust"))
        .await?;
    engine
        .create(cid, bookmark("https://tokio.rs", "Tokio"))
        .await?;
    engine
        .create(cid, bookmark("https://serde.rs", "Serde"))
        .await?;

    let page = engine
        .get_page_by_filter(
            cid,
            serde_json::Map::new(),
            Some(PagingParams::new(Some(0), Some(2), true)),
            Some(json!({ "title": 1 }).as_object().cloned().unwrap_or_default()),
            None,
        )
        .await?;
    info!(
        "First page: {:?} of {:?}",
        page.data.iter().map(|b| b.title.as_str()).collect::<Vec<_>>(),
        page.total
    );

    if let Some(id) = rust.id() {
        let patch = json!({ "visits": 42 }).as_object().cloned().unwrap_or_default();
        if let Some(updated) = engine.update_partially(cid, id, patch).await? {
            info!("{} now has {} visits", updated.title, updated.visits);
        }
        engine.delete_by_id(cid, id).await?;
    }

    if let Some(random) = engine.get_one_random(cid, serde_json::Map::new()).await? {
        info!("Random pick: {} ({})", random.title, random.url);
    }
    info!(
        "{} bookmarks left",
        engine.get_count_by_filter(cid, serde_json::Map::new()).await?
    );

    engine.close(cid).await
}

#[tokio::main]
async fn main() {
    logging::init();
    let config = load_config()
        .expect("Failed to load config")
        .set_defaults(&fallback_config());

    let result = logging::log_result(run(config).await, "Demo finished", "Demo failed");
    if let Err(err) = result {
        error!(code = err.code(), "Exiting");
        std::process::exit(1);
    }
}
