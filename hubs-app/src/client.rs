//! Client wiring
//!
//! `Client` ties the store to a forum service and its storage, the way a
//! front end would hold them for the lifetime of the process.
//!
//! # Example
//!
//! ```no_run
//! use hubs_app::client::Client;
//! use hubs_app::feed::FeedSource;
//! use libhubs::Config;
//!
//! # async fn example() -> hubs_app::error::Result<()> {
//! let client = Client::from_config(&Config::load()?)?;
//! client.start().await;
//!
//! let mut feed = client.feed(FeedSource::Subscriptions);
//! feed.refresh(&client.session()).await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use libhubs::api::http::HttpApi;
use libhubs::api::session::ApiSession;
use libhubs::api::ForumApi;
use libhubs::config::{Config, DefaultsConfig};
use libhubs::storage::{FileStorage, KeyValueStorage};

use crate::app::effects;
use crate::app::Store;
use crate::error::Result;
use crate::feed::{FeedSource, PostFeed};

pub struct Client {
    api: Arc<dyn ForumApi>,
    store: Store,
    defaults: DefaultsConfig,
}

impl Client {
    /// Build a client from configuration
    ///
    /// Installs logging from `[logging]` unless a subscriber is already in
    /// place, then opens the HTTP collaborator at `api.endpoint` and the
    /// preference file at `storage.path`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let logging = config.logging.clone().with_env_overrides();
        if !logging.init() {
            tracing::debug!("Logging already initialized");
        }

        let api = HttpApi::from_config(&config.api)?;
        let storage = FileStorage::open(config.storage_path()?)?;

        tracing::info!(
            "Client ready for {} (storage: {})",
            api.endpoint(),
            storage.path().display()
        );

        Ok(Self::new(
            Arc::new(api),
            Arc::new(storage),
            config.defaults.clone(),
        ))
    }

    pub fn new(
        api: Arc<dyn ForumApi>,
        storage: Arc<dyn KeyValueStorage>,
        defaults: DefaultsConfig,
    ) -> Self {
        let store = Store::new(storage, &defaults);
        Self {
            api,
            store,
            defaults,
        }
    }

    /// Restore the persisted session, if any
    pub async fn start(&self) {
        effects::authenticate(&self.store, self.api.as_ref()).await;
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn ForumApi> {
        &self.api
    }

    pub fn defaults(&self) -> &DefaultsConfig {
        &self.defaults
    }

    /// API bound to the current session
    ///
    /// Take a fresh one after the session changes; it does not follow the
    /// store.
    pub fn session(&self) -> ApiSession {
        effects::api_session(&self.store, self.api.clone())
    }

    /// Feed configured from the current preferences
    pub fn feed(&self, source: FeedSource) -> PostFeed {
        PostFeed::from_state(source, &self.store.state(), &self.defaults)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("store", &self.store)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
