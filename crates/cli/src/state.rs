use std::sync::Arc;

use fret_chat::client::ChatClient;
use fret_chat::reconnect::ReconnectConfig;
use fret_chat::session::SessionConfig;
use fret_client::api::{ApiClient, ApiError};
use fret_client::config::ClientConfig;
use fret_client::orders::{OrderBackend, OrderService};
use fret_core::roles::Role;
use fret_core::types::DbId;

/// Services shared by every command.
///
/// Cheaply cloneable; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClientConfig>,
    pub api: Arc<ApiClient>,
    pub orders: Arc<OrderService>,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let api = Arc::new(ApiClient::from_config(&config)?);
        let orders = Arc::new(OrderService::new(Arc::clone(&api) as Arc<dyn OrderBackend>));
        Ok(Self {
            config: Arc::new(config),
            api,
            orders,
        })
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Signed-in user id; chat needs it to tell own messages apart.
    pub fn user_id(&self) -> anyhow::Result<DbId> {
        self.config
            .user_id
            .ok_or_else(|| anyhow::anyhow!("FRET_USER_ID must be set to use chat"))
    }

    pub fn chat_client(&self) -> ChatClient {
        ChatClient::new(self.config.socket_url.clone(), self.config.token.clone())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect: ReconnectConfig::default(),
            outbound_capacity: self.config.outbound_queue_capacity,
        }
    }
}
