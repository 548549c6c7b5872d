use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::{
    auth::LoginThrottle,
    config::Config,
    db::Database,
    error::{AppError, ConfigError, Result},
    messaging::MessageTransport,
    uploads::ObjectStore,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub store: Arc<dyn ObjectStore>,
    /// Absent when messaging credentials are not configured
    transport: Option<Arc<dyn MessageTransport>>,
    pub login_throttle: Arc<LoginThrottle>,
    cookie_key: Key,
}

impl AppState {
    pub fn new(
        db: Database,
        config: Config,
        store: Arc<dyn ObjectStore>,
        transport: Option<Arc<dyn MessageTransport>>,
    ) -> Result<Self, ConfigError> {
        let cookie_key = Key::derive_from(config.auth.signing_secret()?.as_bytes());

        Ok(Self {
            db,
            config: Arc::new(config),
            store,
            transport,
            login_throttle: Arc::new(LoginThrottle::default()),
            cookie_key,
        })
    }

    /// The messaging transport, or the configuration error naming what is missing
    pub fn transport(&self) -> Result<Arc<dyn MessageTransport>> {
        match &self.transport {
            Some(transport) => Ok(transport.clone()),
            None => {
                self.config.messaging.credentials()?;
                Err(AppError::Internal("messaging transport was not initialised".to_string()))
            }
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
