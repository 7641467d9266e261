//! In-memory credential store, filled from configuration at startup.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::bot::Platform;
use crate::ports::{BotCredentials, BotCredentialsReader, CredentialsError};

#[derive(Debug, Default)]
pub struct InMemoryBotCredentials {
    apps: RwLock<HashMap<(String, Platform), BotCredentials>>,
}

impl InMemoryBotCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, credentials: BotCredentials) -> Self {
        self.apps
            .get_mut()
            .insert((credentials.kb_id.clone(), credentials.platform), credentials);
        self
    }

    pub async fn insert(&self, credentials: BotCredentials) {
        self.apps
            .write()
            .await
            .insert((credentials.kb_id.clone(), credentials.platform), credentials);
    }

    pub async fn len(&self) -> usize {
        self.apps.read().await.len()
    }
}

#[async_trait]
impl BotCredentialsReader for InMemoryBotCredentials {
    async fn find(
        &self,
        kb_id: &str,
        platform: Platform,
    ) -> Result<Option<BotCredentials>, CredentialsError> {
        Ok(self
            .apps
            .read()
            .await
            .get(&(kb_id.to_string(), platform))
            .cloned())
    }
}
