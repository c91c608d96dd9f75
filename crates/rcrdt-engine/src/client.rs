//! Client handle over a running engine.
//!
//! Thin wrapper translating the client command surface into calls against a
//! shared `Engine`, mirroring the request/response shape of a remote client
//! even though today it is an in-process `Arc<Engine<T>>`.

use crate::consistency::Consistency;
use crate::engine::{ClientCommand, ClientReply, Engine};
use crate::error::{EngineError, Result};
use crate::network::NetworkTransport;
use rcrdt_core::value::CrdtValue;
use rcrdt_envelope::Envelope;
use rcrdt_store::{Key, SubscriberId, WatcherId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub default_consistency: Consistency,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_consistency: Consistency::One,
        }
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn default_consistency(mut self, level: Consistency) -> Self {
        self.config.default_consistency = level;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle onto a running `Engine`, exposing `Get`/`GetKeys`/`Update`/
/// `Delete`/`Subscribe`/`Unsubscribe` as plain async methods instead of the
/// raw `ClientCommand` enum.
#[derive(Clone)]
pub struct Client<T: NetworkTransport> {
    engine: Arc<Engine<T>>,
    config: ClientConfig,
    watcher: WatcherId,
}

impl<T: NetworkTransport> Client<T> {
    pub fn new(engine: Arc<Engine<T>>, config: ClientConfig) -> Self {
        let watcher = engine.new_watcher_id();
        Self {
            engine,
            config,
            watcher,
        }
    }

    /// This client's watcher identity, shared across every key it
    /// subscribes to. Feed it back as `MembershipEvent::WatcherTerminated`
    /// when the session ends to purge every subscription in one call.
    pub fn watcher_id(&self) -> WatcherId {
        self.watcher
    }

    pub async fn get(&self, key: impl Into<Key>) -> Result<Envelope<CrdtValue>> {
        self.get_at(key, self.config.default_consistency).await
    }

    pub async fn get_at(
        &self,
        key: impl Into<Key>,
        level: Consistency,
    ) -> Result<Envelope<CrdtValue>> {
        match self
            .engine
            .handle_command(ClientCommand::Get {
                key: key.into(),
                level,
            })
            .await
        {
            ClientReply::Value(envelope) => Ok(envelope),
            ClientReply::NotFound => Err(EngineError::NotFound),
            ClientReply::DataDeleted => Err(EngineError::DataDeleted),
            ClientReply::Error(e) => Err(e),
            _ => unreachable!("engine replied with the wrong variant for Get"),
        }
    }

    pub async fn get_keys(&self) -> BTreeSet<Key> {
        match self.engine.handle_command(ClientCommand::GetKeys).await {
            ClientReply::Keys(keys) => keys,
            _ => unreachable!("engine replied with the wrong variant for GetKeys"),
        }
    }

    pub async fn update<F>(&self, key: impl Into<Key>, f: F) -> Result<()>
    where
        F: FnOnce(CrdtValue) -> std::result::Result<CrdtValue, String> + Send + 'static,
    {
        self.update_at(key, self.config.default_consistency, f).await
    }

    pub async fn update_at<F>(&self, key: impl Into<Key>, level: Consistency, f: F) -> Result<()>
    where
        F: FnOnce(CrdtValue) -> std::result::Result<CrdtValue, String> + Send + 'static,
    {
        match self
            .engine
            .handle_command(ClientCommand::Update {
                key: key.into(),
                level,
                f: Box::new(f),
            })
            .await
        {
            ClientReply::UpdateOk => Ok(()),
            ClientReply::Error(e) => Err(e),
            _ => unreachable!("engine replied with the wrong variant for Update"),
        }
    }

    pub async fn delete(&self, key: impl Into<Key>) -> Result<()> {
        self.delete_at(key, self.config.default_consistency).await
    }

    pub async fn delete_at(&self, key: impl Into<Key>, level: Consistency) -> Result<()> {
        match self
            .engine
            .handle_command(ClientCommand::Delete {
                key: key.into(),
                level,
            })
            .await
        {
            ClientReply::DeleteOk => Ok(()),
            ClientReply::Error(e) => Err(e),
            _ => unreachable!("engine replied with the wrong variant for Delete"),
        }
    }

    pub async fn subscribe(
        &self,
        key: impl Into<Key>,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<rcrdt_envelope::Entry>) {
        match self
            .engine
            .handle_command(ClientCommand::Subscribe {
                key: key.into(),
                watcher: self.watcher,
            })
            .await
        {
            ClientReply::Subscribed(id, rx) => (id, rx),
            _ => unreachable!("engine replied with the wrong variant for Subscribe"),
        }
    }

    pub async fn unsubscribe(&self, key: impl Into<Key>, id: SubscriberId) {
        let _ = self
            .engine
            .handle_command(ClientCommand::Unsubscribe {
                key: key.into(),
                id,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::network::{MemoryTransport, PeerId};
    use rcrdt_core::{GCounter, NodeId};

    #[tokio::test]
    async fn update_then_get_via_client() {
        let engine = Arc::new(Engine::new(
            NodeId::new("n1", 1),
            EngineConfig::builder("store").build(),
            MemoryTransport::new(PeerId::new("n1")),
        ));
        let client = Client::new(engine, ClientConfig::default());

        client
            .update("counter", |value| {
                let mut c = match value {
                    CrdtValue::GCounter(c) => c,
                    _ => GCounter::new(),
                };
                c.increment(&NodeId::new("n1", 1), 4);
                Ok(CrdtValue::GCounter(c))
            })
            .await
            .unwrap();

        let envelope = client.get("counter").await.unwrap();
        match envelope.data {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 4),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn get_missing_key_errors_not_found() {
        let engine = Arc::new(Engine::new(
            NodeId::new("n1", 1),
            EngineConfig::builder("store").build(),
            MemoryTransport::new(PeerId::new("n1")),
        ));
        let client = Client::new(engine, ClientConfig::default());

        let result = client.get("missing").await;
        assert!(matches!(result, Err(EngineError::NotFound)));
    }

    #[tokio::test]
    async fn get_deleted_key_errors_data_deleted() {
        let engine = Arc::new(Engine::new(
            NodeId::new("n1", 1),
            EngineConfig::builder("store").build(),
            MemoryTransport::new(PeerId::new("n1")),
        ));
        let client = Client::new(engine, ClientConfig::default());

        client
            .update("counter", |value| {
                let mut c = match value {
                    CrdtValue::GCounter(c) => c,
                    _ => GCounter::new(),
                };
                c.increment(&NodeId::new("n1", 1), 1);
                Ok(CrdtValue::GCounter(c))
            })
            .await
            .unwrap();
        client.delete("counter").await.unwrap();

        let result = client.get("counter").await;
        assert!(matches!(result, Err(EngineError::DataDeleted)));
    }
}
