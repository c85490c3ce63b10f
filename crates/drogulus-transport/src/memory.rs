//! An in-process transport for tests and single-process simulations of
//! multiple nodes, built on `tokio::sync::mpsc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use drogulus_types::{Envelope, PeerRecord};
use tokio::sync::mpsc;

use crate::transport::{MessageSink, Transport};
use crate::{Result, TransportError};

type Inbox = mpsc::UnboundedSender<(Envelope, String)>;

/// A shared directory of in-process inboxes, keyed by peer URI.
///
/// Every simulated node registers its inbox here at startup; sends resolve
/// the destination URI against this map instead of touching a real socket.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    inboxes: Arc<Mutex<HashMap<String, Inbox>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        ChannelRegistry::default()
    }

    /// Register `uri` as deliverable, spawning a task that forwards every
    /// received envelope to `sink.receive`.
    pub fn register(&self, uri: impl Into<String>, sink: Arc<dyn MessageSink>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Envelope, String)>();
        self.inboxes.lock().expect("registry lock poisoned").insert(uri.into(), tx);
        tokio::spawn(async move {
            while let Some((envelope, sender_addr)) = rx.recv().await {
                sink.receive(envelope, &sender_addr).await;
            }
        });
    }

    /// Remove `uri`'s inbox, simulating a peer going offline.
    pub fn unregister(&self, uri: &str) {
        self.inboxes.lock().expect("registry lock poisoned").remove(uri);
    }

    fn deliver(&self, uri: &str, envelope: Envelope, sender_addr: String) -> Result<()> {
        let inboxes = self.inboxes.lock().expect("registry lock poisoned");
        let tx = inboxes
            .get(uri)
            .ok_or_else(|| TransportError::Unreachable(uri.to_string()))?;
        tx.send((envelope, sender_addr))
            .map_err(|_| TransportError::Unreachable(uri.to_string()))
    }
}

/// A [`Transport`] that delivers through a [`ChannelRegistry`] instead of
/// the network.
pub struct ChannelTransport {
    registry: ChannelRegistry,
    local_addr: String,
}

impl ChannelTransport {
    pub fn new(registry: ChannelRegistry, local_addr: impl Into<String>) -> Self {
        ChannelTransport {
            registry,
            local_addr: local_addr.into(),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, contact: &PeerRecord, envelope: &Envelope) -> Result<()> {
        self.registry
            .deliver(&contact.uri, envelope.clone(), self.local_addr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drogulus_types::MessageBody;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MessageSink for CountingSink {
        async fn receive(&self, _envelope: Envelope, _sender_addr: &str) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample_envelope() -> Envelope {
        Envelope {
            uuid: "abc".into(),
            sender: "PUB".into(),
            recipient: "".into(),
            reply_port: 4000,
            version: "0.1".into(),
            seal: "sig".into(),
            body: MessageBody::Ping,
        }
    }

    #[tokio::test]
    async fn delivers_to_a_registered_inbox() {
        let registry = ChannelRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        registry.register(
            "mem://peer-a",
            Arc::new(CountingSink {
                count: count.clone(),
            }),
        );

        let transport = ChannelTransport::new(registry, "mem://peer-b");
        let peer = PeerRecord::new("PEER_A_PUB", "0.1", "mem://peer-a");
        transport.send(&peer, &sample_envelope()).await.unwrap();

        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_to_unregistered_uri_fails() {
        let registry = ChannelRegistry::new();
        let transport = ChannelTransport::new(registry, "mem://peer-b");
        let peer = PeerRecord::new("GHOST_PUB", "0.1", "mem://ghost");
        let result = transport.send(&peer, &sample_envelope()).await;
        assert!(result.is_err());
    }
}
