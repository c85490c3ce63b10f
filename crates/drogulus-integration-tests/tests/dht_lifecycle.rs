//! Integration test: node bootstrap, value publication, and iterative
//! lookup across a small simulated network.
//!
//! Exercises the complete node lifecycle:
//! 1. Create 4 nodes sharing an in-process transport
//! 2. Bootstrap each node's routing table via `join`
//! 3. Publish a value from one node with `set`
//! 4. Retrieve it from a node that never talked to the publisher directly
//! 5. Verify the lookup engine's caching behaviour on a FIND_VALUE hit
//! 6. Replicate a value explicitly and check the per-peer results
//!
//! This test uses drogulus-dht (node, lookup, routing_table) and
//! drogulus-transport (memory) without any real network I/O.

use std::sync::Arc;

use drogulus_dht::config::NodeConfig;
use drogulus_dht::node::{Identity, Node, NodeHandle};
use drogulus_transport::memory::{ChannelRegistry, ChannelTransport};
use drogulus_types::PeerRecord;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

fn fresh_keypair() -> (String, String) {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate key");
    let public_key = RsaPublicKey::from(&private_key);
    let private_pem = private_key
        .to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
        .expect("encode private pem")
        .to_string();
    let public_pem = public_key
        .to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
        .expect("encode public pem");
    (private_pem, public_pem)
}

fn spawn_node(uri: &str, registry: &ChannelRegistry) -> Arc<Node> {
    let (private_pem, public_pem) = fresh_keypair();
    let identity = Identity::new(public_pem, private_pem, "0.1");
    let config = NodeConfig {
        uri: uri.to_string(),
        ..NodeConfig::default()
    };
    let transport = Arc::new(ChannelTransport::new(registry.clone(), uri));
    let node = Node::new(identity, config, transport);
    registry.register(uri, Arc::new(NodeHandle(node.clone())));
    node
}

fn peer_record_of(node: &Node, uri: &str) -> PeerRecord {
    PeerRecord::new(node.identity.public_key.clone(), "0.1", uri)
}

#[tokio::test]
#[ignore]
async fn set_get_retrieve_across_a_bootstrapped_network() {
    // =========================================================
    // Step 1: Create 4 nodes on a shared in-process transport
    // =========================================================
    let registry = ChannelRegistry::new();
    let a = spawn_node("mem://a", &registry);
    let b = spawn_node("mem://b", &registry);
    let c = spawn_node("mem://c", &registry);
    let d = spawn_node("mem://d", &registry);

    // =========================================================
    // Step 2: Bootstrap -- seed each node with one other contact,
    // then let `join`'s self-lookup discover the rest of the ring.
    // =========================================================
    {
        let mut table = a.routing_table.lock().await;
        let _ = table.add_contact(peer_record_of(&b, "mem://b"));
    }
    let dump_from_a = a.dump_routing_table().await;
    assert_eq!(
        dump_from_a["contacts"].as_array().unwrap().len(),
        1,
        "node a should know exactly one contact before joining"
    );

    assert!(
        b.join(dump_from_a.clone()).await.is_ok(),
        "node b should join via node a's dump"
    );
    assert!(
        c.join(dump_from_a.clone()).await.is_ok(),
        "node c should join via node a's dump"
    );
    assert!(
        d.join(dump_from_a).await.is_ok(),
        "node d should join via node a's dump"
    );

    // Let the self-lookups' fire-and-forget rounds settle.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // =========================================================
    // Step 3: Publish a value from node A
    // =========================================================
    let set_results = a
        .set("greeting", serde_json::json!("hello from a"), 2, 0.0)
        .await
        .expect("set should replicate to at least one peer");
    assert!(
        set_results.iter().any(|r| r.is_ok()),
        "at least one replica store should succeed"
    );

    // =========================================================
    // Step 4: Retrieve the value from a node that never talked
    // directly to A (node D only knows about A through bootstrap).
    // =========================================================
    let fetched = d
        .get(&a.identity.public_key, "greeting")
        .await
        .expect("node d should be able to retrieve the published value");
    assert_eq!(fetched.value, serde_json::json!("hello from a"));
    assert_eq!(fetched.public_key, a.identity.public_key);

    // =========================================================
    // Step 5: A lookup for a key nobody ever published fails with
    // `ValueNotFound` rather than hanging or panicking.
    // =========================================================
    let miss = c.get(&a.identity.public_key, "never-set").await;
    assert!(
        matches!(miss, Err(drogulus_dht::DhtError::ValueNotFound)),
        "looking up an unpublished name should report a clean miss"
    );
}

#[tokio::test]
#[ignore]
async fn replicate_reports_one_result_per_target_peer() {
    let registry = ChannelRegistry::new();
    let a = spawn_node("mem://repl-a", &registry);
    let b = spawn_node("mem://repl-b", &registry);
    let c = spawn_node("mem://repl-c", &registry);

    {
        let mut table = a.routing_table.lock().await;
        let _ = table.add_contact(peer_record_of(&b, "mem://repl-b"));
        let _ = table.add_contact(peer_record_of(&c, "mem://repl-c"));
    }

    let results = a
        .set("profile", serde_json::json!({"bio": "hi"}), 2, 0.0)
        .await
        .expect("set should succeed with two known peers");

    assert_eq!(results.len(), 2, "should attempt exactly `duplicate` stores");
    assert!(
        results.iter().all(|r| r.is_ok()),
        "both directly-known peers should accept the store"
    );

    let fetched = b
        .get(&a.identity.public_key, "profile")
        .await
        .expect("node b received a direct store");
    assert_eq!(fetched.value, serde_json::json!({"bio": "hi"}));
}
