//! The iterative FIND_NODE / FIND_VALUE lookup engine.
//!
//! Modelled as an async state machine driven by `tokio::select!` over a
//! bounded `FuturesUnordered` of size [`crate::ALPHA`], rather than the
//! callback-chaining `Deferred` graph of the reference implementation —
//! the same direct-`await` idiom the node orchestrator itself uses for
//! single steps, generalized to a multi-round loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use drogulus_types::{Identifier, MessageBody, PeerRecord, SignedItem};
use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::node::Node;
use crate::{DhtError, Result, ALPHA, K, LOOKUP_TIMEOUT_SECS};

/// Which RPC kind a lookup sends each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    FindNode,
    FindValue,
}

/// What a lookup resolves with.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    /// `FIND_VALUE` hit, plus the closest contacted peer that did **not**
    /// return the value (if any) — the node caches the item there.
    Value(SignedItem, Option<PeerRecord>),
    /// `FIND_NODE` (or a `FIND_VALUE` miss's closest peers), ordered by
    /// distance to the target, length <= K.
    Nodes(Vec<PeerRecord>),
}

struct RoundReply {
    peer: PeerRecord,
    result: Result<drogulus_types::Envelope>,
}

/// One outstanding lookup.
pub struct Lookup {
    node: Arc<Node>,
    kind: LookupKind,
    target: Identifier,
    shortlist: Vec<PeerRecord>,
    contacted: HashSet<Identifier>,
    nearest_node: Identifier,
}

impl Lookup {
    /// Seed a lookup and run it to completion.
    pub async fn run(node: Arc<Node>, kind: LookupKind, target: Identifier) -> Result<LookupOutcome> {
        let shortlist = {
            let table = node.routing_table.lock().await;
            table.find_close_nodes(&target, None)
        };
        if shortlist.is_empty() {
            return Err(DhtError::RoutingTableEmpty);
        }
        if target != node.identity.network_id {
            let _ = node.routing_table.lock().await.touch_bucket(&target, node.now());
        }

        let nearest_node = shortlist[0].network_id;
        let mut lookup = Lookup {
            node,
            kind,
            target,
            shortlist,
            contacted: HashSet::new(),
            nearest_node,
        };

        let deadline = tokio::time::sleep(Duration::from_secs(LOOKUP_TIMEOUT_SECS));
        tokio::pin!(deadline);

        let mut in_flight = FuturesUnordered::new();
        lookup.fire_round(&mut in_flight);
        if in_flight.is_empty() {
            // Shortlist was non-empty but every peer was already
            // contacted (can't happen on the first round, but keeps the
            // loop below well-defined if it ever does).
            return Ok(LookupOutcome::Nodes(lookup.shortlist));
        }

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    return Err(DhtError::TimedOut);
                }
                reply = in_flight.next() => {
                    let Some(reply) = reply else {
                        // No pending replies and nothing left to contact.
                        return lookup.terminate();
                    };
                    if let Some(outcome) = lookup.on_reply(reply).await {
                        return outcome;
                    }
                    lookup.fire_round(&mut in_flight);
                    if in_flight.is_empty() && lookup.fully_contacted() {
                        return lookup.terminate();
                    }
                }
            }
        }
    }

    fn fully_contacted(&self) -> bool {
        self.shortlist
            .iter()
            .all(|peer| self.contacted.contains(&peer.network_id))
    }

    fn terminate(self) -> Result<LookupOutcome> {
        match self.kind {
            LookupKind::FindNode => Ok(LookupOutcome::Nodes(self.shortlist)),
            LookupKind::FindValue => Err(DhtError::ValueNotFound),
        }
    }

    /// Send RPCs to uncontacted shortlist peers until `ALPHA` are in
    /// flight.
    fn fire_round(&mut self, in_flight: &mut FuturesUnordered<impl_future::BoxedRoundFuture>) {
        let targets: Vec<PeerRecord> = self
            .shortlist
            .iter()
            .filter(|peer| !self.contacted.contains(&peer.network_id))
            .take(ALPHA.saturating_sub(in_flight_len(in_flight)))
            .cloned()
            .collect();

        for peer in targets {
            self.contacted.insert(peer.network_id);
            let node = self.node.clone();
            let kind = self.kind;
            let target = self.target;
            let fut = Box::pin(async move {
                let body = match kind {
                    LookupKind::FindNode => MessageBody::FindNode { key: target },
                    LookupKind::FindValue => MessageBody::FindValue { key: target },
                };
                let result = node.send_and_await(&peer, body).await;
                RoundReply { peer, result }
            });
            in_flight.push(fut);
        }
    }

    /// Process one reply (or error/timeout) for a single request. Returns
    /// `Some(outcome)` if the lookup resolves here, else `None` to keep
    /// going.
    async fn on_reply(&mut self, reply: RoundReply) -> Option<Result<LookupOutcome>> {
        let RoundReply { peer, result } = reply;

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(_) => {
                self.drop_from_shortlist(&peer.network_id);
                return None;
            }
        };

        match envelope.body {
            MessageBody::Value(item_fields) => {
                if self.kind != LookupKind::FindValue || item_fields.key != self.target {
                    let _ = self.node.routing_table.lock().await.blacklist(&peer.network_id);
                    self.drop_from_shortlist(&peer.network_id);
                    return None;
                }
                let item = drogulus_types::SignedItem {
                    name: item_fields.name,
                    value: item_fields.value,
                    public_key: item_fields.public_key,
                    timestamp: item_fields.timestamp,
                    expires: item_fields.expires,
                    created_with: item_fields.created_with,
                    key: item_fields.key,
                    signature: item_fields.signature,
                };
                if !item.never_expires() && item.is_expired(self.node.now()) {
                    self.drop_from_shortlist(&peer.network_id);
                    return None;
                }
                self.drop_from_shortlist(&peer.network_id);
                let nearest_miss = self
                    .shortlist
                    .iter()
                    .find(|candidate| self.contacted.contains(&candidate.network_id))
                    .cloned();
                Some(Ok(LookupOutcome::Value(item, nearest_miss)))
            }
            MessageBody::Nodes { nodes } => {
                // A `nodes` reply to a FIND_VALUE is a miss, not an error;
                // it just contributes closer peers to the next round.
                let mut fresh: Vec<PeerRecord> = nodes
                    .into_iter()
                    .map(|entry| {
                        let network_id = Identifier::from_sha512(entry.public_key.as_bytes());
                        PeerRecord {
                            public_key: entry.public_key,
                            network_id,
                            version: entry.version,
                            uri: entry.uri,
                            last_seen: self.node.now(),
                            failed_rpcs: 0,
                        }
                    })
                    .filter(|candidate| {
                        !self
                            .shortlist
                            .iter()
                            .any(|existing| existing.network_id == candidate.network_id)
                    })
                    .collect();
                self.shortlist.append(&mut fresh);
                self.shortlist
                    .sort_by_key(|peer| self.target.distance(&peer.network_id));
                self.shortlist.truncate(K);

                if self.shortlist.first().map(|p| p.network_id) != Some(self.nearest_node) {
                    if let Some(first) = self.shortlist.first() {
                        self.nearest_node = first.network_id;
                    }
                }
                None
            }
            _ => {
                let _ = self.node.routing_table.lock().await.blacklist(&peer.network_id);
                self.drop_from_shortlist(&peer.network_id);
                None
            }
        }
    }

    fn drop_from_shortlist(&mut self, id: &Identifier) {
        self.shortlist.retain(|peer| &peer.network_id != id);
    }
}

fn in_flight_len(in_flight: &FuturesUnordered<impl_future::BoxedRoundFuture>) -> usize {
    in_flight.len()
}

/// Local module purely to name the boxed future type `fire_round` pushes,
/// since `FuturesUnordered`'s item type must be nameable.
mod impl_future {
    use super::RoundReply;
    use std::future::Future;
    use std::pin::Pin;

    pub type BoxedRoundFuture = Pin<Box<dyn Future<Output = RoundReply> + Send>>;
}
