//! Length-prefixed ("netstring") framing over TCP.
//!
//! A netstring is `{length}:{payload},` — the decimal byte length of the
//! payload, a colon, the payload itself, and a trailing comma. This is one
//! of the two wire framings the message schema allows; the decoded JSON
//! object is identical either way.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use drogulus_types::{Envelope, PeerRecord};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::transport::{MessageSink, Transport};
use crate::{Result, TransportError};

const MAX_LENGTH: usize = 12 * 1024 * 1024;

/// Encode `payload` as a netstring.
fn encode_netstring(payload: &str) -> Vec<u8> {
    let mut out = format!("{}:", payload.len()).into_bytes();
    out.extend_from_slice(payload.as_bytes());
    out.push(b',');
    out
}

/// Read exactly one netstring off `stream`, returning its payload.
async fn read_netstring(stream: &mut TcpStream) -> Result<String> {
    let mut length_digits = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if n == 0 {
            return Err(TransportError::ProtocolViolation(
                "connection closed mid-length".into(),
            ));
        }
        if byte[0] == b':' {
            break;
        }
        length_digits.push(byte[0]);
    }
    let length_str = String::from_utf8_lossy(&length_digits);
    let length: usize = length_str
        .parse()
        .map_err(|_| TransportError::ProtocolViolation("bad netstring length".into()))?;
    if length > MAX_LENGTH {
        return Err(TransportError::ProtocolViolation(
            "netstring too long".into(),
        ));
    }

    let mut payload = vec![0u8; length];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;

    let mut comma = [0u8; 1];
    stream
        .read_exact(&mut comma)
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;
    if comma[0] != b',' {
        return Err(TransportError::ProtocolViolation(
            "netstring missing trailing comma".into(),
        ));
    }

    String::from_utf8(payload).map_err(|_| TransportError::ProtocolViolation("not UTF-8".into()))
}

/// A [`Transport`] that dials a fresh TCP connection per send and frames
/// each envelope as a netstring.
///
/// The reference implementation caches one connection per peer and reuses
/// it; this simplified port dials per send, which the node's transport
/// contract treats identically (an abstract transport is free to cache
/// connections or not).
pub struct NetstringTransport {
    connections: Arc<Mutex<HashMap<String, TcpStream>>>,
}

impl Default for NetstringTransport {
    fn default() -> Self {
        NetstringTransport {
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl NetstringTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener at `addr` and dispatch every received envelope to
    /// `sink`.
    pub async fn listen(addr: &str, sink: Arc<dyn MessageSink>) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        loop {
            let (mut stream, peer_addr) = listener
                .accept()
                .await
                .map_err(|e| TransportError::Io(e.to_string()))?;
            let sink = sink.clone();
            tokio::spawn(async move {
                if let Ok(payload) = read_netstring(&mut stream).await {
                    if let Ok(envelope) = serde_json::from_str::<Envelope>(&payload) {
                        sink.receive(envelope, &peer_addr.ip().to_string()).await;
                    }
                }
            });
        }
    }

    async fn dial(uri: &str) -> Result<TcpStream> {
        let parsed = url::Url::parse(uri)
            .map_err(|_| TransportError::ProtocolViolation(format!("bad uri: {uri}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::ProtocolViolation(format!("uri has no host: {uri}")))?;
        let port = parsed
            .port()
            .ok_or_else(|| TransportError::ProtocolViolation(format!("uri has no port: {uri}")))?;
        TcpStream::connect((host, port))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Transport for NetstringTransport {
    async fn send(&self, contact: &PeerRecord, envelope: &Envelope) -> Result<()> {
        let payload = serde_json::to_string(envelope)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        let framed = encode_netstring(&payload);

        let mut connections = self.connections.lock().await;
        if let Some(stream) = connections.get_mut(&contact.network_id.to_hex()) {
            if stream.write_all(&framed).await.is_ok() {
                return Ok(());
            }
            connections.remove(&contact.network_id.to_hex());
        }

        let mut stream = Self::dial(&contact.uri).await?;
        stream
            .write_all(&framed)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        connections.insert(contact.network_id.to_hex(), stream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_the_netstring_framing() {
        assert_eq!(encode_netstring("abc"), b"3:abc,".to_vec());
        assert_eq!(encode_netstring(""), b"0:,".to_vec());
    }
}
