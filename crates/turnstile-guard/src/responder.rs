//! STUN Binding responder: answers connectivity checks with the
//! client's reflexive address.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

use turnstile_stun::{Attribute, Message};

/// Failures while answering a Binding request.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The source transport address could not be decomposed into IP and
    /// port. No response is sent; the engine decides whether to log or
    /// drop.
    #[error("cannot extract IP and port from source address {0:?}")]
    AddressExtraction(String),
    /// The transport send failed. Propagated as-is, never retried here.
    #[error("failed to send binding response")]
    Send(#[from] io::Error),
}

/// Outbound datagram seam, so tests can capture what would hit the wire.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl PacketSink for UdpSocket {
    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, payload, dest).await
    }
}

/// Build the Binding Success response for a request arriving from `src`:
/// the request's transaction ID, with `src` as XOR-MAPPED-ADDRESS.
pub fn build_binding_response(src: SocketAddr, request: &Message) -> Message {
    let mut response = Message::binding_success(request.transaction_id);
    response.attributes.push(Attribute::XorMappedAddress(src));
    response
}

/// Answer a Binding request from `src_addr` (textual `host:port` form,
/// as the engine presents transport addresses).
///
/// The response echoes the request's transaction ID, carries the source
/// as XOR-MAPPED-ADDRESS, and ends with a FINGERPRINT so receivers can
/// demultiplex STUN from other traffic on the port.
pub async fn handle_binding_request<S: PacketSink + ?Sized>(
    sink: &S,
    src_addr: &str,
    request: &Message,
) -> Result<(), ResponderError> {
    let src: SocketAddr = src_addr
        .parse()
        .map_err(|_| ResponderError::AddressExtraction(src_addr.to_string()))?;

    debug!(%src, "received binding request");

    let payload = build_binding_response(src, request).encode_with_fingerprint();
    sink.send_to(&payload, src).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use turnstile_stun::{verify_fingerprint, MessageType};

    /// Sink that records every datagram instead of sending it.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    }

    #[async_trait]
    impl PacketSink for RecordingSink {
        async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize> {
            self.sent.lock().unwrap().push((payload.to_vec(), dest));
            Ok(payload.len())
        }
    }

    /// Sink whose sends always fail.
    struct FailingSink;

    #[async_trait]
    impl PacketSink for FailingSink {
        async fn send_to(&self, _payload: &[u8], _dest: SocketAddr) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "network down"))
        }
    }

    #[tokio::test]
    async fn response_echoes_transaction_and_maps_source() {
        let sink = RecordingSink::default();
        let txn = [0xABu8; 12];
        let request = Message::binding_request(txn);

        handle_binding_request(&sink, "192.0.2.1:5000", &request)
            .await
            .unwrap();

        let sent = sink.sent.lock().unwrap();
        let (payload, dest) = &sent[0];
        assert_eq!(dest.to_string(), "192.0.2.1:5000");

        let response = Message::decode(payload).unwrap();
        assert_eq!(response.msg_type, MessageType::BindingSuccess);
        assert_eq!(response.transaction_id, txn);
        assert_eq!(
            response.xor_mapped_address().unwrap().to_string(),
            "192.0.2.1:5000"
        );
        assert!(matches!(
            response.attributes.last(),
            Some(Attribute::Fingerprint(_))
        ));
        assert!(verify_fingerprint(payload));
    }

    #[tokio::test]
    async fn ipv6_source_is_mapped_back() {
        let sink = RecordingSink::default();
        let request = Message::binding_request([1u8; 12]);

        handle_binding_request(&sink, "[2001:db8::7]:49152", &request)
            .await
            .unwrap();

        let sent = sink.sent.lock().unwrap();
        let response = Message::decode(&sent[0].0).unwrap();
        assert_eq!(
            response.xor_mapped_address().unwrap(),
            "[2001:db8::7]:49152".parse().unwrap()
        );
    }

    #[tokio::test]
    async fn malformed_source_sends_nothing() {
        let sink = RecordingSink::default();
        let request = Message::binding_request([2u8; 12]);

        let err = handle_binding_request(&sink, "not-an-address", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::AddressExtraction(_)));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_propagates_unretried() {
        let request = Message::binding_request([3u8; 12]);
        let err = handle_binding_request(&FailingSink, "192.0.2.1:5000", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::Send(_)));
    }

    #[tokio::test]
    async fn identical_requests_yield_identical_responses() {
        let sink = RecordingSink::default();
        let request = Message::binding_request([4u8; 12]);

        handle_binding_request(&sink, "198.51.100.2:40000", &request)
            .await
            .unwrap();
        handle_binding_request(&sink, "198.51.100.2:40000", &request)
            .await
            .unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn responds_over_a_real_udp_socket() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let request = Message::binding_request(turnstile_stun::transaction_id());
        handle_binding_request(&server, &client_addr.to_string(), &request)
            .await
            .unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        let response = Message::decode(&buf[..len]).unwrap();
        assert_eq!(response.transaction_id, request.transaction_id);
        assert_eq!(response.xor_mapped_address(), Some(client_addr));
    }
}
