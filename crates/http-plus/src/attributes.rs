//! Attribute keys set on client request spans.

/// Captured outgoing request payload (UTF-8 text).
pub const HTTP_REQUEST_BODY: &str = "http.request.body";
/// Captured incoming response payload (UTF-8 text).
pub const HTTP_RESPONSE_BODY: &str = "http.response.body";

/// Request start to name resolution, in milliseconds.
pub const NET_DNS_LOOKUP_DURATION: &str = "net.dns.lookup.duration";
/// Name resolution to TCP connection established, in milliseconds.
pub const NET_TCP_CONNECT_DURATION: &str = "net.tcp.connect.duration";
/// TCP connection to TLS handshake complete, in milliseconds.
pub const NET_TLS_HANDSHAKE_DURATION: &str = "net.tls.handshake.duration";
/// Connection ready (TLS, else TCP) to first response byte, in milliseconds.
pub const NET_TTFB_DURATION: &str = "net.ttfb.duration";
/// First response byte to end of the response stream, in milliseconds.
pub const NET_CONTENT_TRANSFER_DURATION: &str = "net.content.transfer.duration";

// Peer identity, copied onto network phase spans.
pub const NET_PEER_NAME: &str = "net.peer.name";
pub const NET_PEER_IP: &str = "net.peer.ip";
pub const NET_PEER_PORT: &str = "net.peer.port";

/// Whether `key` identifies the remote peer.
pub fn is_peer_attribute(key: &str) -> bool {
    matches!(key, NET_PEER_NAME | NET_PEER_IP | NET_PEER_PORT)
}
