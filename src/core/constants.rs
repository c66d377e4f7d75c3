//! Defaults and wire constants.
//!
//! The high-water marks and the maximum datagram size are
//! implementation-chosen defaults; every session can override them through
//! [`SessionConfig`](super::SessionConfig).

// =============================================================================
// QUEUE DEFAULTS
// =============================================================================

/// Default capacity of the outgoing datagram queue before the producer is
/// asked to wait.
pub const DEFAULT_OUTGOING_HIGH_WATER_MARK: usize = 64;

/// Default capacity of the incoming datagram queue before arrivals are
/// dropped.
pub const DEFAULT_INCOMING_HIGH_WATER_MARK: usize = 64;

/// Default maximum datagram payload size.
///
/// QUIC guarantees a 1200 byte path MTU; datagram frame overhead is left to
/// the transport, so payloads up to this size fit any compliant path.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1200;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Default receive buffer size for socket links.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// Default number of in-flight datagrams an in-memory link buffers per
/// direction before the wire drops them.
pub const DEFAULT_LOOPBACK_CAPACITY: usize = 256;

// =============================================================================
// CAPSULES (draft-ietf-masque-h3-datagram, draft-ietf-webtrans-http3)
// =============================================================================

/// Capsule type: DATAGRAM.
pub const CAPSULE_TYPE_DATAGRAM: u64 = 0xff37a0;

/// Capsule type: REGISTER_DATAGRAM_CONTEXT.
pub const CAPSULE_TYPE_REGISTER_DATAGRAM_CONTEXT: u64 = 0xff37a1;

/// Capsule type: REGISTER_DATAGRAM_NO_CONTEXT.
pub const CAPSULE_TYPE_REGISTER_DATAGRAM_NO_CONTEXT: u64 = 0xff37a2;

/// Capsule type: CLOSE_DATAGRAM_CONTEXT.
pub const CAPSULE_TYPE_CLOSE_DATAGRAM_CONTEXT: u64 = 0xff37a3;

/// Capsule type: CLOSE_WEBTRANSPORT_SESSION.
pub const CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION: u64 = 0x2843;

/// Maximum length in bytes of a session close reason.
pub const MAX_CLOSE_REASON_LEN: usize = 1024;

/// Largest value a QUIC variable-length integer can carry (2^62 - 1).
pub const VARINT_MAX: u64 = (1 << 62) - 1;
