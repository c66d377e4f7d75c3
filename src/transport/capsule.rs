//! Capsule encoding and decoding.
//!
//! Capsules are type-length-value records carried on a reliable stream
//! (draft-ietf-masque-h3-datagram, draft-ietf-webtrans-http3). They let
//! datagrams and session close notifications travel over a stream when no
//! native datagram frame is available.
//!
//! Wire format:
//! ```text
//! +---------------+-----------------+------------------+
//! | Type (varint) | Length (varint) | Value (Length B) |
//! +---------------+-----------------+------------------+
//! ```
//!
//! Integers use the QUIC variable-length encoding (RFC 9000 §16): the two
//! high bits of the first byte give the encoded size (1, 2, 4 or 8 bytes).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::core::{
    CloseInfo, CAPSULE_TYPE_CLOSE_DATAGRAM_CONTEXT, CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION,
    CAPSULE_TYPE_DATAGRAM, CAPSULE_TYPE_REGISTER_DATAGRAM_CONTEXT,
    CAPSULE_TYPE_REGISTER_DATAGRAM_NO_CONTEXT, MAX_CLOSE_REASON_LEN, VARINT_MAX,
};
use crate::datagram::Datagram;

/// Default upper bound on a single capsule's value length.
pub const DEFAULT_MAX_CAPSULE_SIZE: usize = 1 << 16;

/// Capsule codec errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapsuleError {
    /// Value cannot be represented as a variable-length integer.
    #[error("varint out of range: {0}")]
    VarintOutOfRange(u64),

    /// Stream ended in the middle of a capsule.
    #[error("truncated capsule: {remaining} trailing bytes")]
    Truncated {
        /// Bytes left over at the end of the stream.
        remaining: usize,
    },

    /// Capsule value exceeds the decoder's limit.
    #[error("capsule too large: {length} bytes (max {max})")]
    TooLarge {
        /// Announced value length.
        length: u64,
        /// Decoder limit.
        max: usize,
    },

    /// Bytes were appended after the end of the stream.
    #[error("data appended after end of stream")]
    AppendAfterFinish,

    /// Malformed CLOSE_WEBTRANSPORT_SESSION value.
    #[error("invalid close capsule: {0}")]
    InvalidClose(&'static str),
}

/// Known capsule types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapsuleType {
    /// A datagram payload.
    Datagram,
    /// Datagram context registration.
    RegisterDatagramContext,
    /// Registration of the context-less datagram format.
    RegisterDatagramNoContext,
    /// Datagram context teardown.
    CloseDatagramContext,
    /// Session close with error code and reason.
    CloseWebTransportSession,
}

impl CapsuleType {
    /// Parse a capsule type. Unknown types yield `None` and must be skipped.
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            CAPSULE_TYPE_DATAGRAM => Some(Self::Datagram),
            CAPSULE_TYPE_REGISTER_DATAGRAM_CONTEXT => Some(Self::RegisterDatagramContext),
            CAPSULE_TYPE_REGISTER_DATAGRAM_NO_CONTEXT => Some(Self::RegisterDatagramNoContext),
            CAPSULE_TYPE_CLOSE_DATAGRAM_CONTEXT => Some(Self::CloseDatagramContext),
            CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION => Some(Self::CloseWebTransportSession),
            _ => None,
        }
    }

    /// Wire value of this type.
    pub fn as_u64(self) -> u64 {
        match self {
            Self::Datagram => CAPSULE_TYPE_DATAGRAM,
            Self::RegisterDatagramContext => CAPSULE_TYPE_REGISTER_DATAGRAM_CONTEXT,
            Self::RegisterDatagramNoContext => CAPSULE_TYPE_REGISTER_DATAGRAM_NO_CONTEXT,
            Self::CloseDatagramContext => CAPSULE_TYPE_CLOSE_DATAGRAM_CONTEXT,
            Self::CloseWebTransportSession => CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION,
        }
    }
}

/// Encoded size of `value` as a variable-length integer.
pub fn varint_len(value: u64) -> Result<usize, CapsuleError> {
    match value {
        0..=0x3f => Ok(1),
        0x40..=0x3fff => Ok(2),
        0x4000..=0x3fff_ffff => Ok(4),
        0x4000_0000..=VARINT_MAX => Ok(8),
        _ => Err(CapsuleError::VarintOutOfRange(value)),
    }
}

/// Append `value` as a variable-length integer.
pub fn put_varint(buf: &mut BytesMut, value: u64) -> Result<(), CapsuleError> {
    match varint_len(value)? {
        1 => buf.put_u8(value as u8),
        2 => buf.put_u16(0x4000 | value as u16),
        4 => buf.put_u32(0x8000_0000 | value as u32),
        _ => buf.put_u64(0xc000_0000_0000_0000 | value),
    }
    Ok(())
}

/// Decode a variable-length integer from the front of `bytes`.
///
/// Returns the value and its encoded size, or `None` if `bytes` is too short.
pub fn get_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let first = *bytes.first()?;
    let len = 1usize << (first >> 6);
    if bytes.len() < len {
        return None;
    }
    let mut value = u64::from(first & 0x3f);
    for byte in &bytes[1..len] {
        value = (value << 8) | u64::from(*byte);
    }
    Some((value, len))
}

/// A single capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capsule {
    /// Raw capsule type.
    pub capsule_type: u64,
    /// Capsule value.
    pub data: Bytes,
}

impl Capsule {
    /// Create a capsule.
    pub fn new(capsule_type: u64, data: impl Into<Bytes>) -> Self {
        Self {
            capsule_type,
            data: data.into(),
        }
    }

    /// DATAGRAM capsule carrying `datagram` without a context identifier.
    pub fn datagram(datagram: Datagram) -> Self {
        Self::new(CAPSULE_TYPE_DATAGRAM, datagram.into_bytes())
    }

    /// CLOSE_WEBTRANSPORT_SESSION capsule.
    ///
    /// Value: 32-bit error code followed by the UTF-8 reason.
    pub fn close(info: &CloseInfo) -> Result<Self, CapsuleError> {
        if info.reason.len() > MAX_CLOSE_REASON_LEN {
            return Err(CapsuleError::InvalidClose("reason too long"));
        }
        let mut data = BytesMut::with_capacity(4 + info.reason.len());
        data.put_u32(info.code);
        data.put_slice(info.reason.as_bytes());
        Ok(Self::new(CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION, data.freeze()))
    }

    /// Known type of this capsule, if any.
    pub fn kind(&self) -> Option<CapsuleType> {
        CapsuleType::from_u64(self.capsule_type)
    }

    /// Parse the value of a CLOSE_WEBTRANSPORT_SESSION capsule.
    pub fn parse_close(&self) -> Result<CloseInfo, CapsuleError> {
        let mut data = self.data.clone();
        if data.len() < 4 {
            return Err(CapsuleError::InvalidClose("missing error code"));
        }
        let code = data.get_u32();
        if data.len() > MAX_CLOSE_REASON_LEN {
            return Err(CapsuleError::InvalidClose("reason too long"));
        }
        let reason = std::str::from_utf8(&data)
            .map_err(|_| CapsuleError::InvalidClose("reason is not UTF-8"))?;
        Ok(CloseInfo::new(code, reason))
    }

    /// Size of the encoded capsule.
    pub fn encoded_len(&self) -> Result<usize, CapsuleError> {
        Ok(varint_len(self.capsule_type)? + varint_len(self.data.len() as u64)? + self.data.len())
    }

    /// Append the encoded capsule to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), CapsuleError> {
        buf.reserve(self.encoded_len()?);
        put_varint(buf, self.capsule_type)?;
        put_varint(buf, self.data.len() as u64)?;
        buf.put_slice(&self.data);
        Ok(())
    }

    /// Encode the capsule.
    pub fn encode(&self) -> Result<Bytes, CapsuleError> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Streaming capsule decoder.
///
/// Bytes may arrive in arbitrary chunks; [`decode_next`](Self::decode_next)
/// yields each capsule once it is complete. An incomplete capsule is only an
/// error after [`finish`](Self::finish) marks the end of the stream.
#[derive(Debug)]
pub struct CapsuleDecoder {
    buf: BytesMut,
    finished: bool,
    max_capsule_size: usize,
}

impl Default for CapsuleDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapsuleDecoder {
    /// Create a decoder with the default capsule size limit.
    pub fn new() -> Self {
        Self::with_max_capsule_size(DEFAULT_MAX_CAPSULE_SIZE)
    }

    /// Create a decoder rejecting capsules with values above `max`.
    pub fn with_max_capsule_size(max: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            finished: false,
            max_capsule_size: max,
        }
    }

    /// Append received bytes.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), CapsuleError> {
        if self.finished {
            return Err(CapsuleError::AppendAfterFinish);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Mark the end of the stream.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Check if the end of the stream was marked.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of buffered, not yet decoded bytes.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Buffer to read stream bytes into directly.
    pub(crate) fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Decode the next complete capsule, if any.
    pub fn decode_next(&mut self) -> Result<Option<Capsule>, CapsuleError> {
        let Some((capsule_type, type_len)) = get_varint(&self.buf) else {
            return self.incomplete();
        };
        let Some((length, length_len)) = get_varint(&self.buf[type_len..]) else {
            return self.incomplete();
        };
        if length > self.max_capsule_size as u64 {
            return Err(CapsuleError::TooLarge {
                length,
                max: self.max_capsule_size,
            });
        }

        let header_len = type_len + length_len;
        let length = length as usize;
        if self.buf.len() < header_len + length {
            return self.incomplete();
        }

        self.buf.advance(header_len);
        let data = self.buf.split_to(length).freeze();
        Ok(Some(Capsule { capsule_type, data }))
    }

    fn incomplete(&self) -> Result<Option<Capsule>, CapsuleError> {
        if self.finished && !self.buf.is_empty() {
            return Err(CapsuleError::Truncated {
                remaining: self.buf.len(),
            });
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capsule_encoding() {
        let capsule = Capsule::new(0x12345, Bytes::from_static(b"abcde"));
        let bytes = capsule.encode().unwrap();
        assert_eq!(&bytes[..], b"\x80\x01\x23\x45\x05abcde");

        let mut decoder = CapsuleDecoder::new();
        decoder.append(&bytes).unwrap();
        assert_eq!(decoder.decode_next().unwrap(), Some(capsule));
    }

    #[test]
    fn test_small_capsule() {
        let capsule = Capsule::new(0, Bytes::new());
        assert_eq!(&capsule.encode().unwrap()[..], b"\x00\x00");
    }

    #[test]
    fn test_capsule_append_in_pieces() {
        let mut decoder = CapsuleDecoder::new();
        decoder.append(b"\x80").unwrap();
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.append(b"\x01\x23").unwrap();
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.append(b"\x45\x05abcd").unwrap();
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.append(b"e\x00").unwrap();
        let first = decoder.decode_next().unwrap().unwrap();
        assert_eq!(first.capsule_type, 0x12345);
        assert_eq!(&first.data[..], b"abcde");
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.append(b"\x00").unwrap();
        let second = decoder.decode_next().unwrap().unwrap();
        assert_eq!(second.capsule_type, 0);
        assert!(second.data.is_empty());
    }

    #[test]
    fn test_multiple_capsules_in_one_chunk() {
        let mut decoder = CapsuleDecoder::new();
        decoder.append(b"\x01\x02ab\x03\x04cdef").unwrap();

        let first = decoder.decode_next().unwrap().unwrap();
        let second = decoder.decode_next().unwrap().unwrap();
        assert_eq!((first.capsule_type, &first.data[..]), (1, &b"ab"[..]));
        assert_eq!((second.capsule_type, &second.data[..]), (3, &b"cdef"[..]));
        assert_eq!(decoder.decode_next().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_finish_after_complete_capsule() {
        let mut decoder = CapsuleDecoder::new();
        decoder.append(b"\x01").unwrap();
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.append(b"\x01a").unwrap();
        decoder.finish();
        let capsule = decoder.decode_next().unwrap().unwrap();
        assert_eq!((capsule.capsule_type, &capsule.data[..]), (1, &b"a"[..]));
        assert_eq!(decoder.decode_next().unwrap(), None);
        assert_eq!(decoder.append(b"x"), Err(CapsuleError::AppendAfterFinish));
    }

    #[test]
    fn test_finish_with_partial_capsule() {
        let mut decoder = CapsuleDecoder::new();
        decoder.append(b"\x01").unwrap();
        assert_eq!(decoder.decode_next().unwrap(), None);

        decoder.finish();
        assert_eq!(
            decoder.decode_next(),
            Err(CapsuleError::Truncated { remaining: 1 })
        );
    }

    #[test]
    fn test_oversized_capsule_rejected() {
        let mut decoder = CapsuleDecoder::with_max_capsule_size(4);
        decoder.append(b"\x01\x05").unwrap();
        assert_eq!(
            decoder.decode_next(),
            Err(CapsuleError::TooLarge { length: 5, max: 4 })
        );
    }

    #[test]
    fn test_varint_boundaries() {
        for (value, len) in [
            (0u64, 1usize),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            ((1 << 30) - 1, 4),
            (1 << 30, 8),
            (VARINT_MAX, 8),
        ] {
            let mut buf = BytesMut::new();
            put_varint(&mut buf, value).unwrap();
            assert_eq!(buf.len(), len, "value {value}");
            assert_eq!(get_varint(&buf), Some((value, len)), "value {value}");
        }

        let mut buf = BytesMut::new();
        assert_eq!(
            put_varint(&mut buf, VARINT_MAX + 1),
            Err(CapsuleError::VarintOutOfRange(VARINT_MAX + 1))
        );
        assert_eq!(get_varint(&[0x40]), None);
    }

    #[test]
    fn test_close_capsule() {
        let info = CloseInfo::new(0x0102_0304, "going away");
        let capsule = Capsule::close(&info).unwrap();
        assert_eq!(capsule.kind(), Some(CapsuleType::CloseWebTransportSession));
        assert_eq!(&capsule.data[..4], &[1, 2, 3, 4]);
        assert_eq!(capsule.parse_close().unwrap(), info);

        let too_long = CloseInfo::new(0, "x".repeat(MAX_CLOSE_REASON_LEN + 1));
        assert!(Capsule::close(&too_long).is_err());

        let short = Capsule::new(CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION, Bytes::from_static(b"\x00"));
        assert_eq!(
            short.parse_close(),
            Err(CapsuleError::InvalidClose("missing error code"))
        );

        let bad_utf8 = Capsule::new(
            CAPSULE_TYPE_CLOSE_WEBTRANSPORT_SESSION,
            Bytes::from_static(b"\x00\x00\x00\x01\xff"),
        );
        assert!(bad_utf8.parse_close().is_err());
    }

    #[test]
    fn test_capsule_types() {
        for kind in [
            CapsuleType::Datagram,
            CapsuleType::RegisterDatagramContext,
            CapsuleType::RegisterDatagramNoContext,
            CapsuleType::CloseDatagramContext,
            CapsuleType::CloseWebTransportSession,
        ] {
            assert_eq!(CapsuleType::from_u64(kind.as_u64()), Some(kind));
        }
        assert_eq!(CapsuleType::from_u64(0x12345), None);
        assert_eq!(
            Capsule::datagram(Datagram::from("x")).kind(),
            Some(CapsuleType::Datagram)
        );
    }
}
