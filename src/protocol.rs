//! Frame formats for the fetch protocol.
//!
//! Two fixed binary frames, both big-endian: a request naming a file and a
//! response carrying either the file's bytes or a not-found status. Encoding
//! and validation only - no I/O happens here.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Identifies frames as belonging to this protocol.
pub const MAGIC: u16 = 0x497E;

/// Mode byte of a request frame.
pub const MODE_REQUEST: u8 = 1;

/// Mode byte of a response frame.
pub const MODE_RESPONSE: u8 = 2;

/// Minimum encoded filename length in bytes.
pub const FILENAME_MIN: usize = 1;

/// Maximum encoded filename length in bytes.
pub const FILENAME_MAX: usize = 1024;

/// Codec-level failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("filename must encode to {FILENAME_MIN}..={FILENAME_MAX} bytes, got {0}")]
    InvalidFilenameSize(usize),

    #[error("invalid {kind} header: {reason}")]
    BadHeader {
        kind: &'static str,
        reason: String,
    },

    #[error("payload of {0} bytes does not fit the 32-bit length field")]
    PayloadTooLarge(usize),
}

fn bad_header(kind: &'static str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::BadHeader {
        kind,
        reason: reason.into(),
    }
}

// =============================================================================
// Request
// =============================================================================

/// A validated file request.
///
/// Wire format: `magic:u16 | mode:u8 | filename_len:u16 | filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    filename: String,
}

impl Request {
    /// Validates the encoded filename length up front, so a bad name fails
    /// before any connection is made.
    pub fn new(filename: impl Into<String>) -> Result<Self, ProtocolError> {
        let filename = filename.into();
        let len = filename.len();
        if !(FILENAME_MIN..=FILENAME_MAX).contains(&len) {
            return Err(ProtocolError::InvalidFilenameSize(len));
        }
        Ok(Self { filename })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn encode(&self) -> Bytes {
        let name = self.filename.as_bytes();
        let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + name.len());
        buf.put_u16(MAGIC);
        buf.put_u8(MODE_REQUEST);
        buf.put_u16(name.len() as u16);
        buf.put_slice(name);
        buf.freeze()
    }
}

/// Decoded fixed portion of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub filename_len: u16,
}

impl RequestHeader {
    pub const SIZE: usize = 5;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::SIZE {
            return Err(bad_header(
                "request",
                format!("expected {} bytes, got {}", Self::SIZE, buf.len()),
            ));
        }
        let mut buf = buf;
        let magic = buf.get_u16();
        if magic != MAGIC {
            return Err(bad_header("request", format!("bad magic 0x{magic:04X}")));
        }
        let mode = buf.get_u8();
        if mode != MODE_REQUEST {
            return Err(bad_header("request", format!("bad mode {mode}")));
        }
        let filename_len = buf.get_u16();
        // Inclusive on both ends; both bounds must hold.
        if !(FILENAME_MIN..=FILENAME_MAX).contains(&(filename_len as usize)) {
            return Err(bad_header(
                "request",
                format!("filename length {filename_len} out of range"),
            ));
        }
        Ok(Self { filename_len })
    }
}

// =============================================================================
// Response
// =============================================================================

/// Response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    NotFound = 0,
    Found = 1,
}

impl Status {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::NotFound),
            1 => Some(Self::Found),
            _ => None,
        }
    }
}

/// A response frame: the file's bytes, or nothing.
///
/// Wire format: `magic:u16 | mode:u8 | status:u8 | data_len:u32 | data`.
/// A not-found response carries a zero `data_len` and no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Option<Bytes>,
}

impl Response {
    pub fn found(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: Some(payload.into()),
        }
    }

    pub fn not_found() -> Self {
        Self { payload: None }
    }

    pub fn status(&self) -> Status {
        match self.payload {
            Some(_) => Status::Found,
            None => Status::NotFound,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let data = self.payload.as_deref().unwrap_or(&[]);
        let data_len =
            u32::try_from(data.len()).map_err(|_| ProtocolError::PayloadTooLarge(data.len()))?;

        let mut buf = BytesMut::with_capacity(ResponseHeader::SIZE + data.len());
        buf.put_u16(MAGIC);
        buf.put_u8(MODE_RESPONSE);
        buf.put_u8(self.status() as u8);
        buf.put_u32(data_len);
        buf.put_slice(data);
        Ok(buf.freeze())
    }
}

/// Decoded fixed portion of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: Status,
    pub data_len: u32,
}

impl ResponseHeader {
    pub const SIZE: usize = 8;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < Self::SIZE {
            return Err(bad_header(
                "response",
                format!("expected {} bytes, got {}", Self::SIZE, buf.len()),
            ));
        }
        let mut buf = buf;
        let magic = buf.get_u16();
        if magic != MAGIC {
            return Err(bad_header("response", format!("bad magic 0x{magic:04X}")));
        }
        let mode = buf.get_u8();
        if mode != MODE_RESPONSE {
            return Err(bad_header("response", format!("bad mode {mode}")));
        }
        let status = buf.get_u8();
        let status = Status::from_u8(status)
            .ok_or_else(|| bad_header("response", format!("bad status {status}")))?;
        let data_len = buf.get_u32();
        Ok(Self { status, data_len })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_encode_layout() {
        let req = Request::new("greeting.txt").unwrap();
        let encoded = req.encode();

        assert_eq!(&encoded[..2], &[0x49, 0x7E]);
        assert_eq!(encoded[2], MODE_REQUEST);
        assert_eq!(&encoded[3..5], &12u16.to_be_bytes());
        assert_eq!(&encoded[5..], b"greeting.txt");
    }

    #[test]
    fn request_header_roundtrip() {
        let req = Request::new("greeting.txt").unwrap();
        let encoded = req.encode();
        let header = RequestHeader::decode(&encoded[..RequestHeader::SIZE]).unwrap();
        assert_eq!(header.filename_len, 12);
    }

    #[test]
    fn filename_length_boundaries() {
        assert_eq!(
            Request::new(""),
            Err(ProtocolError::InvalidFilenameSize(0))
        );
        assert!(Request::new("a").is_ok());
        assert!(Request::new("b".repeat(1024)).is_ok());
        assert_eq!(
            Request::new("c".repeat(1025)),
            Err(ProtocolError::InvalidFilenameSize(1025))
        );
    }

    #[test]
    fn request_header_rejects_bad_magic() {
        let mut buf = Request::new("a").unwrap().encode().to_vec();
        buf[0] = 0xFF;
        assert!(matches!(
            RequestHeader::decode(&buf),
            Err(ProtocolError::BadHeader { kind: "request", .. })
        ));
    }

    #[test]
    fn request_header_rejects_bad_mode() {
        let mut buf = Request::new("a").unwrap().encode().to_vec();
        buf[2] = MODE_RESPONSE;
        assert!(RequestHeader::decode(&buf).is_err());
    }

    #[test]
    fn request_header_rejects_out_of_range_length() {
        // 1025 does not fit the permitted range even though it fits a u16.
        let mut buf = BytesMut::new();
        buf.put_u16(MAGIC);
        buf.put_u8(MODE_REQUEST);
        buf.put_u16(1025);
        assert!(RequestHeader::decode(&buf).is_err());

        let mut buf = BytesMut::new();
        buf.put_u16(MAGIC);
        buf.put_u8(MODE_REQUEST);
        buf.put_u16(0);
        assert!(RequestHeader::decode(&buf).is_err());
    }

    #[test]
    fn response_found_layout() {
        // The worked example: "hello" comes back as 497E 02 01 00000005 + data.
        let resp = Response::found(Bytes::from_static(b"hello"));
        let encoded = resp.encode().unwrap();

        assert_eq!(
            &encoded[..ResponseHeader::SIZE],
            &[0x49, 0x7E, 0x02, 0x01, 0x00, 0x00, 0x00, 0x05]
        );
        assert_eq!(&encoded[ResponseHeader::SIZE..], b"hello");
    }

    #[test]
    fn response_not_found_has_no_payload() {
        let encoded = Response::not_found().encode().unwrap();
        assert_eq!(encoded.len(), ResponseHeader::SIZE);

        let header = ResponseHeader::decode(&encoded).unwrap();
        assert_eq!(header.status, Status::NotFound);
        assert_eq!(header.data_len, 0);
    }

    #[test]
    fn response_header_roundtrip() {
        let resp = Response::found(Bytes::from_static(b"hello"));
        let encoded = resp.encode().unwrap();
        let header = ResponseHeader::decode(&encoded).unwrap();
        assert_eq!(header.status, Status::Found);
        assert_eq!(header.data_len, 5);
    }

    #[test]
    fn response_header_rejects_bad_status() {
        let mut buf = BytesMut::new();
        buf.put_u16(MAGIC);
        buf.put_u8(MODE_RESPONSE);
        buf.put_u8(2);
        buf.put_u32(0);
        assert!(matches!(
            ResponseHeader::decode(&buf),
            Err(ProtocolError::BadHeader { kind: "response", .. })
        ));
    }

    #[test]
    fn response_header_rejects_request_mode() {
        let mut buf = BytesMut::new();
        buf.put_u16(MAGIC);
        buf.put_u8(MODE_REQUEST);
        buf.put_u8(1);
        buf.put_u32(0);
        assert!(ResponseHeader::decode(&buf).is_err());
    }

    #[test]
    fn short_header_is_rejected() {
        assert!(RequestHeader::decode(&[0x49, 0x7E, 0x01]).is_err());
        assert!(ResponseHeader::decode(&[0x49, 0x7E]).is_err());
    }
}
