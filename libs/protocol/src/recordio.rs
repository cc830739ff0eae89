//! RecordIO framing for the subscription stream.
//!
//! Every record is `<decimal length>\n<body>`, where the length counts the
//! body bytes. A single network read can hold part of a record, exactly one
//! record, or several records back to back, so the decoder buffers input and
//! only yields a record once the full body has arrived.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::DecodeError;

/// Largest record body the decoder accepts.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Longest length header we wait for before declaring it garbage.
const MAX_HEADER_LEN: usize = 20;

/// Incremental RecordIO decoder.
#[derive(Debug)]
pub struct RecordDecoder {
    buf: BytesMut,
    limit: usize,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordDecoder {
    /// Create a decoder with the default record size limit.
    pub fn new() -> Self {
        Self::with_limit(MAX_RECORD_SIZE)
    }

    /// Create a decoder with a custom record size limit.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes buffered but not yet returned as records.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete record body, if one is buffered.
    pub fn next_record(&mut self) -> Result<Option<Bytes>, DecodeError> {
        let Some(newline) = self.buf.iter().position(|b| *b == b'\n') else {
            if self.buf.len() > MAX_HEADER_LEN {
                return Err(DecodeError::InvalidLength(lossy_prefix(&self.buf)));
            }
            return Ok(None);
        };

        let header = &self.buf[..newline];
        if header.is_empty()
            || header.len() > MAX_HEADER_LEN
            || !header.iter().all(u8::is_ascii_digit)
        {
            return Err(DecodeError::InvalidLength(lossy_prefix(header)));
        }

        // All ASCII digits, so the only possible failure is overflow.
        let size: usize = std::str::from_utf8(header)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DecodeError::InvalidLength(lossy_prefix(header)))?;

        if size > self.limit {
            return Err(DecodeError::RecordTooLarge {
                size,
                limit: self.limit,
            });
        }

        if self.buf.len() < newline + 1 + size {
            return Ok(None);
        }

        self.buf.advance(newline + 1);
        Ok(Some(self.buf.split_to(size).freeze()))
    }
}

/// Frame a body as a single RecordIO record.
pub fn encode(body: &[u8]) -> Vec<u8> {
    let mut out = format!("{}\n", body.len()).into_bytes();
    out.extend_from_slice(body);
    out
}

fn lossy_prefix(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_HEADER_LEN);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn drain(decoder: &mut RecordDecoder) -> Vec<Bytes> {
        let mut records = Vec::new();
        while let Some(record) = decoder.next_record().unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn test_single_record() {
        let mut decoder = RecordDecoder::new();
        decoder.extend(b"20\n{\"type\":\"HEARTBEAT\"}");

        assert_eq!(drain(&mut decoder), vec![Bytes::from_static(b"{\"type\":\"HEARTBEAT\"}")]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_multiple_records_in_one_chunk() {
        let mut decoder = RecordDecoder::new();
        let mut chunk = encode(b"{\"type\":\"HEARTBEAT\"}");
        chunk.extend(encode(b"{\"type\":\"OFFERS\"}"));
        decoder.extend(&chunk);

        let records = drain(&mut decoder);
        assert_eq!(records.len(), 2);
        assert_eq!(&records[1][..], b"{\"type\":\"OFFERS\"}");
    }

    #[test]
    fn test_partial_record_waits_for_more_bytes() {
        let mut decoder = RecordDecoder::new();
        decoder.extend(b"20\n{\"type\":");
        assert!(decoder.next_record().unwrap().is_none());

        decoder.extend(b"\"HEARTBEAT\"}");
        assert!(decoder.next_record().unwrap().is_some());
    }

    #[test]
    fn test_partial_header_waits_for_more_bytes() {
        let mut decoder = RecordDecoder::new();
        decoder.extend(b"2");
        assert!(decoder.next_record().unwrap().is_none());

        decoder.extend(b"\n{}");
        assert_eq!(&decoder.next_record().unwrap().unwrap()[..], b"{}");
    }

    #[rstest]
    #[case::not_a_number(b"abc\n{}".as_slice())]
    #[case::empty_header(b"\n{}".as_slice())]
    #[case::signed(b"+2\n{}".as_slice())]
    #[case::no_newline(b"{\"type\":\"HEARTBEAT\",\"x\":1}".as_slice())]
    fn test_invalid_header(#[case] input: &[u8]) {
        let mut decoder = RecordDecoder::new();
        decoder.extend(input);
        assert!(matches!(
            decoder.next_record(),
            Err(DecodeError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_record_over_limit() {
        let mut decoder = RecordDecoder::with_limit(8);
        decoder.extend(b"9\n");
        assert!(matches!(
            decoder.next_record(),
            Err(DecodeError::RecordTooLarge { size: 9, limit: 8 })
        ));
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_records(
            bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
            chunk_size in 1usize..32,
        ) {
            let stream: Vec<u8> = bodies.iter().flat_map(|b| encode(b)).collect();

            let mut decoder = RecordDecoder::new();
            let mut records = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                decoder.extend(chunk);
                while let Some(record) = decoder.next_record().unwrap() {
                    records.push(record.to_vec());
                }
            }

            prop_assert_eq!(records, bodies);
            prop_assert_eq!(decoder.buffered(), 0);
        }
    }
}
