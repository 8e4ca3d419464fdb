//! Message parser - turns frames into typed protocol messages.
//!
//! [`parse_stream`] walks a buffer holding zero or more back-to-back frames
//! and lazily yields [`DecodedMessage`]s. [`decode_body`] decodes the body of
//! a single frame and is shared with the reassembling session.
//!
//! A fault stops parsing: messages decoded before it are yielded first, then
//! the fault, then the iterator ends.
//!
//! # Example
//!
//! ```
//! use tracy_client::protocol::{build_frame, encode_tlv, parse_stream, Command, DecodedMessage};
//!
//! let body = encode_tlv(b"cpu_idle").unwrap();
//! let bytes = build_frame(Command::TracepointListReply, &body).unwrap();
//!
//! let messages: Vec<_> = parse_stream(bytes).collect();
//! assert_eq!(
//!     messages,
//!     vec![Ok(DecodedMessage::TracepointsDiscovered(vec!["cpu_idle".to_string()]))]
//! );
//! ```

use std::collections::VecDeque;

use bytes::Bytes;

use super::tlv::{decode_timestamp, decode_tlv, decode_tlv_bytes};
use super::wire_format::{peek_body_length, Command, Header, HEADER_SIZE};
use crate::error::ParseFault;

/// A single trace event pushed by the tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Name of the tracepoint that fired.
    pub tracepoint: Bytes,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Opaque payload.
    pub payload: Bytes,
}

impl TraceEvent {
    /// Create a new event.
    pub fn new(tracepoint: impl Into<Bytes>, timestamp_ns: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            tracepoint: tracepoint.into(),
            timestamp_ns,
            payload: payload.into(),
        }
    }

    /// Tracepoint name as text (lossy for non-ASCII bytes).
    pub fn tracepoint_name(&self) -> String {
        String::from_utf8_lossy(&self.tracepoint).into_owned()
    }
}

/// A message decoded from an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    /// Names carried by one TRACEPOINT_LIST_REPLY frame.
    TracepointsDiscovered(Vec<String>),
    /// One event of a TRACE_PUSH frame.
    TraceEvent(TraceEvent),
}

/// Decode the body of one frame, appending messages to `out`.
///
/// A TRACE_PUSH body yields one message per event; a LIST_REPLY body yields
/// one `TracepointsDiscovered` (possibly empty). On a fault, messages
/// decoded before it are already in `out`.
pub fn decode_body(
    header: &Header,
    body: &Bytes,
    out: &mut Vec<DecodedMessage>,
) -> Result<(), ParseFault> {
    match header.command {
        Command::TracePush => decode_trace_push(body, out),
        Command::TracepointListReply => decode_tracepoint_list(body, out),
        other => Err(ParseFault::UnsupportedCommand(other.code())),
    }
}

fn decode_trace_push(body: &Bytes, out: &mut Vec<DecodedMessage>) -> Result<(), ParseFault> {
    let mut offset = 0;
    while offset < body.len() {
        let (tracepoint, next) = decode_tlv_bytes(body, offset)?;
        let (timestamp_ns, next) = decode_timestamp(body, next)?;
        let (payload, next) = decode_tlv_bytes(body, next)?;
        offset = next;

        out.push(DecodedMessage::TraceEvent(TraceEvent {
            tracepoint,
            timestamp_ns,
            payload,
        }));
    }
    Ok(())
}

fn decode_tracepoint_list(body: &[u8], out: &mut Vec<DecodedMessage>) -> Result<(), ParseFault> {
    let mut names = Vec::new();
    let mut offset = 0;
    let mut result = Ok(());

    while offset < body.len() {
        match decode_tlv(body, offset) {
            Ok((name, next)) => {
                names.push(String::from_utf8_lossy(name).into_owned());
                offset = next;
            }
            Err(fault) => {
                result = Err(fault);
                break;
            }
        }
    }

    if result.is_ok() || !names.is_empty() {
        out.push(DecodedMessage::TracepointsDiscovered(names));
    }
    result
}

/// Parse a buffer of back-to-back frames.
///
/// Each call is independent; nothing is carried over between calls, so the
/// buffer must hold whole frames.
pub fn parse_stream(buf: impl Into<Bytes>) -> MessageStream {
    MessageStream {
        buf: buf.into(),
        offset: 0,
        pending: VecDeque::new(),
        fault: None,
        done: false,
    }
}

/// Lazy iterator over the messages of a buffer. See [`parse_stream`].
#[derive(Debug)]
pub struct MessageStream {
    buf: Bytes,
    offset: usize,
    pending: VecDeque<DecodedMessage>,
    fault: Option<ParseFault>,
    done: bool,
}

impl MessageStream {
    /// Offset of the first byte not yet parsed.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Decode the frame at the current offset into `pending`.
    fn advance_frame(&mut self) -> Result<(), ParseFault> {
        let remaining = &self.buf[self.offset..];

        // Validate against this frame's extent, not the whole tail, so that
        // back-to-back frames pass the length check.
        let announced = peek_body_length(remaining)
            .map(|len| HEADER_SIZE as u64 + len as u64)
            .unwrap_or(remaining.len() as u64);
        let extent = remaining.len().min(usize::try_from(announced).unwrap_or(usize::MAX));

        let header = Header::decode(remaining, extent)?;

        let body_start = self.offset + HEADER_SIZE;
        let body_end = self.offset + extent;
        let body = self.buf.slice(body_start..body_end);
        self.offset = body_end;

        let mut messages = Vec::new();
        let result = decode_body(&header, &body, &mut messages);
        self.pending.extend(messages);
        result
    }
}

impl Iterator for MessageStream {
    type Item = Result<DecodedMessage, ParseFault>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(Ok(message));
            }
            if let Some(fault) = self.fault.take() {
                self.done = true;
                return Some(Err(fault));
            }
            if self.done || self.offset >= self.buf.len() {
                self.done = true;
                return None;
            }
            if let Err(fault) = self.advance_frame() {
                self.fault = Some(fault);
            }
        }
    }
}

impl std::iter::FusedIterator for MessageStream {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, encode_tlv};

    fn list_reply(names: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        for name in names {
            body.extend(encode_tlv(name.as_bytes()).unwrap());
        }
        build_frame(Command::TracepointListReply, &body).unwrap()
    }

    fn event_body(name: &str, timestamp: u64, payload: &[u8]) -> Vec<u8> {
        let mut body = encode_tlv(name.as_bytes()).unwrap();
        body.extend_from_slice(&timestamp.to_be_bytes());
        body.extend(encode_tlv(payload).unwrap());
        body
    }

    fn trace_push(events: &[(&str, u64, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, ts, payload) in events {
            body.extend(event_body(name, *ts, payload));
        }
        build_frame(Command::TracePush, &body).unwrap()
    }

    fn discovered(names: &[&str]) -> DecodedMessage {
        DecodedMessage::TracepointsDiscovered(names.iter().map(|n| n.to_string()).collect())
    }

    fn event(name: &'static str, ts: u64, payload: &'static [u8]) -> DecodedMessage {
        DecodedMessage::TraceEvent(TraceEvent::new(name.as_bytes(), ts, payload))
    }

    #[test]
    fn test_list_reply_then_trace_push() {
        let mut buf = list_reply(&["cpu_idle"]);
        buf.extend(trace_push(&[("cpu_idle", 1_000_000_000, &[0x01, 0x02])]));

        let messages: Vec<_> = parse_stream(buf).collect();
        assert_eq!(
            messages,
            vec![
                Ok(discovered(&["cpu_idle"])),
                Ok(event("cpu_idle", 1_000_000_000, &[0x01, 0x02])),
            ]
        );
    }

    #[test]
    fn test_k_frames_yield_k_frames_messages() {
        for k in 0..6u64 {
            let mut buf = Vec::new();
            for i in 0..k {
                buf.extend(trace_push(&[("tp", i, b"x")]));
            }

            let messages: Vec<_> = parse_stream(buf).map(Result::unwrap).collect();
            assert_eq!(messages.len(), k as usize);
            for (i, message) in messages.iter().enumerate() {
                assert_eq!(*message, event("tp", i as u64, b"x"));
            }
        }
    }

    #[test]
    fn test_multiple_events_in_one_frame_keep_order() {
        let buf = trace_push(&[("a", 1, b"1"), ("b", 2, b""), ("c", 3, b"333")]);

        let messages: Vec<_> = parse_stream(buf).map(Result::unwrap).collect();
        assert_eq!(
            messages,
            vec![event("a", 1, b"1"), event("b", 2, b""), event("c", 3, b"333")]
        );
    }

    #[test]
    fn test_corrupted_magic_stops_parsing_but_keeps_earlier_frames() {
        let mut buf = trace_push(&[("first", 1, b"")]);
        let mut bad = trace_push(&[("second", 2, b"")]);
        bad[0] = b'r';
        buf.extend(bad);
        buf.extend(trace_push(&[("third", 3, b"")]));

        let messages: Vec<_> = parse_stream(buf).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Ok(event("first", 1, b"")));
        assert!(matches!(messages[1], Err(ParseFault::InvalidMagic(_))));
    }

    #[test]
    fn test_truncated_trailing_frame_is_length_mismatch() {
        let mut buf = list_reply(&["a"]);
        let second = list_reply(&["bb"]);
        buf.extend_from_slice(&second[..second.len() - 1]);

        let messages: Vec<_> = parse_stream(buf).collect();
        assert_eq!(messages[0], Ok(discovered(&["a"])));
        assert!(matches!(
            messages[1],
            Err(ParseFault::LengthMismatch { .. })
        ));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_unsupported_command_stops_parsing() {
        let mut buf = build_frame(Command::TracepointEnableRequest, b"").unwrap();
        buf.extend(list_reply(&["a"]));

        let messages: Vec<_> = parse_stream(buf).collect();
        assert_eq!(messages, vec![Err(ParseFault::UnsupportedCommand(3))]);
    }

    #[test]
    fn test_event_overshooting_body_is_fault() {
        // Body length claims fewer bytes than the event needs.
        let mut body = event_body("ok", 1, b"");
        body.extend(event_body("overshoot", 2, b"payload"));
        body.truncate(body.len() - 3);
        let mut buf = build_frame(Command::TracePush, &body).unwrap();
        buf.extend(trace_push(&[("never", 3, b"")]));

        let messages: Vec<_> = parse_stream(buf).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Ok(event("ok", 1, b"")));
        assert!(matches!(
            messages[1],
            Err(ParseFault::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn test_empty_list_reply_still_discovers() {
        let messages: Vec<_> = parse_stream(list_reply(&[])).collect();
        assert_eq!(messages, vec![Ok(discovered(&[]))]);
    }

    #[test]
    fn test_empty_trace_push_yields_nothing() {
        let messages: Vec<_> = parse_stream(trace_push(&[])).collect();
        assert!(messages.is_empty());
    }

    #[test]
    fn test_empty_buffer() {
        let mut stream = parse_stream(Vec::new());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_short_header_is_truncated() {
        let messages: Vec<_> = parse_stream(vec![b'R', b'u', b'S']).collect();
        assert_eq!(
            messages,
            vec![Err(ParseFault::TruncatedBuffer {
                needed: 12,
                available: 3
            })]
        );
    }

    #[test]
    fn test_stream_is_fused_after_fault() {
        let mut buf = list_reply(&["a"]);
        buf[0] = 0;
        let mut stream = parse_stream(buf);

        assert!(matches!(stream.next(), Some(Err(_))));
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_parse_is_restartable() {
        let buf = Bytes::from(list_reply(&["a", "b"]));

        let first: Vec<_> = parse_stream(buf.clone()).collect();
        let second: Vec<_> = parse_stream(buf).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_offset_advances_per_frame() {
        let first = list_reply(&["a"]);
        let mut buf = first.clone();
        buf.extend(list_reply(&["b"]));

        let mut stream = parse_stream(buf);
        stream.next();
        assert_eq!(stream.offset(), first.len());
    }

    #[test]
    fn test_decode_body_rejects_outbound_command() {
        let header = Header::new(Command::TracepointListRequest, 0);
        let mut out = Vec::new();
        assert_eq!(
            decode_body(&header, &Bytes::new(), &mut out),
            Err(ParseFault::UnsupportedCommand(1))
        );
    }

    #[test]
    fn test_partial_list_reply_is_delivered_before_fault() {
        let header = Header::new(Command::TracepointListReply, 6);
        let body = Bytes::from_static(&[0, 1, b'a', 0, 9, b'b']);
        let mut out = Vec::new();

        let result = decode_body(&header, &body, &mut out);
        assert!(result.is_err());
        assert_eq!(out, vec![discovered(&["a"])]);
    }

    #[test]
    fn test_event_payload_shares_buffer() {
        let buf = Bytes::from(trace_push(&[("tp", 9, b"payload")]));
        let message = parse_stream(buf.clone()).next().unwrap().unwrap();

        let DecodedMessage::TraceEvent(event) = message else {
            panic!("expected trace event");
        };
        assert_eq!(event.tracepoint_name(), "tp");
        let start = buf.len() - 7;
        assert_eq!(event.payload.as_ptr(), buf[start..].as_ptr());
    }
}
