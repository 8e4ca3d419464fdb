//! Protocol module - wire format, framing, and message decoding.
//!
//! This module implements the binary tracer protocol:
//! - 12-byte header and TLV encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Message parser yielding typed tracepoint lists and trace events

mod frame;
mod frame_buffer;
mod parser;
mod tlv;
mod wire_format;

pub use frame::{
    build_enable_request, build_frame, build_list_request, encode_name_list, Frame,
};
pub use frame_buffer::FrameBuffer;
pub use parser::{decode_body, parse_stream, DecodedMessage, MessageStream, TraceEvent};
pub use tlv::{
    decode_timestamp, decode_tlv, decode_tlv_bytes, encode_tlv, encode_tlv_into, tlv_len,
};
pub use wire_format::{
    decode_header, encode_header, peek_body_length, Command, Header, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_TRACER_PORT, HEADER_SIZE, MAGIC, MAX_TLV_LEN, MAX_TRACEPOINT_NAME_LEN,
    TIMESTAMP_SIZE, TLV_LENGTH_SIZE,
};
