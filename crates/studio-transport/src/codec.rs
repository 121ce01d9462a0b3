//! Length-prefixed JSON framing for bridge envelopes.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use studio_ipc::Message;

use crate::MAX_FRAME_BYTES;

/// Errors raised while framing envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// IO error on the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound message does not serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame exceeds [`MAX_FRAME_BYTES`].
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    FrameTooLarge(usize),
}

/// Frames [`Message`] envelopes as a u32 big-endian length prefix followed
/// by the JSON body.
///
/// A well-framed body that is not a valid envelope is fatal to that frame
/// only: the decoder consumes it, logs, and moves on to the next frame, so
/// one garbage envelope never tears the channel down. Errors are reserved
/// for conditions that leave the byte stream unusable (IO failures, a frame
/// over the size cap).
#[derive(Debug, Default)]
pub struct EnvelopeCodec;

impl Decoder for EnvelopeCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            if src.len() < 4 {
                return Ok(None);
            }

            let mut prefix = [0u8; 4];
            prefix.copy_from_slice(&src[..4]);
            let length = u32::from_be_bytes(prefix) as usize;

            if length > MAX_FRAME_BYTES {
                return Err(CodecError::FrameTooLarge(length));
            }

            if src.len() < 4 + length {
                src.reserve(4 + length - src.len());
                return Ok(None);
            }

            src.advance(4);
            let body = src.split_to(length);
            match serde_json::from_slice(&body) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    // Framing stays aligned; try the next frame.
                    warn!(error = %e, "Skipping undecodable frame");
                }
            }
        }
    }
}

impl Encoder<Message> for EnvelopeCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let body = serde_json::to_vec(&item)?;
        if body.len() > MAX_FRAME_BYTES {
            return Err(CodecError::FrameTooLarge(body.len()));
        }

        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use studio_ipc::Request;

    #[test]
    fn test_encode_decode_round_trip() {
        let mut codec = EnvelopeCodec;
        let mut buffer = BytesMut::new();

        let message = Message::Request(Request::new(1, "ScenesService", "getScenes", vec![]));
        codec.encode(message.clone(), &mut buffer).unwrap();

        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_frame_yields_nothing() {
        let mut codec = EnvelopeCodec;
        let mut buffer = BytesMut::new();

        let message = Message::Request(Request::new(7, "AudioService", "getInputs", vec![]));
        codec.encode(message, &mut buffer).unwrap();

        // Withhold the final byte.
        let last = buffer.split_off(buffer.len() - 1);
        let mut partial = buffer;
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&last);
        assert!(codec.decode(&mut partial).unwrap().is_some());
    }

    #[test]
    fn test_oversized_prefix_is_rejected() {
        let mut codec = EnvelopeCodec;
        let mut buffer = BytesMut::new();
        buffer.put_u32((MAX_FRAME_BYTES + 1) as u32);

        assert!(matches!(
            codec.decode(&mut buffer),
            Err(CodecError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_undecodable_body_is_skipped() {
        let mut codec = EnvelopeCodec;
        let mut buffer = BytesMut::new();
        buffer.put_u32(4);
        buffer.extend_from_slice(b"nope");

        // The bad frame is consumed without erroring.
        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert!(buffer.is_empty());

        // A good frame behind a bad one decodes in the same call.
        buffer.put_u32(4);
        buffer.extend_from_slice(b"nope");
        let message = Message::Request(Request::new(2, "ScenesService", "getSceneIds", vec![]));
        codec.encode(message.clone(), &mut buffer).unwrap();
        assert_eq!(codec.decode(&mut buffer).unwrap().unwrap(), message);
        assert!(buffer.is_empty());
    }
}
