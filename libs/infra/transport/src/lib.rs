//! Wire framing for the agent-coordinator control channel.
//!
//! One JSON document per frame, `{type, correlation_id?, payload}`.
//! Enforces the maximum frame size independent of whatever socket library
//! carries the bytes (axum WebSocket on the coordinator side, a plain
//! client on the agent side), so both ends agree on the limit.

use krakenhashes_models::ControlMessage;
use thiserror::Error;

/// Maximum frame size per §6: 512 KiB.
pub const MAX_FRAME_BYTES: usize = 512 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame exceeds maximum size of {max} bytes (got {actual})")]
    FrameTooLarge { max: usize, actual: usize },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),
}

/// Encodes a control message into a single JSON frame, rejecting payloads
/// that would exceed the maximum frame size before allocating further.
pub fn encode_frame(message: &ControlMessage) -> Result<Vec<u8>, TransportError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            max: MAX_FRAME_BYTES,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Decodes a single frame into a control message. Callers are responsible
/// for rejecting oversized frames at the transport layer before this is
/// reached (e.g. a WebSocket max-message-size config); this function still
/// checks defensively so the contract holds independent of the carrier.
pub fn decode_frame(bytes: &[u8]) -> Result<ControlMessage, TransportError> {
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            max: MAX_FRAME_BYTES,
            actual: bytes.len(),
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_models::MessagePayload;

    #[test]
    fn round_trips_a_message() {
        let message = ControlMessage::with_correlation(
            MessagePayload::FileSyncRequest {
                types: vec!["wordlist".into()],
            },
            "corr-9",
        );
        let frame = encode_frame(&message).unwrap();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.correlation_id.as_deref(), Some("corr-9"));
    }

    #[test]
    fn rejects_oversized_frame() {
        let oversized = vec![0u8; MAX_FRAME_BYTES + 1];
        let result = decode_frame(&oversized);
        assert!(matches!(result, Err(TransportError::FrameTooLarge { .. })));
    }
}
