//! The primitives message and its wire framing.
//!
//! One message carries the concatenated outbound share vector of every
//! running operation for one privacy-peer pair and one round. On the wire it
//! is a 4-byte big-endian length, the ASCII tag `SSPP_MSG`, and the
//! serialized message body; all peers must agree on this layout.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{PrimitivesError, Result};

/// The tag which precedes every primitives message on the wire.
pub const MESSAGE_TAG: &[u8; 8] = b"SSPP_MSG";

/// A round's batched share payload between two privacy peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrimitivesMessage {
    /// The ID of the sender.
    pub sender_id: String,
    /// The 0-based index of the sender.
    pub sender_index: usize,
    /// The concatenated outbound shares of all running operations, in
    /// operation-id order with sub-operations in pre-order.
    pub operations_data: Vec<u64>,
}

impl PrimitivesMessage {
    /// Creates a message from one peer's pooled outbound shares.
    pub fn new(sender_id: impl Into<String>, sender_index: usize, operations_data: Vec<u64>) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender_index,
            operations_data,
        }
    }

    /// Serializes the message into a framed byte vector.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)
            .map_err(|e| PrimitivesError::primitives(format!("message encoding failed: {e}")))?;
        let mut frame = Vec::with_capacity(4 + MESSAGE_TAG.len() + body.len());
        frame
            .write_u32::<BigEndian>((MESSAGE_TAG.len() + body.len()) as u32)
            .expect("write to vec cannot fail");
        frame.extend_from_slice(MESSAGE_TAG);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Parses a framed byte vector back into a message.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut reader = frame;
        let len = reader
            .read_u32::<BigEndian>()
            .map_err(|_| PrimitivesError::primitives("message frame too short"))?
            as usize;
        if reader.len() != len || len < MESSAGE_TAG.len() {
            return Err(PrimitivesError::primitives(format!(
                "message length mismatch (header {len}, body {})",
                reader.len()
            )));
        }
        let (tag, body) = reader.split_at(MESSAGE_TAG.len());
        if tag != MESSAGE_TAG {
            return Err(PrimitivesError::primitives(format!(
                "unexpected message tag {:?}",
                String::from_utf8_lossy(tag)
            )));
        }
        bincode::deserialize(body)
            .map_err(|e| PrimitivesError::primitives(format!("message decoding failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let msg = PrimitivesMessage::new("pp01", 1, vec![0, 7, u64::MAX, 42]);
        let frame = msg.encode().unwrap();
        assert_eq!(&frame[4..12], MESSAGE_TAG);
        assert_eq!(PrimitivesMessage::decode(&frame).unwrap(), msg);
    }

    #[test]
    fn rejects_wrong_tag() {
        let msg = PrimitivesMessage::new("pp01", 1, vec![1]);
        let mut frame = msg.encode().unwrap();
        frame[4] = b'X';
        assert!(PrimitivesMessage::decode(&frame).is_err());
    }

    #[test]
    fn rejects_truncated_frame() {
        let msg = PrimitivesMessage::new("pp01", 1, vec![1, 2, 3]);
        let frame = msg.encode().unwrap();
        assert!(PrimitivesMessage::decode(&frame[..frame.len() - 2]).is_err());
        assert!(PrimitivesMessage::decode(&frame[..3]).is_err());
    }
}
