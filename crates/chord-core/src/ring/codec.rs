//! Tagged-union wire codec (spec.md §4.2, C2).
//!
//! Grounded on the teacher's `vl1/endpoint.rs` `Endpoint::marshal`/
//! `unmarshal`: a hand-rolled cursor-based encoder/decoder pair over a flat
//! byte buffer, used instead of serde+bincode because the wire format is a
//! small fixed tagged union, not a general serialization surface. The
//! length-prefix framing (`u64` big-endian byte count) and the one-byte
//! message tag come from `original_source/src/chord_impl.c`'s
//! `pack_chord_message`.

use super::node_descriptor::NodeDescriptor;
use super::protocol::*;
use crate::error::{ChordError, Result};
use std::net::Ipv4Addr;

/// One fully-decoded datagram: protocol version, RPC correlation id, and
/// the message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub version: u16,
    pub correlation_id: u64,
    pub body: Message,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Notify {
        predecessor: NodeDescriptor,
    },
    GetPredecessorRequest,
    GetPredecessorResponse {
        predecessor: Option<NodeDescriptor>,
    },
    GetSuccessorListRequest,
    GetSuccessorListResponse {
        successors: Vec<NodeDescriptor>,
    },
    StartFindSuccessorRequest {
        id: u64,
    },
    StartFindSuccessorResponse {
        successor: NodeDescriptor,
    },
    CheckPredecessorRequest,
    CheckPredecessorResponse,
}

impl Message {
    fn tag(&self) -> u8 {
        match self {
            Message::Notify { .. } => TAG_NOTIFY,
            Message::GetPredecessorRequest => TAG_GET_PREDECESSOR_REQUEST,
            Message::GetPredecessorResponse { .. } => TAG_GET_PREDECESSOR_RESPONSE,
            Message::GetSuccessorListRequest => TAG_GET_SUCCESSOR_LIST_REQUEST,
            Message::GetSuccessorListResponse { .. } => TAG_GET_SUCCESSOR_LIST_RESPONSE,
            Message::StartFindSuccessorRequest { .. } => TAG_START_FIND_SUCCESSOR_REQUEST,
            Message::StartFindSuccessorResponse { .. } => TAG_START_FIND_SUCCESSOR_RESPONSE,
            Message::CheckPredecessorRequest => TAG_CHECK_PREDECESSOR_REQUEST,
            Message::CheckPredecessorResponse => TAG_CHECK_PREDECESSOR_RESPONSE,
        }
    }
}

fn write_descriptor(buf: &mut Vec<u8>, nd: &NodeDescriptor) {
    buf.extend_from_slice(&nd.id.to_be_bytes());
    buf.extend_from_slice(&nd.ip.octets());
    buf.extend_from_slice(&nd.port.to_be_bytes());
}

fn read_descriptor(buf: &[u8], cursor: &mut usize) -> Result<NodeDescriptor> {
    if buf.len() < *cursor + 14 {
        return Err(ChordError::MalformedFrame);
    }
    let id = u64::from_be_bytes(buf[*cursor..*cursor + 8].try_into().unwrap());
    let ip = Ipv4Addr::new(
        buf[*cursor + 8],
        buf[*cursor + 9],
        buf[*cursor + 10],
        buf[*cursor + 11],
    );
    let port = u16::from_be_bytes(buf[*cursor + 12..*cursor + 14].try_into().unwrap());
    *cursor += 14;
    Ok(NodeDescriptor { id, ip, port })
}

impl Frame {
    pub fn new(correlation_id: u64, body: Message) -> Self {
        Self {
            version: VERSION,
            correlation_id,
            body,
        }
    }

    /// Encodes this frame as a length-prefixed datagram: `u64` big-endian
    /// byte count of everything that follows, then version, correlation id,
    /// tag, and body.
    pub fn marshal(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(32);
        payload.extend_from_slice(&self.version.to_be_bytes());
        payload.extend_from_slice(&self.correlation_id.to_be_bytes());
        payload.push(self.body.tag());

        match &self.body {
            Message::Notify { predecessor } => write_descriptor(&mut payload, predecessor),
            Message::GetPredecessorRequest => {}
            Message::GetPredecessorResponse { predecessor } => {
                payload.push(predecessor.is_some() as u8);
                if let Some(nd) = predecessor {
                    write_descriptor(&mut payload, nd);
                }
            }
            Message::GetSuccessorListRequest => {}
            Message::GetSuccessorListResponse { successors } => {
                payload.push(successors.len() as u8);
                for nd in successors {
                    write_descriptor(&mut payload, nd);
                }
            }
            Message::StartFindSuccessorRequest { id } => {
                payload.extend_from_slice(&id.to_be_bytes());
            }
            Message::StartFindSuccessorResponse { successor } => {
                write_descriptor(&mut payload, successor)
            }
            Message::CheckPredecessorRequest => {}
            Message::CheckPredecessorResponse => {}
        }

        let mut framed = Vec::with_capacity(8 + payload.len());
        framed.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        framed.extend_from_slice(&payload);
        framed
    }

    /// Decodes a complete length-prefixed datagram as received off the
    /// socket. `raw` must be exactly one datagram; UDP never delivers
    /// partial ones.
    pub fn unmarshal(raw: &[u8]) -> Result<Frame> {
        if raw.len() < 8 {
            return Err(ChordError::MalformedFrame);
        }
        let declared_len = u64::from_be_bytes(raw[0..8].try_into().unwrap()) as usize;
        let payload = &raw[8..];
        if payload.len() != declared_len {
            return Err(ChordError::MalformedFrame);
        }

        let mut cursor = 0usize;
        if payload.len() < 11 {
            return Err(ChordError::MalformedFrame);
        }
        let version = u16::from_be_bytes(payload[0..2].try_into().unwrap());
        let correlation_id = u64::from_be_bytes(payload[2..10].try_into().unwrap());
        let tag = payload[10];
        cursor += 11;

        let body = match tag {
            TAG_NOTIFY => Message::Notify {
                predecessor: read_descriptor(payload, &mut cursor)?,
            },
            TAG_GET_PREDECESSOR_REQUEST => Message::GetPredecessorRequest,
            TAG_GET_PREDECESSOR_RESPONSE => {
                if payload.len() < cursor + 1 {
                    return Err(ChordError::MalformedFrame);
                }
                let present = payload[cursor] != 0;
                cursor += 1;
                let predecessor = if present {
                    Some(read_descriptor(payload, &mut cursor)?)
                } else {
                    None
                };
                Message::GetPredecessorResponse { predecessor }
            }
            TAG_GET_SUCCESSOR_LIST_REQUEST => Message::GetSuccessorListRequest,
            TAG_GET_SUCCESSOR_LIST_RESPONSE => {
                if payload.len() < cursor + 1 {
                    return Err(ChordError::MalformedFrame);
                }
                let count = payload[cursor] as usize;
                cursor += 1;
                if count > MAX_SUCCESSOR_LIST_LEN {
                    return Err(ChordError::MalformedFrame);
                }
                let mut successors = Vec::with_capacity(count);
                for _ in 0..count {
                    successors.push(read_descriptor(payload, &mut cursor)?);
                }
                Message::GetSuccessorListResponse { successors }
            }
            TAG_START_FIND_SUCCESSOR_REQUEST => {
                if payload.len() < cursor + 8 {
                    return Err(ChordError::MalformedFrame);
                }
                let id = u64::from_be_bytes(payload[cursor..cursor + 8].try_into().unwrap());
                Message::StartFindSuccessorRequest { id }
            }
            TAG_START_FIND_SUCCESSOR_RESPONSE => Message::StartFindSuccessorResponse {
                successor: read_descriptor(payload, &mut cursor)?,
            },
            TAG_CHECK_PREDECESSOR_REQUEST => Message::CheckPredecessorRequest,
            TAG_CHECK_PREDECESSOR_RESPONSE => Message::CheckPredecessorResponse,
            _ => return Err(ChordError::MalformedFrame),
        };

        Ok(Frame {
            version,
            correlation_id,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nd(a: u8, b: u8, c: u8, d: u8, port: u16) -> NodeDescriptor {
        NodeDescriptor::new(Ipv4Addr::new(a, b, c, d), port)
    }

    fn round_trip(msg: Message) {
        let frame = Frame::new(42, msg.clone());
        let raw = frame.marshal();
        let decoded = Frame::unmarshal(&raw).expect("decode should succeed");
        assert_eq!(decoded.version, VERSION);
        assert_eq!(decoded.correlation_id, 42);
        assert_eq!(decoded.body, msg);
    }

    #[test]
    fn round_trips_every_message_kind() {
        round_trip(Message::Notify {
            predecessor: nd(10, 0, 0, 1, 9000),
        });
        round_trip(Message::GetPredecessorRequest);
        round_trip(Message::GetPredecessorResponse { predecessor: None });
        round_trip(Message::GetPredecessorResponse {
            predecessor: Some(nd(10, 0, 0, 2, 9001)),
        });
        round_trip(Message::GetSuccessorListRequest);
        round_trip(Message::GetSuccessorListResponse {
            successors: vec![nd(10, 0, 0, 3, 9002), nd(10, 0, 0, 4, 9003)],
        });
        round_trip(Message::StartFindSuccessorRequest { id: 0xdead_beef });
        round_trip(Message::StartFindSuccessorResponse {
            successor: nd(10, 0, 0, 5, 9004),
        });
        round_trip(Message::CheckPredecessorRequest);
        round_trip(Message::CheckPredecessorResponse);
    }

    #[test]
    fn rejects_truncated_frame() {
        let raw = Frame::new(1, Message::GetPredecessorRequest).marshal();
        assert!(Frame::unmarshal(&raw[..raw.len() - 1]).is_err());
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut raw = Frame::new(1, Message::GetPredecessorRequest).marshal();
        let tag_idx = 8 + 2 + 8;
        raw[tag_idx] = 0xff;
        assert!(Frame::unmarshal(&raw).is_err());
    }

    #[test]
    fn rejects_bad_length_prefix() {
        let mut raw = Frame::new(1, Message::GetPredecessorRequest).marshal();
        raw[7] = raw[7].wrapping_add(1);
        assert!(Frame::unmarshal(&raw).is_err());
    }
}
