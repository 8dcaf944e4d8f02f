//! Record and counter encoding.
//!
//! Records are `[version][bincode(record)]`. Decoding dispatches on the
//! leading version byte so records written by older builds stay readable
//! once the schema grows.

use crate::types::{FileRecord, Node};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Current record schema version
pub const CODEC_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty record")]
    Empty,
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("counter is {0} bytes wide, at most 8 supported")]
    CounterTooWide(usize),
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(record).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(CODEC_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (version, body) = bytes.split_first().ok_or(CodecError::Empty)?;
    match *version {
        CODEC_VERSION => {
            bincode::deserialize(body).map_err(|e| CodecError::Malformed(e.to_string()))
        }
        other => Err(CodecError::UnsupportedVersion(other)),
    }
}

pub fn encode_node(node: &Node) -> Result<Vec<u8>, CodecError> {
    encode(node)
}

pub fn decode_node(bytes: &[u8]) -> Result<Node, CodecError> {
    decode(bytes)
}

pub fn encode_file(file: &FileRecord) -> Result<Vec<u8>, CodecError> {
    encode(file)
}

pub fn decode_file(bytes: &[u8]) -> Result<FileRecord, CodecError> {
    decode(bytes)
}

/// Counters are stored big-endian without leading zero bytes
pub fn encode_counter(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

pub fn decode_counter(bytes: &[u8]) -> Result<u64, CodecError> {
    if bytes.len() > 8 {
        return Err(CodecError::CounterTooWide(bytes.len()));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use num_bigint::BigUint;

    fn sample_node() -> Node {
        Node {
            size: BigUint::from(1000u32),
            free: BigUint::from(250u32),
            index: 7,
            fping: 3,
            last_failure: Some(1_700_000_000),
            role: Role::Banned,
            api_addr: b"10.0.0.1:8080".to_vec(),
            rpc_addr: b"10.0.0.1:9090".to_vec(),
            contact: b"@provider".to_vec(),
            owner: vec![0xAB; 20],
        }
    }

    #[test]
    fn test_node_record_roundtrip() {
        let node = sample_node();
        let bytes = encode_node(&node).unwrap();
        assert_eq!(bytes[0], CODEC_VERSION);
        assert_eq!(decode_node(&bytes).unwrap(), node);
    }

    #[test]
    fn test_empty_fields_and_wide_integers_roundtrip() {
        let huge = BigUint::from_bytes_be(&[0xff; 64]);
        let node = Node {
            size: huge.clone(),
            free: huge,
            index: u64::MAX,
            fping: u64::MAX,
            last_failure: Some(u64::MAX),
            role: Role::Normal,
            api_addr: Vec::new(),
            rpc_addr: Vec::new(),
            contact: Vec::new(),
            owner: Vec::new(),
        };
        assert_eq!(decode_node(&encode_node(&node).unwrap()).unwrap(), node);

        let file = FileRecord {
            size: BigUint::from(u128::MAX),
            replicas: vec![Vec::new(), b"n2".to_vec()],
        };
        assert_eq!(decode_file(&encode_file(&file).unwrap()).unwrap(), file);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = encode_node(&sample_node()).unwrap();
        bytes[0] = 9;
        assert_eq!(decode_node(&bytes), Err(CodecError::UnsupportedVersion(9)));
        assert_eq!(decode_file(&[]), Err(CodecError::Empty));
    }

    #[test]
    fn test_truncated_record_is_malformed() {
        let bytes = encode_node(&sample_node()).unwrap();
        assert!(matches!(
            decode_node(&bytes[..bytes.len() / 2]),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_counter_encoding() {
        assert_eq!(encode_counter(0), Vec::<u8>::new());
        assert_eq!(encode_counter(1), vec![1]);
        assert_eq!(encode_counter(0x0102), vec![1, 2]);
        for value in [0, 1, 255, 256, 65_537, u64::MAX] {
            assert_eq!(decode_counter(&encode_counter(value)).unwrap(), value);
        }
        assert_eq!(decode_counter(&[1; 9]), Err(CodecError::CounterTooWide(9)));
    }
}
