//! Length-prefixed wire framing and payload (de)serialization.
//!
//! Every payload crosses the wire as a 4-byte big-endian length prefix
//! followed by the serde_json encoding of the payload — no further envelope
//! or headers. The maximum frame length is enforced on decode so a corrupt
//! prefix cannot trigger an unbounded allocation.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FabricError;

/// Largest frame accepted off the wire (64 MiB). Image payloads are the
/// sizing driver; anything above this is treated as corruption.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Serializes a payload into its wire body.
pub fn encode<M: Serialize>(message: &M) -> Result<Bytes, FabricError> {
  Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// Deserializes a wire body back into a payload.
pub fn decode<M: DeserializeOwned>(payload: &Bytes) -> Result<M, FabricError> {
  Ok(serde_json::from_slice(payload)?)
}

/// Writes one length-prefixed frame and flushes the stream.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FabricError>
where
  W: AsyncWrite + Unpin,
{
  if payload.len() > MAX_FRAME_LEN {
    return Err(FabricError::FrameTooLarge(payload.len()));
  }
  writer.write_u32(payload.len() as u32).await?;
  writer.write_all(payload).await?;
  writer.flush().await?;
  Ok(())
}

/// Reads one length-prefixed frame.
///
/// # Errors
///
/// Returns `Io` on connection teardown or short reads, and `FrameTooLarge`
/// when the prefix exceeds [`MAX_FRAME_LEN`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes, FabricError>
where
  R: AsyncRead + Unpin,
{
  let len = reader.read_u32().await? as usize;
  if len > MAX_FRAME_LEN {
    return Err(FabricError::FrameTooLarge(len));
  }
  let mut payload = vec![0u8; len];
  reader.read_exact(&mut payload).await?;
  Ok(Bytes::from(payload))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_frame_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    write_frame(&mut client, b"hello fabric").await.expect("write");
    let payload = read_frame(&mut server).await.expect("read");
    assert_eq!(&payload[..], b"hello fabric");
  }

  #[tokio::test]
  async fn test_empty_frame_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(64);
    write_frame(&mut client, b"").await.expect("write");
    let payload = read_frame(&mut server).await.expect("read");
    assert!(payload.is_empty());
  }

  #[tokio::test]
  async fn test_oversized_prefix_is_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    // Hand-write a prefix claiming more than MAX_FRAME_LEN bytes.
    client.write_u32(u32::MAX).await.expect("write prefix");
    let result = read_frame(&mut server).await;
    assert!(matches!(result, Err(FabricError::FrameTooLarge(_))));
  }

  #[test]
  fn test_encode_decode_round_trip() {
    let encoded = encode(&vec!["a".to_string(), "b".to_string()]).expect("encode");
    let decoded: Vec<String> = decode(&encoded).expect("decode");
    assert_eq!(decoded, vec!["a".to_string(), "b".to_string()]);
  }
}
