//! Length-prefixed framing for stream transports.
//!
//! Wire format:
//! ```text
//! +------------------+---------------------------+
//! | Length           | Serialized Msg            |
//! | 4 bytes (BE32)   | `Length` bytes            |
//! +------------------+---------------------------+
//! ```
//!
//! Datagram transports carry the serialized message bare, with no header.

use std::io::{self, Read};

#[cfg(feature = "pipelined")]
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::constants::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use crate::core::{FrameError, TransportResult};

/// Prefix `payload` with its big-endian length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parse a length header, rejecting lengths above `max`.
pub fn decode_header(header: [u8; FRAME_HEADER_SIZE], max: usize) -> Result<usize, FrameError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }
    Ok(len)
}

/// Strip the header from a complete frame held in memory.
pub fn split_frame(frame: &[u8]) -> Result<&[u8], FrameError> {
    let Some((header, rest)) = frame.split_first_chunk::<FRAME_HEADER_SIZE>() else {
        return Err(FrameError::Truncated {
            expected: FRAME_HEADER_SIZE,
            actual: frame.len(),
        });
    };
    let len = decode_header(*header, MAX_FRAME_SIZE)?;
    if rest.len() < len {
        return Err(FrameError::Truncated {
            expected: len,
            actual: rest.len(),
        });
    }
    Ok(&rest[..len])
}

/// Read exactly `buf.len()` bytes, reporting how far we got on EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> TransportResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FrameError::Truncated {
                    expected: buf.len(),
                    actual: filled,
                }
                .into());
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read one frame from a blocking reader and return its payload.
///
/// A peer that closes early yields [`FrameError::Truncated`], never an
/// empty payload.
pub fn read_frame<R: Read>(reader: &mut R, max: usize) -> TransportResult<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    read_full(reader, &mut header)?;
    let len = decode_header(header, max)?;

    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload)?;
    Ok(payload)
}

#[cfg(feature = "pipelined")]
async fn read_full_async<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> TransportResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(FrameError::Truncated {
                expected: buf.len(),
                actual: filled,
            }
            .into());
        }
        filled += n;
    }
    Ok(())
}

/// Read one frame from an async reader and return its payload.
#[cfg(feature = "pipelined")]
pub async fn read_frame_async<R: AsyncRead + Unpin>(
    reader: &mut R,
    max: usize,
) -> TransportResult<Vec<u8>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    read_full_async(reader, &mut header).await?;
    let len = decode_header(header, max)?;

    let mut payload = vec![0u8; len];
    read_full_async(reader, &mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::core::TransportError;
    use crate::message::{Event, Message};

    #[test]
    fn test_encode_frame_header() {
        let frame = encode_frame(&[0xAA; 300]).unwrap();
        assert_eq!(&frame[..4], &[0x00, 0x00, 0x01, 0x2C]);
        assert_eq!(frame.len(), 304);
    }

    #[test]
    fn test_message_through_frame() {
        let message = Message::event_batch([Event::new().with_service("disk").with_metric(0.93)]);
        let frame = encode_frame(&message.encode()).unwrap();
        let payload = split_frame(&frame).unwrap();
        assert_eq!(Message::decode(payload).unwrap(), message);
    }

    #[test]
    fn test_read_frame() {
        let mut stream = encode_frame(b"hello").unwrap();
        stream.extend_from_slice(&encode_frame(b"").unwrap());
        let mut cursor = Cursor::new(stream);

        assert_eq!(read_frame(&mut cursor, MAX_FRAME_SIZE).unwrap(), b"hello");
        assert!(read_frame(&mut cursor, MAX_FRAME_SIZE).unwrap().is_empty());
    }

    #[test]
    fn test_read_frame_short_payload() {
        let mut stream = 10u32.to_be_bytes().to_vec();
        stream.extend_from_slice(b"abc");
        let err = read_frame(&mut Cursor::new(stream), MAX_FRAME_SIZE).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Frame(FrameError::Truncated {
                expected: 10,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_read_frame_short_header() {
        let err = read_frame(&mut Cursor::new(vec![0u8, 1]), MAX_FRAME_SIZE).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Frame(FrameError::Truncated {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_read_frame_too_large() {
        let stream = 1024u32.to_be_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(stream), 512).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Frame(FrameError::TooLarge { len: 1024, max: 512 })
        ));
    }

    #[test]
    fn test_split_frame_truncated() {
        let frame = encode_frame(b"payload").unwrap();
        assert!(split_frame(&frame[..6]).is_err());
        assert!(split_frame(&frame[..2]).is_err());
    }

    #[cfg(feature = "pipelined")]
    #[tokio::test]
    async fn test_read_frame_async() {
        let mut stream = encode_frame(b"one").unwrap();
        stream.extend_from_slice(&encode_frame(b"two").unwrap());
        stream.extend_from_slice(&[0, 0, 0, 9, 1]);
        let mut reader = &stream[..];

        assert_eq!(read_frame_async(&mut reader, MAX_FRAME_SIZE).await.unwrap(), b"one");
        assert_eq!(read_frame_async(&mut reader, MAX_FRAME_SIZE).await.unwrap(), b"two");
        assert!(matches!(
            read_frame_async(&mut reader, MAX_FRAME_SIZE).await,
            Err(TransportError::Frame(FrameError::Truncated {
                expected: 9,
                actual: 1
            }))
        ));
    }
}
