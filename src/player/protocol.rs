//! Message framing and correlation for the binary socket protocol.
//!
//! Wire format: 4-byte big-endian length prefix, then exactly that many
//! bytes of payload. A payload is `u32 version | u32 type | fields`,
//! strings as u32-length-prefixed UTF-8 and options as a presence byte.
//!
//! There are no request ids; correlation relies on the peer answering in
//! the order implied by the connect/query sequence. A connection must
//! therefore never carry two in-flight requests at once.

use std::io::{self, Read, Write};

use log::{debug, warn};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a sane frame; a prefix beyond this means framing is lost.
const MAX_FRAME_LEN: u32 = 1 << 20;

/// Payload bytes are assembled with bounded reads of at most this size.
const READ_CHUNK: usize = 4096;

pub mod kind {
    pub const CONNECT_REQUEST: u32 = 1;
    pub const CONNECT_RESPONSE: u32 = 2;
    pub const ENQUEUE_REQUEST: u32 = 3;
    pub const ENQUEUE_RESPONSE: u32 = 4;
    pub const CURRENT_TRACK: u32 = 5;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramedMessage {
    ConnectRequest {
        auth_code: Option<String>,
    },
    ConnectResponse {
        server: String,
    },
    EnqueueRequest {
        path: String,
    },
    EnqueueResponse {
        accepted: bool,
    },
    CurrentTrack {
        artist: Option<String>,
        title: Option<String>,
        album: Option<String>,
        file: Option<String>,
    },
}

#[derive(Debug, Error)]
#[error("malformed frame: {0}")]
pub struct DecodeError(String);

impl FramedMessage {
    pub fn kind(&self) -> u32 {
        match self {
            FramedMessage::ConnectRequest { .. } => kind::CONNECT_REQUEST,
            FramedMessage::ConnectResponse { .. } => kind::CONNECT_RESPONSE,
            FramedMessage::EnqueueRequest { .. } => kind::ENQUEUE_REQUEST,
            FramedMessage::EnqueueResponse { .. } => kind::ENQUEUE_RESPONSE,
            FramedMessage::CurrentTrack { .. } => kind::CURRENT_TRACK,
        }
    }

    /// Encodes the full payload, version stamp included.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        buf.extend_from_slice(&self.kind().to_be_bytes());

        match self {
            FramedMessage::ConnectRequest { auth_code } => {
                put_opt_str(&mut buf, auth_code.as_deref());
            }
            FramedMessage::ConnectResponse { server } => {
                put_str(&mut buf, server);
            }
            FramedMessage::EnqueueRequest { path } => {
                put_str(&mut buf, path);
            }
            FramedMessage::EnqueueResponse { accepted } => {
                buf.push(u8::from(*accepted));
            }
            FramedMessage::CurrentTrack {
                artist,
                title,
                album,
                file,
            } => {
                put_opt_str(&mut buf, artist.as_deref());
                put_opt_str(&mut buf, title.as_deref());
                put_opt_str(&mut buf, album.as_deref());
                put_opt_str(&mut buf, file.as_deref());
            }
        }

        buf
    }

    pub fn decode(payload: &[u8]) -> Result<FramedMessage, DecodeError> {
        let mut rest = payload;

        let version = take_u32(&mut rest)?;
        if version != PROTOCOL_VERSION {
            return Err(DecodeError(format!(
                "unsupported protocol version {version}"
            )));
        }

        let kind = take_u32(&mut rest)?;
        let message = match kind {
            kind::CONNECT_REQUEST => FramedMessage::ConnectRequest {
                auth_code: take_opt_str(&mut rest)?,
            },
            kind::CONNECT_RESPONSE => FramedMessage::ConnectResponse {
                server: take_str(&mut rest)?,
            },
            kind::ENQUEUE_REQUEST => FramedMessage::EnqueueRequest {
                path: take_str(&mut rest)?,
            },
            kind::ENQUEUE_RESPONSE => FramedMessage::EnqueueResponse {
                accepted: take_bool(&mut rest)?,
            },
            kind::CURRENT_TRACK => FramedMessage::CurrentTrack {
                artist: take_opt_str(&mut rest)?,
                title: take_opt_str(&mut rest)?,
                album: take_opt_str(&mut rest)?,
                file: take_opt_str(&mut rest)?,
            },
            other => return Err(DecodeError(format!("unknown message type {other}"))),
        };

        if !rest.is_empty() {
            return Err(DecodeError(format!(
                "{} trailing bytes after message of type {kind}",
                rest.len()
            )));
        }

        Ok(message)
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.push(1);
            put_str(buf, s);
        }
        None => buf.push(0),
    }
}

fn take_u32(rest: &mut &[u8]) -> Result<u32, DecodeError> {
    if rest.len() < 4 {
        return Err(DecodeError("truncated u32".into()));
    }
    let (head, tail) = rest.split_at(4);
    *rest = tail;
    Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
}

fn take_bool(rest: &mut &[u8]) -> Result<bool, DecodeError> {
    let Some((&first, tail)) = rest.split_first() else {
        return Err(DecodeError("truncated bool".into()));
    };
    *rest = tail;
    match first {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError(format!("invalid bool byte {other}"))),
    }
}

fn take_str(rest: &mut &[u8]) -> Result<String, DecodeError> {
    let len = take_u32(rest)? as usize;
    if rest.len() < len {
        return Err(DecodeError("truncated string".into()));
    }
    let (head, tail) = rest.split_at(len);
    *rest = tail;
    String::from_utf8(head.to_vec()).map_err(|e| DecodeError(format!("invalid UTF-8: {e}")))
}

fn take_opt_str(rest: &mut &[u8]) -> Result<Option<String>, DecodeError> {
    if take_bool(rest)? {
        Ok(Some(take_str(rest)?))
    } else {
        Ok(None)
    }
}

/// Writes one framed message. A write error is surfaced to the caller
/// (mapped to a connection failure upstream); there is no retry.
pub fn write_message<W: Write>(writer: &mut W, message: &FramedMessage) -> io::Result<()> {
    let payload = message.encode();
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    writer.write_all(&frame)?;
    writer.flush()
}

/// Reads one raw frame payload.
///
/// `Ok(None)` means the stream ended: either a clean close between frames
/// or the peer going away mid-message. The latter is logged but never
/// produces a fabricated message.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    let got = read_full(reader, &mut prefix)?;
    if got == 0 {
        return Ok(None);
    }
    if got < prefix.len() {
        debug!("peer closed inside a length prefix ({got}/4 bytes)");
        return Ok(None);
    }

    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_LEN {
        warn!("frame length {len} exceeds limit, treating stream as lost");
        return Ok(None);
    }

    let mut payload = vec![0u8; len as usize];
    let mut filled = 0;
    while filled < payload.len() {
        let cap = (payload.len() - filled).min(READ_CHUNK);
        let n = match reader.read(&mut payload[filled..filled + cap]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            warn!("peer closed mid-frame ({filled}/{len} payload bytes)");
            return Ok(None);
        }
        filled += n;
    }

    Ok(Some(payload))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = match reader.read(&mut buf[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Sends `requests`, then drains the stream until one message of each
/// type in `expected` has been collected.
///
/// Malformed payloads are logged and skipped; messages of unrequested
/// types are silently dropped. The loop stops as soon as the expected set
/// is complete, or earlier when the stream ends, so callers must check
/// the returned set for completeness.
pub fn exchange<S: Read + Write>(
    stream: &mut S,
    requests: &[FramedMessage],
    expected: &[u32],
) -> io::Result<Vec<FramedMessage>> {
    for request in requests {
        write_message(stream, request)?;
    }

    let mut remaining: Vec<u32> = expected.to_vec();
    let mut collected = Vec::with_capacity(expected.len());

    while !remaining.is_empty() {
        let Some(payload) = read_frame(stream)? else {
            break;
        };

        match FramedMessage::decode(&payload) {
            Ok(message) => {
                let kind = message.kind();
                if let Some(pos) = remaining.iter().position(|&want| want == kind) {
                    remaining.swap_remove(pos);
                    collected.push(message);
                } else {
                    debug!("dropping unsolicited frame of type {kind}");
                }
            }
            Err(e) => warn!("discarding malformed frame: {e}"),
        }
    }

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Socket stand-in: canned inbound bytes, captured outbound bytes,
    /// and a count of read calls for the minimal-reads property.
    struct FakeStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        reads: usize,
    }

    impl FakeStream {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
                reads: 0,
            }
        }

        fn unread_bytes(&self) -> u64 {
            self.input.get_ref().len() as u64 - self.input.position()
        }
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            self.input.read(buf)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame_bytes(message: &FramedMessage) -> Vec<u8> {
        let mut buf = Vec::new();
        write_message(&mut buf, message).unwrap();
        buf
    }

    fn current_track() -> FramedMessage {
        FramedMessage::CurrentTrack {
            artist: Some("Artist".to_string()),
            title: Some("Title".to_string()),
            album: None,
            file: Some("/music/song.mp3".to_string()),
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let messages = [
            FramedMessage::ConnectRequest {
                auth_code: Some("1234".to_string()),
            },
            FramedMessage::ConnectRequest { auth_code: None },
            FramedMessage::ConnectResponse {
                server: "player 1.4".to_string(),
            },
            FramedMessage::EnqueueRequest {
                path: "/music/song.mp3".to_string(),
            },
            FramedMessage::EnqueueResponse { accepted: true },
            current_track(),
        ];

        for message in messages {
            let decoded = FramedMessage::decode(&message.encode()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(FramedMessage::decode(&[]).is_err());

        // Unknown message type.
        let mut payload = Vec::new();
        payload.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        payload.extend_from_slice(&99u32.to_be_bytes());
        assert!(FramedMessage::decode(&payload).is_err());

        // Trailing bytes after a complete message.
        let mut payload = FramedMessage::EnqueueResponse { accepted: true }.encode();
        payload.push(0);
        assert!(FramedMessage::decode(&payload).is_err());
    }

    #[test]
    fn test_read_frame_clean_close() {
        let mut stream = FakeStream::new(Vec::new());
        assert!(read_frame(&mut stream).unwrap().is_none());
    }

    #[test]
    fn test_read_frame_truncated_payload() {
        // Prefix promises 100 bytes, only 10 arrive before the close.
        let mut input = 100u32.to_be_bytes().to_vec();
        input.extend_from_slice(&[7u8; 10]);

        let mut stream = FakeStream::new(input);
        assert!(read_frame(&mut stream).unwrap().is_none());
    }

    #[test]
    fn test_exchange_collects_expected_and_stops_early() {
        let mut input = Vec::new();
        input.extend(frame_bytes(&FramedMessage::ConnectResponse {
            server: "player".to_string(),
        }));
        input.extend(frame_bytes(&current_track()));
        // A frame past the point where the expected set is complete; the
        // loop must not read it.
        input.extend(frame_bytes(&FramedMessage::EnqueueResponse {
            accepted: true,
        }));

        let mut stream = FakeStream::new(input);
        let replies = exchange(
            &mut stream,
            &[FramedMessage::ConnectRequest { auth_code: None }],
            &[kind::CONNECT_RESPONSE, kind::CURRENT_TRACK],
        )
        .unwrap();

        assert_eq!(replies.len(), 2);
        assert!(replies.iter().any(|m| m.kind() == kind::CONNECT_RESPONSE));
        assert!(replies.iter().any(|m| m.kind() == kind::CURRENT_TRACK));
        assert!(stream.unread_bytes() > 0, "stopped reading once complete");

        // The request went out on the wire.
        assert!(!stream.output.is_empty());
    }

    #[test]
    fn test_exchange_drops_unsolicited_types() {
        let mut input = Vec::new();
        input.extend(frame_bytes(&current_track()));
        input.extend(frame_bytes(&FramedMessage::ConnectResponse {
            server: "player".to_string(),
        }));

        let mut stream = FakeStream::new(input);
        let replies = exchange(&mut stream, &[], &[kind::CONNECT_RESPONSE]).unwrap();

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind(), kind::CONNECT_RESPONSE);
    }

    #[test]
    fn test_exchange_skips_malformed_frame_and_continues() {
        let mut input = Vec::new();
        // A well-framed but undecodable payload.
        input.extend_from_slice(&3u32.to_be_bytes());
        input.extend_from_slice(&[0xff, 0xff, 0xff]);
        input.extend(frame_bytes(&FramedMessage::EnqueueResponse {
            accepted: true,
        }));

        let mut stream = FakeStream::new(input);
        let replies = exchange(&mut stream, &[], &[kind::ENQUEUE_RESPONSE]).unwrap();

        assert_eq!(
            replies,
            vec![FramedMessage::EnqueueResponse { accepted: true }]
        );
    }

    #[test]
    fn test_exchange_returns_partial_set_on_stream_end() {
        let input = frame_bytes(&FramedMessage::ConnectResponse {
            server: "player".to_string(),
        });

        let mut stream = FakeStream::new(input);
        let replies = exchange(
            &mut stream,
            &[],
            &[kind::CONNECT_RESPONSE, kind::CURRENT_TRACK],
        )
        .unwrap();

        // Only what arrived; the caller maps the gap to a protocol error.
        assert_eq!(replies.len(), 1);
    }

    #[test]
    fn test_exchange_reads_no_more_than_necessary() {
        let wanted = frame_bytes(&FramedMessage::EnqueueResponse { accepted: true });
        let mut input = wanted.clone();
        input.extend(frame_bytes(&current_track()));

        let mut stream = FakeStream::new(input);
        let _ = exchange(&mut stream, &[], &[kind::ENQUEUE_RESPONSE]).unwrap();

        // One read for the prefix, one for the payload of the single
        // wanted frame; nothing after it was touched.
        assert_eq!(stream.reads, 2);
    }
}
