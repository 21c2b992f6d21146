use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::{
    config::BackendParams,
    domain::track::{NowPlaying, filename_stem},
    player::{
        PlayerBackend, PlayerError,
        protocol::{self, FramedMessage, kind},
    },
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5500;
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Clementine-style backend: a length-prefixed binary protocol over TCP.
///
/// One fresh connection per call; the connect handshake (carrying the
/// auth code) is issued before any functional request, then the expected
/// responses are drained and the connection dropped.
#[derive(Debug)]
pub struct FramedSocketBackend {
    host: String,
    port: u16,
    auth_code: Option<String>,
}

impl FramedSocketBackend {
    pub fn from_params(params: &BackendParams) -> Self {
        Self {
            host: params.host.clone().unwrap_or_else(|| DEFAULT_HOST.into()),
            port: params.port.unwrap_or(DEFAULT_PORT),
            auth_code: params.auth_code.clone(),
        }
    }

    fn connect(&self) -> Result<TcpStream, PlayerError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| PlayerError::Protocol(format!("no address for {}", self.host)))?;

        let stream = TcpStream::connect_timeout(&addr, IO_TIMEOUT)?;
        // A dead peer that never closes must not hang the exchange.
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(stream)
    }

    fn handshake(&self) -> FramedMessage {
        FramedMessage::ConnectRequest {
            auth_code: self.auth_code.clone(),
        }
    }
}

fn find_reply(replies: &[FramedMessage], kind: u32, what: &str) -> Result<FramedMessage, PlayerError> {
    replies
        .iter()
        .find(|m| m.kind() == kind)
        .cloned()
        .ok_or_else(|| PlayerError::Protocol(format!("peer never sent {what}")))
}

impl PlayerBackend for FramedSocketBackend {
    fn name(&self) -> &'static str {
        "clementine"
    }

    fn queue(&mut self, path: &Path) -> Result<(), PlayerError> {
        let mut stream = self.connect()?;

        let requests = [
            self.handshake(),
            FramedMessage::EnqueueRequest {
                path: path.to_string_lossy().into_owned(),
            },
        ];
        let replies = protocol::exchange(
            &mut stream,
            &requests,
            &[kind::CONNECT_RESPONSE, kind::ENQUEUE_RESPONSE],
        )?;

        match find_reply(&replies, kind::ENQUEUE_RESPONSE, "an enqueue confirmation")? {
            FramedMessage::EnqueueResponse { accepted: true } => Ok(()),
            _ => Err(PlayerError::Protocol("peer refused the enqueue".into())),
        }
    }

    fn supports_now_playing(&self) -> bool {
        true
    }

    fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
        let mut stream = self.connect()?;

        // The peer announces the current track as part of the connect
        // exchange; no dedicated query message exists.
        let requests = [self.handshake()];
        let replies = protocol::exchange(
            &mut stream,
            &requests,
            &[kind::CONNECT_RESPONSE, kind::CURRENT_TRACK],
        )?;

        if let FramedMessage::ConnectResponse { server } =
            find_reply(&replies, kind::CONNECT_RESPONSE, "a connect response")?
        {
            debug!("connected to {server}");
        }

        match find_reply(&replies, kind::CURRENT_TRACK, "the current track")? {
            FramedMessage::CurrentTrack {
                artist,
                title,
                album,
                file,
            } => {
                let snapshot = NowPlaying {
                    artist,
                    title,
                    album,
                    filename: file.as_deref().and_then(filename_stem),
                };
                // All-empty metadata is the peer's way of saying that
                // nothing is playing.
                Ok(Some(snapshot).filter(|s| !s.is_empty()))
            }
            _ => unreachable!("find_reply returned the wrong kind"),
        }
    }
}
