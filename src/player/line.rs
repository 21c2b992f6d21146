use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::{
    config::BackendParams,
    domain::track::{NowPlaying, filename_stem},
    player::{PlayerBackend, PlayerError},
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6600;
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// MPD-style backend: one command per line, key-value replies terminated
/// by `OK` (or `ACK` on error). No persistent session; the connection is
/// dropped after each logical operation.
#[derive(Debug)]
pub struct LineSocketBackend {
    host: String,
    port: u16,
}

impl LineSocketBackend {
    pub fn from_params(params: &BackendParams) -> Self {
        Self {
            host: params.host.clone().unwrap_or_else(|| DEFAULT_HOST.into()),
            port: params.port.unwrap_or(DEFAULT_PORT),
        }
    }

    fn connect(&self) -> Result<BufReader<TcpStream>, PlayerError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| PlayerError::Protocol(format!("no address for {}", self.host)))?;

        let stream = TcpStream::connect_timeout(&addr, IO_TIMEOUT)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut reader = BufReader::new(stream);
        let mut greeting = String::new();
        reader.read_line(&mut greeting)?;
        if !greeting.starts_with("OK MPD") {
            return Err(PlayerError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        debug!("connected: {}", greeting.trim_end());

        Ok(reader)
    }

    /// Sends one command and reads its reply up to the `OK` terminator.
    fn command(
        reader: &mut BufReader<TcpStream>,
        command: &str,
    ) -> Result<Vec<(String, String)>, PlayerError> {
        reader.get_mut().write_all(command.as_bytes())?;
        reader.get_mut().write_all(b"\n")?;

        let mut pairs = Vec::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Err(PlayerError::Protocol(
                    "connection closed mid-reply".to_string(),
                ));
            }

            let line = line.trim_end();
            if line == "OK" {
                return Ok(pairs);
            }
            if line.starts_with("ACK") {
                return Err(PlayerError::Protocol(line.to_string()));
            }
            if let Some((key, value)) = line.split_once(": ") {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Double quotes and backslashes must be escaped inside a quoted argument.
fn escape_argument(path: &str) -> String {
    path.replace('\\', "\\\\").replace('"', "\\\"")
}

impl PlayerBackend for LineSocketBackend {
    fn name(&self) -> &'static str {
        "mpd"
    }

    fn queue(&mut self, path: &Path) -> Result<(), PlayerError> {
        let mut reader = self.connect()?;
        let command = format!("add \"{}\"", escape_argument(&path.to_string_lossy()));
        Self::command(&mut reader, &command)?;
        Ok(())
    }

    fn supports_now_playing(&self) -> bool {
        true
    }

    fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
        let mut reader = self.connect()?;

        let status = Self::command(&mut reader, "status")?;
        if lookup(&status, "state") != Some("play") {
            return Ok(None);
        }

        let song = Self::command(&mut reader, "currentsong")?;
        Ok(Some(NowPlaying {
            artist: lookup(&song, "Artist").map(str::to_string),
            title: lookup(&song, "Title").map(str::to_string),
            album: lookup(&song, "Album").map(str::to_string),
            filename: lookup(&song, "file").and_then(filename_stem),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader as StdBufReader};
    use std::net::TcpListener;
    use std::thread;

    /// Fake MPD peer: sends the greeting, then answers each incoming
    /// command line with the canned reply for it.
    fn spawn_peer(replies: Vec<(&'static str, &'static str)>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = StdBufReader::new(stream.try_clone().unwrap());
            let mut stream = stream;

            stream.write_all(b"OK MPD 0.23.0\n").unwrap();

            for (expected, reply) in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    return;
                }
                assert_eq!(line.trim_end(), expected);
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });

        port
    }

    fn backend_for(port: u16) -> LineSocketBackend {
        LineSocketBackend {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[test]
    fn test_queue_sends_quoted_add() {
        let port = spawn_peer(vec![("add \"/music/song.mp3\"", "OK\n")]);

        let mut backend = backend_for(port);
        backend.queue(Path::new("/music/song.mp3")).unwrap();
    }

    #[test]
    fn test_queue_ack_is_protocol_error() {
        let port = spawn_peer(vec![(
            "add \"/music/song.mp3\"",
            "ACK [50@0] {add} No such directory\n",
        )]);

        let mut backend = backend_for(port);
        let err = backend.queue(Path::new("/music/song.mp3")).unwrap_err();
        assert!(matches!(err, PlayerError::Protocol(_)));
    }

    #[test]
    fn test_now_playing_while_stopped() {
        let port = spawn_peer(vec![("status", "volume: 100\nstate: stop\nOK\n")]);

        let mut backend = backend_for(port);
        assert!(backend.now_playing().unwrap().is_none());
    }

    #[test]
    fn test_now_playing_while_playing() {
        let port = spawn_peer(vec![
            ("status", "state: play\nsong: 2\nOK\n"),
            (
                "currentsong",
                "file: artist/song.mp3\nArtist: Artist\nTitle: Title\nAlbum: Album\nOK\n",
            ),
        ]);

        let mut backend = backend_for(port);
        let snapshot = backend.now_playing().unwrap().expect("playing");
        assert_eq!(snapshot.artist.as_deref(), Some("Artist"));
        assert_eq!(snapshot.title.as_deref(), Some("Title"));
        assert_eq!(snapshot.album.as_deref(), Some("Album"));
        assert_eq!(snapshot.filename.as_deref(), Some("song"));
    }

    #[test]
    fn test_escape_argument() {
        assert_eq!(
            escape_argument(r#"weird "name".mp3"#),
            r#"weird \"name\".mp3"#
        );
        assert_eq!(escape_argument(r"back\slash"), r"back\\slash");
    }
}
