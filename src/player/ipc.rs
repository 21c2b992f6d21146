//! Local IPC backend for a resident mpv instance, speaking its JSON IPC
//! protocol over a unix socket (one JSON object per line).

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};

use crate::{
    config::BackendParams,
    domain::track::{NowPlaying, filename_stem},
    player::{PlayerBackend, PlayerError},
};

const DEFAULT_SOCKET: &str = "/tmp/mpv.sock";
const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct LocalIpcBackend {
    socket_path: PathBuf,
}

impl LocalIpcBackend {
    pub fn from_params(params: &BackendParams) -> Self {
        Self {
            socket_path: params
                .socket
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET)),
        }
    }

    fn connect(&self) -> Result<BufReader<UnixStream>, PlayerError> {
        // An absent or refusing socket means the player isn't up.
        let stream =
            UnixStream::connect(&self.socket_path).map_err(|_| PlayerError::NotRunning)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(BufReader::new(stream))
    }

    /// Issues one command and returns its `data` field. Asynchronous
    /// event lines interleaved in the stream are skipped. A property
    /// that exists but currently has no value comes back as `Null`.
    fn command(reader: &mut BufReader<UnixStream>, args: &[Value]) -> Result<Value, PlayerError> {
        let request = json!({ "command": args });
        reader.get_mut().write_all(request.to_string().as_bytes())?;
        reader.get_mut().write_all(b"\n")?;

        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Err(PlayerError::Protocol(
                    "connection closed mid-reply".to_string(),
                ));
            }

            let reply: Value = serde_json::from_str(&line)
                .map_err(|e| PlayerError::Protocol(format!("malformed reply: {e}")))?;

            if reply.get("event").is_some() {
                continue;
            }

            let error = reply
                .get("error")
                .and_then(Value::as_str)
                .ok_or_else(|| PlayerError::Protocol("reply without error field".to_string()))?;

            return match error {
                "success" => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
                "property unavailable" => Ok(Value::Null),
                other => Err(PlayerError::Protocol(format!("command failed: {other}"))),
            };
        }
    }

    fn get_property(
        reader: &mut BufReader<UnixStream>,
        name: &str,
    ) -> Result<Value, PlayerError> {
        Self::command(reader, &[json!("get_property"), json!(name)])
    }
}

fn metadata_field(metadata: &Value, key: &str) -> Option<String> {
    let map = metadata.as_object()?;
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.as_str())
        .map(str::to_string)
}

impl PlayerBackend for LocalIpcBackend {
    fn name(&self) -> &'static str {
        "mpv"
    }

    fn queue(&mut self, path: &Path) -> Result<(), PlayerError> {
        let mut reader = self.connect()?;
        Self::command(
            &mut reader,
            &[
                json!("loadfile"),
                json!(path.to_string_lossy()),
                json!("append-play"),
            ],
        )?;
        Ok(())
    }

    fn supports_now_playing(&self) -> bool {
        true
    }

    fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
        let mut reader = self.connect()?;

        // The playback-state flags gate everything: no snapshot unless
        // the player is actually playing.
        let idle = Self::get_property(&mut reader, "idle-active")?;
        if idle.as_bool().unwrap_or(true) {
            return Ok(None);
        }
        let paused = Self::get_property(&mut reader, "pause")?;
        if paused.as_bool().unwrap_or(false) {
            return Ok(None);
        }

        let metadata = Self::get_property(&mut reader, "metadata")?;
        let path = Self::get_property(&mut reader, "path")?;

        Ok(Some(NowPlaying {
            artist: metadata_field(&metadata, "artist"),
            title: metadata_field(&metadata, "title"),
            album: metadata_field(&metadata, "album"),
            filename: path.as_str().and_then(filename_stem),
        }))
    }
}
