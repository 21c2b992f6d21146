use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use ureq::Agent;

use crate::{
    config::BackendParams,
    domain::track::{NowPlaying, filename_stem},
    player::{PlayerBackend, PlayerError},
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

/// VLC web-interface backend: authenticated GETs against the JSON status
/// endpoint, with queueing done through the `in_enqueue` command.
#[derive(Debug)]
pub struct HttpPollingBackend {
    base: String,
    password: Option<String>,
    agent: Agent,
}

impl HttpPollingBackend {
    pub fn from_params(params: &BackendParams) -> Self {
        let host = params.host.clone().unwrap_or_else(|| DEFAULT_HOST.into());
        let port = params.port.unwrap_or(DEFAULT_PORT);

        Self {
            base: format!("http://{host}:{port}"),
            password: params.password.clone(),
            agent: build_agent(HTTP_TIMEOUT),
        }
    }

    fn fetch_status(&self, command: Option<(&str, &str)>) -> Result<VlcStatusRaw, PlayerError> {
        let mut url = format!("{}/requests/status.json", self.base);
        if let Some((command, input)) = command {
            url.push_str(&format!(
                "?command={command}&input={}",
                percent_encode(input)
            ));
        }

        let mut request = self.agent.get(&url);
        if let Some(password) = &self.password {
            // VLC uses basic auth with an empty username.
            let token = STANDARD.encode(format!(":{password}"));
            request = request.header("Authorization", &format!("Basic {token}"));
        }

        // Non-2xx and transport errors (timeouts included) are both
        // connection failures here; only a 2xx body gets shape-checked.
        let mut response = request
            .call()
            .map_err(|e| PlayerError::Connection(std::io::Error::other(e)))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PlayerError::Connection(std::io::Error::other(e)))?;

        parse_status(&body)
    }
}

pub fn build_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn parse_status(body: &str) -> Result<VlcStatusRaw, PlayerError> {
    serde_json::from_str(body)
        .map_err(|e| PlayerError::Protocol(format!("malformed status document: {e}")))
}

fn snapshot_from_status(status: VlcStatusRaw) -> Result<Option<NowPlaying>, PlayerError> {
    if status.state != "playing" {
        return Ok(None);
    }

    let meta = status
        .information
        .and_then(|info| info.category.get("meta").cloned())
        .map(serde_json::from_value::<VlcMetaRaw>)
        .transpose()
        .map_err(|e| PlayerError::Protocol(format!("malformed meta category: {e}")))?
        .unwrap_or_default();

    Ok(Some(NowPlaying {
        artist: meta.artist,
        title: meta.title,
        album: meta.album,
        filename: meta.filename.as_deref().and_then(filename_stem),
    }))
}

#[derive(Debug, Deserialize)]
struct VlcStatusRaw {
    state: String,
    #[serde(default)]
    information: Option<VlcInformationRaw>,
}

#[derive(Debug, Deserialize)]
struct VlcInformationRaw {
    #[serde(default)]
    category: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct VlcMetaRaw {
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    filename: Option<String>,
}

pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

impl PlayerBackend for HttpPollingBackend {
    fn name(&self) -> &'static str {
        "vlc"
    }

    fn queue(&mut self, path: &Path) -> Result<(), PlayerError> {
        self.fetch_status(Some(("in_enqueue", &path.to_string_lossy())))?;
        Ok(())
    }

    fn supports_now_playing(&self) -> bool {
        true
    }

    fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
        let status = self.fetch_status(None)?;
        snapshot_from_status(status)
    }
}
