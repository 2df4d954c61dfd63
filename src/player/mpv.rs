use super::{Player, PlayerEvent, watch_url};
use crate::app::events::Event;
use anyhow::Context;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
    sync::mpsc,
};

/// Which video each mpv playlist entry holds.
///
/// mpv reports `start-file`/`end-file` with a `playlist_entry_id`, and a late
/// `end-file` can arrive after the next `loadfile` was sent, so events are
/// attributed by entry rather than by whatever was loaded last.
#[derive(Debug, Default)]
struct Entries {
    /// `loadfile` requests not yet bound to an entry, oldest first.
    pending: VecDeque<(u64, String)>,
    videos: HashMap<i64, String>,
    playing: Option<i64>,
}

type SharedEntries = Arc<Mutex<Entries>>;

impl Entries {
    fn queued(&mut self, request_id: u64, video_id: &str) {
        self.pending.push_back((request_id, video_id.to_string()));
    }

    fn cleared(&mut self) {
        self.pending.clear();
        self.videos.clear();
        self.playing = None;
    }

    fn bind(&mut self, entry: i64, request_id: Option<u64>) {
        if self.videos.contains_key(&entry) {
            return;
        }
        let pos = match request_id {
            Some(rid) => self.pending.iter().position(|(r, _)| *r == rid),
            None => (!self.pending.is_empty()).then_some(0),
        };
        if let Some((_, video_id)) = pos.and_then(|i| self.pending.remove(i)) {
            self.videos.insert(entry, video_id);
        }
    }

    fn playing_video(&self) -> Option<String> {
        self.videos.get(&self.playing?).cloned()
    }

    /// Updates entry bookkeeping and maps the message to a player event.
    fn on_message(&mut self, v: &Value) -> Option<PlayerEvent> {
        // Replies to `loadfile` carry the new entry id (mpv 0.38+).
        if let (Some(rid), Some(entry)) = (
            v.get("request_id").and_then(Value::as_u64),
            v.pointer("/data/playlist_entry_id").and_then(Value::as_i64),
        ) {
            self.bind(entry, Some(rid));
            return None;
        }

        let entry = v.get("playlist_entry_id").and_then(Value::as_i64);
        match v.get("event")?.as_str()? {
            "start-file" => {
                let entry = entry?;
                self.bind(entry, None);
                self.playing = Some(entry);
                None
            }
            // Fires once the first frame is out, and again after seeks.
            "playback-restart" => Some(PlayerEvent::Started {
                video_id: self.playing_video()?,
            }),
            "property-change" => {
                let name = v.get("name")?.as_str()?;
                let eof = v.get("data").and_then(Value::as_bool).unwrap_or(false);
                if name != "eof-reached" || !eof {
                    return None;
                }
                Some(PlayerEvent::Ended {
                    video_id: self.playing_video()?,
                })
            }
            "end-file" => {
                let entry = entry.or(self.playing)?;
                if self.playing == Some(entry) {
                    self.playing = None;
                }
                let video_id = self.videos.remove(&entry)?;
                // Unplayable videos (removed, region-locked, embed-disabled) end with reason=error.
                if v.get("reason").and_then(Value::as_str) != Some("error") {
                    return None;
                }
                let err = v.get("file_error").or_else(|| v.get("error"));
                let message = err.and_then(Value::as_str).unwrap_or("unknown").to_string();
                Some(PlayerEvent::Error { video_id, message })
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct MpvHandle {
    child: Child,
    socket_path: PathBuf,
    writer: tokio::sync::Mutex<tokio::io::WriteHalf<UnixStream>>,
    request_id: AtomicU64,
    entries: SharedEntries,
}

impl MpvHandle {
    pub async fn spawn(
        event_tx: mpsc::Sender<Event>,
        mute: bool,
        audio_device: Option<&str>,
        log_file: Option<&std::path::Path>,
    ) -> anyhow::Result<Self> {
        let socket_path =
            std::env::temp_dir().join(format!("backdrop-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let mut cmd = Command::new("mpv");
        cmd.args([
            "--idle=yes",
            "--force-window=yes",
            "--input-terminal=no",
            "--really-quiet",
            // Hold the last frame at EOF so a replay is a seek, not a reload.
            "--keep-open=yes",
            "--ytdl-format=bestvideo[height<=?1080]+bestaudio/best",
        ]);
        if mute {
            cmd.arg("--mute=yes");
        }
        if let Some(dev) = audio_device {
            cmd.arg(format!("--audio-device={dev}"));
        }
        if let Some(p) = log_file {
            cmd.arg(format!("--log-file={}", p.display()));
        }
        let child = cmd
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("spawn mpv")?;

        // Connect (mpv creates the socket shortly after starting).
        let stream = connect_with_retry(&socket_path).await?;
        let (reader, writer) = tokio::io::split(stream);

        let entries = SharedEntries::default();
        tokio::spawn(read_events_loop(reader, event_tx, entries.clone()));

        let this = Self {
            child,
            socket_path,
            writer: tokio::sync::Mutex::new(writer),
            request_id: AtomicU64::new(1),
            entries,
        };

        this.command(json!({"command":["observe_property", 1, "eof-reached"]}))
            .await?;

        Ok(this)
    }

    fn with_entries(&self, f: impl FnOnce(&mut Entries)) {
        if let Ok(mut entries) = self.entries.lock() {
            f(&mut entries);
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn command(&self, mut v: Value) -> anyhow::Result<()> {
        // Tag requests so mpv replies can be matched.
        if v.get("request_id").is_none() {
            let id = self.next_request_id();
            if let Value::Object(ref mut o) = v {
                o.insert("request_id".to_string(), Value::from(id));
            }
        }
        let mut w = self.writer.lock().await;
        let mut line = serde_json::to_vec(&v).context("encode mpv json")?;
        line.push(b'\n');
        w.write_all(&line).await.context("write mpv ipc")?;
        w.flush().await.context("flush mpv ipc")?;
        Ok(())
    }
}

impl Player for MpvHandle {
    async fn load(&self, video_id: &str) -> anyhow::Result<()> {
        let rid = self.next_request_id();
        // Recorded before sending; the reply can beat the write's return.
        self.with_entries(|e| e.queued(rid, video_id));
        self.command(json!({
            "command": ["loadfile", watch_url(video_id), "replace"],
            "request_id": rid,
        }))
        .await
    }

    async fn replay(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["seek", 0, "absolute"]}))
            .await?;
        self.command(json!({"command":["set_property", "pause", false]}))
            .await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.with_entries(Entries::cleared);
        self.command(json!({"command":["stop"]})).await
    }
}

impl Drop for MpvHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn connect_with_retry(path: &PathBuf) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e).with_context(|| format!("connect to mpv ipc {}", path.display()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_events_loop(
    reader: tokio::io::ReadHalf<UnixStream>,
    event_tx: mpsc::Sender<Event>,
    entries: SharedEntries,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(v) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if let (Some(rid), Some(err)) = (v.get("request_id"), v.get("error"))
            && err.as_str().is_some_and(|e| e != "success")
        {
            tracing::warn!("mpv request {rid} failed: {err}");
        }
        let event = match entries.lock() {
            Ok(mut entries) => entries.on_message(&v),
            Err(_) => break,
        };
        if let Some(pe) = event
            && event_tx.send(Event::Player(pe)).await.is_err()
        {
            break;
        }
    }
}
