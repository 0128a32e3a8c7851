// src/loader.rs

use std::path::Path;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error};

use crate::decoder::{decode_bytes, extension_hint};
use crate::engine::AudioBuffer;

/// Fetches the encoded bytes of one stem.
pub trait StemFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// `http(s)://` through a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

impl StemFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        Ok(resp.bytes()?.to_vec())
    }
}

/// `file://` URLs and plain paths.
pub struct FileFetcher;

impl StemFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read(Path::new(path)).with_context(|| format!("reading {path}"))
    }
}

/// Picks the fetcher by scheme.
pub struct DefaultFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(Duration::from_secs(60))?,
            file: FileFetcher,
        })
    }
}

impl StemFetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.fetch(url)
        } else {
            self.file.fetch(url)
        }
    }
}

/// Relative stem locations hang off the API base. Anything starting with
/// `http` or `file://` is used as is, and so are absolute paths when there
/// is no base.
pub fn resolve_url(api_base: &str, url: &str) -> String {
    if url.starts_with("http") || url.starts_with("file://") || (api_base.is_empty() && url.starts_with('/')) {
        return url.to_string();
    }
    format!("{}{}", api_base.trim_end_matches('/'), ensure_leading_slash(url))
}

fn ensure_leading_slash(url: &str) -> String {
    if url.starts_with('/') { url.to_string() } else { format!("/{url}") }
}

/// Outcome of one background fetch + decode.
pub struct LoadEvent {
    /// Stem set the request was made for.
    pub generation: u64,
    pub index: usize,
    pub name: String,
    pub result: Result<AudioBuffer>,
}

/// One worker thread per stem; completions come back over a channel in
/// whatever order the decodes finish.
pub struct StemLoader {
    fetcher: Arc<dyn StemFetcher>,
    target_rate: Option<u32>,
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
}

impl StemLoader {
    pub fn new(fetcher: Arc<dyn StemFetcher>, target_rate: Option<u32>) -> Self {
        let (tx, rx) = channel();
        Self { fetcher, target_rate, tx, rx }
    }

    pub fn spawn(&self, generation: u64, index: usize, name: String, url: String) {
        let fetcher = self.fetcher.clone();
        let tx = self.tx.clone();
        let target_rate = self.target_rate;
        let thread_name = format!("stem-{name}");
        let stem = name.clone();

        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            debug!("Fetching stem '{stem}' from {url}");
            let result = fetcher.fetch(&url).and_then(|bytes| {
                let ext = extension_hint(&url);
                decode_bytes(bytes, ext.as_deref(), target_rate)
                    .with_context(|| format!("decoding {url}"))
            });
            // receiver gone means the transport was dropped; nothing to tell
            let _ = tx.send(LoadEvent { generation, index, name: stem, result });
        });

        if let Err(e) = spawned {
            error!("Could not start loader for '{name}': {e}");
            let _ = self.tx.send(LoadEvent {
                generation,
                index,
                name,
                result: Err(e.into()),
            });
        }
    }

    pub fn try_recv(&self) -> Option<LoadEvent> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
