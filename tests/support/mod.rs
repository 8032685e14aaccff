#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use tracing_subscriber::fmt::MakeWriter;

use xkcd_harvest::catalog::Catalog;
use xkcd_harvest::error::{RequestFailure, RequestFailureKind};
use xkcd_harvest::http::{Fetcher, HttpResponse};

pub const ROOT: &str = "https://xkcd.test";

#[derive(Default)]
pub struct MockFetcher {
    routes: HashMap<String, Result<HttpResponse, RequestFailure>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn route(mut self, url: &str, response: HttpResponse) -> Self {
        self.routes.insert(url.to_string(), Ok(response));
        self
    }

    pub fn fail(mut self, url: &str, kind: RequestFailureKind) -> Self {
        self.routes
            .insert(url.to_string(), Err(RequestFailure::new(kind, url, "mock failure")));
        self
    }

    pub fn latest(self, num: u32) -> Self {
        self.route(
            &latest_url(),
            HttpResponse::new(200, format!(r#"{{"num": {num}, "title": "Latest"}}"#)),
        )
    }

    pub fn descriptor_status(self, id: u32, status: u16) -> Self {
        self.route(&descriptor_url(id), HttpResponse::new(status, "<html>nope</html>"))
    }

    /// Registers a descriptor for `id` whose asset answers with `bytes` and `content_type`.
    pub fn comic(self, id: u32, bytes: &[u8], content_type: &str) -> Self {
        let img = asset_url(id);
        self.route(
            &descriptor_url(id),
            HttpResponse::new(
                200,
                format!(r#"{{"num": {id}, "img": "{img}", "title": "Comic {id}", "alt": "alt"}}"#),
            ),
        )
        .route(
            &img,
            HttpResponse::new(200, bytes.to_vec()).with_header("Content-Type", content_type),
        )
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn get(&self, url: &str) -> Result<HttpResponse, RequestFailure> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| Ok(HttpResponse::new(404, "not found")))
    }
}

pub fn latest_url() -> String {
    format!("{ROOT}/info.0.json")
}

pub fn descriptor_url(id: u32) -> String {
    format!("{ROOT}/{id}/info.0.json")
}

pub fn asset_url(id: u32) -> String {
    format!("https://imgs.xkcd.test/comics/comic_{id}.png")
}

pub fn catalog(fetcher: &MockFetcher) -> Catalog<&MockFetcher> {
    Catalog::new(fetcher, ROOT)
}

pub fn temp_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("comics")).unwrap()
}

pub fn stored_names(root: &Utf8PathBuf) -> Vec<String> {
    let mut names = std::fs::read_dir(root.as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.trim_start().starts_with(level))
            .map(str::to_string)
            .collect()
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(self.0.clone())
    }
}

/// Runs `f` with a subscriber that records formatted log lines on this thread.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}
