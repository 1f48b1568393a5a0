use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use rsdetect::RsdetectError;
use rsdetect::cancel::CancellationToken;
use rsdetect::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use rsdetect::provision::{self, Downloader, InvocationPrefix, ProvisionRequest, ProxyDescriptor};
use rsdetect::remote::{OsFamily, RemoteExecutionPort};
use url::Url;

/// Downloader that serves a fixed body and counts requests.
#[allow(dead_code)]
pub struct CountingDownloader {
    body: Vec<u8>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl CountingDownloader {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Downloader for CountingDownloader {
    fn download(&self, url: &Url, _proxy: Option<&ProxyDescriptor>) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.body.clone())
    }
}

/// Downloader that always fails.
#[allow(dead_code)]
pub struct FailingDownloader;

impl Downloader for FailingDownloader {
    fn download(&self, url: &Url, _proxy: Option<&ProxyDescriptor>) -> Result<Vec<u8>> {
        anyhow::bail!("connection refused: {}", url)
    }
}

/// Execution node with a fixed OS family that provisions in-process.
#[allow(dead_code)]
pub struct FakeNode<'a> {
    os: OsFamily,
    downloader: &'a dyn Downloader,
    os_queries: AtomicUsize,
    provisions: AtomicUsize,
}

#[allow(dead_code)]
impl<'a> FakeNode<'a> {
    pub fn new(os: OsFamily, downloader: &'a dyn Downloader) -> Self {
        Self {
            os,
            downloader,
            os_queries: AtomicUsize::new(0),
            provisions: AtomicUsize::new(0),
        }
    }

    pub fn os_queries(&self) -> usize {
        self.os_queries.load(Ordering::SeqCst)
    }

    pub fn provisions(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }
}

impl RemoteExecutionPort for FakeNode<'_> {
    fn os_family(&self, cancel: &CancellationToken) -> Result<OsFamily, RsdetectError> {
        if cancel.is_cancelled() {
            return Err(RsdetectError::Cancelled);
        }
        self.os_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.os)
    }

    fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationPrefix, RsdetectError> {
        if cancel.is_cancelled() {
            return Err(RsdetectError::Cancelled);
        }
        self.provisions.fetch_add(1, Ordering::SeqCst);
        provision::provision(request, self.downloader)
    }
}

/// Executor that records each spec instead of running it.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingExecutor {
    specs: Mutex<Vec<CommandSpec>>,
    /// Exit code to report; `None` reports a dry run
    exit_code: Option<i32>,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn exiting_with(code: i32) -> Self {
        Self {
            specs: Mutex::new(Vec::new()),
            exit_code: Some(code),
        }
    }

    pub fn last_spec(&self) -> CommandSpec {
        self.specs
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("executor should have been called")
    }

    pub fn call_count(&self) -> usize {
        self.specs.lock().unwrap().len()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, spec: &CommandSpec, _cancel: &CancellationToken) -> Result<ExecutionResult> {
        self.specs.lock().unwrap().push(spec.clone());
        Ok(ExecutionResult {
            status: self.exit_code.map(exit_status),
        })
    }
}

#[cfg(unix)]
fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code as u32)
}

/// Converts a temp dir path into a UTF-8 path.
#[allow(dead_code)]
pub fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8Path::from_path(path)
        .expect("temp dir path should be UTF-8")
        .to_path_buf()
}

/// Log sink shared between a test and its subscriber.
#[allow(dead_code)]
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its result and log output.
#[allow(dead_code)]
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}
