//! Streaming of child process output into the log.

use std::io::{self, BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

/// Which child stream a reader thread is draining.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl StreamType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Extracts a human-readable message from a thread panic payload.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Starts a named thread that forwards `pipe` to the log line by line.
///
/// A `None` pipe yields a thread that only reports the missing pipe.
pub(super) fn spawn_reader<R>(pipe: Option<R>, stream: StreamType) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{}-reader", stream.as_str()))
        .spawn(move || match pipe {
            Some(pipe) => forward_lines(pipe, stream),
            None => tracing::error!(
                stream = stream.as_str(),
                "pipe was not captured, no output will be logged"
            ),
        })
}

/// Reads until EOF, logging stdout at INFO and stderr at WARN.
///
/// Invalid UTF-8 is replaced lossily and CRLF endings are trimmed. A read
/// error ends streaming without affecting the command's result.
fn forward_lines<R: Read>(pipe: R, stream: StreamType) {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']);
                match stream {
                    StreamType::Stdout => tracing::info!(stream = stream.as_str(), "{}", line),
                    StreamType::Stderr => tracing::warn!(stream = stream.as_str(), "{}", line),
                }
            }
            Err(e) => {
                tracing::error!(stream = stream.as_str(), error = %e, "read failed, stopping");
                break;
            }
        }
    }
}
