use crate::{LineBuffer, OutputChannel};
use parking_lot::Mutex;
use pgvisor_core::Result;
use std::fmt;
use std::io::{self, IsTerminal, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// 256-colour codes handed out to processes in registration order.
pub const PALETTE: [u8; 10] = [2, 3, 4, 5, 6, 42, 130, 103, 129, 108];

pub fn palette_color(index: usize) -> u8 {
    PALETTE[index % PALETTE.len()]
}

/// Who a line belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSource {
    name: String,
    color: u8,
}

impl OutputSource {
    pub fn new(name: impl Into<String>, color: u8) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> u8 {
        self.color
    }
}

/// Serialises prefixed lines from every process onto one sink.
///
/// Each line is formatted up front and written with a single `write_all`
/// under the sink lock, so lines from different processes never interleave.
pub struct OutputMultiplexer {
    width: AtomicUsize,
    colorize: bool,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for OutputMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputMultiplexer")
            .field("width", &self.width.load(Ordering::Relaxed))
            .field("colorize", &self.colorize)
            .field("sink", &"<Write>")
            .finish()
    }
}

impl OutputMultiplexer {
    pub fn new(sink: Box<dyn Write + Send>, colorize: bool) -> Self {
        Self {
            width: AtomicUsize::new(0),
            colorize,
            sink: Mutex::new(sink),
        }
    }

    /// Writes to stdout, colouring only when stdout is a terminal.
    pub fn stdout() -> Self {
        let colorize = io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), colorize)
    }

    /// Registers a source so the name column is wide enough for it.
    pub fn connect(&self, source: &OutputSource) {
        self.width.fetch_max(source.name.len(), Ordering::Relaxed);
    }

    pub fn width(&self) -> usize {
        self.width.load(Ordering::Relaxed)
    }

    /// `name<padding> | line\n`, with the name in the source's colour.
    pub fn format_line(&self, source: &OutputSource, line: &[u8]) -> Vec<u8> {
        let width = self.width().max(source.name.len());
        let mut buf = Vec::with_capacity(width + line.len() + 24);

        if self.colorize {
            buf.extend_from_slice(format!("\x1b[1;38;5;{}m", source.color).as_bytes());
        }
        buf.extend_from_slice(source.name.as_bytes());
        buf.resize(buf.len() + (width - source.name.len()), b' ');
        if self.colorize {
            buf.extend_from_slice(b"\x1b[0m");
        }
        buf.extend_from_slice(b" | ");
        buf.extend_from_slice(line);
        buf.push(b'\n');
        buf
    }

    pub fn write_line(&self, source: &OutputSource, line: &[u8]) {
        let buf = self.format_line(source, line);
        self.emit(&buf);
    }

    /// Lifecycle notices such as `Running...`, in bold.
    pub fn write_status(&self, source: &OutputSource, message: &str) {
        if self.colorize {
            self.write_line(source, format!("\x1b[1m{}\x1b[0m", message).as_bytes());
        } else {
            self.write_line(source, message.as_bytes());
        }
    }

    /// Errors attributed to a process, in red.
    pub fn write_err(&self, source: &OutputSource, err: &dyn fmt::Display) {
        if self.colorize {
            self.write_line(source, format!("\x1b[0;31m{}\x1b[0m", err).as_bytes());
        } else {
            self.write_line(source, err.to_string().as_bytes());
        }
    }

    fn emit(&self, buf: &[u8]) {
        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(buf).and_then(|_| sink.flush()) {
            debug!("Failed to write multiplexed output: {}", e);
        }
    }

    /// Starts copying `channel` line by line into the sink.
    ///
    /// The copy runs on its own thread until the reading end reports end of
    /// stream (EOF for a pipe, EIO for a pty whose last slave closed).
    pub fn pipe_output(
        self: &Arc<Self>,
        source: OutputSource,
        channel: OutputChannel,
    ) -> Result<OutputPipe> {
        let mut reader = channel.reader()?;
        let (done_tx, done_rx) = oneshot::channel();
        let mux = Arc::clone(self);
        let thread_source = source.clone();

        thread::Builder::new()
            .name(format!("output-{}", source.name))
            .spawn(move || {
                let source = thread_source;
                let mut buffer = LineBuffer::default();
                let mut chunk = [0u8; 8192];

                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            for line in buffer.push(&chunk[..n]) {
                                mux.write_line(&source, &line);
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                        Err(e) => {
                            mux.write_err(&source, &e);
                            break;
                        }
                    }
                }

                if let Some(rest) = buffer.finish() {
                    mux.write_line(&source, &rest);
                }
                trace!("Output reader for {} finished: {:?}", source.name, buffer.stats());
                let _ = done_tx.send(());
            })?;

        Ok(OutputPipe {
            source,
            channel,
            done: Some(done_rx),
        })
    }
}

/// A running copy from one channel. Dropping it closes the supervisor's
/// descriptors for the channel.
#[derive(Debug)]
pub struct OutputPipe {
    source: OutputSource,
    channel: OutputChannel,
    done: Option<oneshot::Receiver<()>>,
}

impl OutputPipe {
    pub fn channel(&self) -> &OutputChannel {
        &self.channel
    }

    /// Must be called once the child holds its own copies of the child end.
    pub fn release_child_end(&mut self) {
        self.channel.release_child_end();
    }

    /// Waits up to `timeout` for the reader to flush everything it has.
    /// Returns false if it is still running, e.g. because a grandchild kept
    /// the child end open.
    pub async fn drain(&mut self, timeout: Duration) -> bool {
        let Some(done) = self.done.as_mut() else {
            return true;
        };

        match tokio::time::timeout(timeout, done).await {
            Ok(_) => {
                self.done = None;
                true
            }
            Err(_) => {
                warn!(
                    "Output of {} still open {:?} after exit",
                    self.source.name, timeout
                );
                false
            }
        }
    }
}
