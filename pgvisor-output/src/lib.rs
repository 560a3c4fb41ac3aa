mod buffer;
mod channel;
mod multiplexer;

pub use buffer::{BufferStats, LineBuffer, LineBufferConfig};
pub use channel::{ChannelKind, ChildStdio, OutputChannel};
pub use multiplexer::{OutputMultiplexer, OutputPipe, OutputSource, PALETTE, palette_color};

/// How long a finished process's reader may keep flushing before its exit
/// line is written anyway.
pub const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(250);
