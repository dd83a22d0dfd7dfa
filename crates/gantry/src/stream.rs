//! Command input/output streams.
//!
//! Handlers write their textual output to an [`OutputStream`]: a cloneable
//! sink over a bounded channel of byte chunks. Every write is one channel
//! send, so the receiving side (an HTTP streaming body, or a test collector)
//! sees output incrementally — there is no buffering between a handler and
//! its caller.

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// The caller's standard-input stream, if it provided one.
pub type InputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Receiving half of an output channel.
pub type OutputReceiver = mpsc::Receiver<Result<Bytes, std::io::Error>>;

/// Cloneable handle to the caller's output stream.
#[derive(Debug, Clone)]
pub struct OutputStream {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

impl OutputStream {
    /// Create an output stream and its receiving half.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, OutputReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Write a chunk of bytes to the caller.
    ///
    /// # Errors
    ///
    /// Fails if the caller has gone away (the receiving half was dropped).
    pub async fn write_all(&self, data: impl Into<Bytes>) -> std::io::Result<()> {
        let data = data.into();
        if data.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Ok(data))
            .await
            .map_err(|_| std::io::Error::other("output stream closed"))
    }

    /// Write a string to the caller.
    ///
    /// # Errors
    ///
    /// Fails if the caller has gone away.
    pub async fn write_str(&self, text: impl Into<String>) -> std::io::Result<()> {
        self.write_all(Bytes::from(text.into())).await
    }
}

/// The stream pair a handler is invoked with.
pub struct CommandIo {
    /// Caller-supplied standard input. `None` when the transport closed it
    /// at the boundary.
    pub input: Option<InputStream>,
    /// Sink for the handler's textual output.
    pub output: OutputStream,
}

impl CommandIo {
    /// Bundle an input and output stream.
    #[must_use]
    pub fn new(input: Option<InputStream>, output: OutputStream) -> Self {
        Self { input, output }
    }
}
