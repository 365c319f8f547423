//! Owned upload stream with idempotent release

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

type CloseHook = Box<dyn FnOnce() + Send>;

/// The byte stream of one upload.
///
/// The stream is released exactly once: by an explicit [`Payload::close`] or,
/// failing that, on drop. Closing an already closed payload is a no-op, and
/// reads after close fail instead of touching the released stream.
pub struct Payload {
    reader: Option<Box<dyn AsyncRead + Send + Unpin>>,
    on_close: Option<CloseHook>,
}

impl Payload {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
            on_close: None,
        }
    }

    /// Register a callback run when the stream is released.
    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            if let Some(hook) = self.on_close.take() {
                hook();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AsyncRead for Payload {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().reader.as_mut() {
            Some(reader) => Pin::new(reader).poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "payload stream already closed",
            ))),
        }
    }
}
