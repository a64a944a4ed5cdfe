//! In-memory streams for unit tests.

use std::io::Cursor;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Stream that replays a fixed script on reads and records every write.
///
/// Reads past the end of the script return EOF.
pub struct ScriptedStream {
    script: Cursor<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
    write_calls: Arc<Mutex<usize>>,
}

/// Shared view of what a [`ScriptedStream`] has written.
#[derive(Clone)]
pub struct WriteLog {
    written: Arc<Mutex<Vec<u8>>>,
    write_calls: Arc<Mutex<usize>>,
}

impl WriteLog {
    pub fn bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> usize {
        *self.write_calls.lock().unwrap()
    }
}

impl ScriptedStream {
    pub fn new(script: Vec<u8>) -> (Self, WriteLog) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let write_calls = Arc::new(Mutex::new(0));
        let log = WriteLog {
            written: written.clone(),
            write_calls: write_calls.clone(),
        };
        (
            Self {
                script: Cursor::new(script),
                written,
                write_calls,
            },
            log,
        )
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let pos = self.script.position() as usize;
        let data = self.script.get_ref();
        let n = buf.remaining().min(data.len().saturating_sub(pos));
        buf.put_slice(&data[pos..pos + n]);
        self.script.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        *self.write_calls.lock().unwrap() += 1;
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Builder for peer-side byte scripts.
#[derive(Default)]
pub struct Script {
    buf: BytesMut,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn f32s(mut self, values: &[f32]) -> Self {
        for &v in values {
            self.buf.put_f32_le(v);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}
