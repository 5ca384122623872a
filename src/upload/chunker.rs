//! Splits an unseekable byte source into bounded parts

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Lazy, single-pass chunk sequence over an [`AsyncRead`]
///
/// Short reads are accumulated, so every chunk except the last is exactly
/// `max_part_size` bytes. After end-of-stream or a read error the chunker is
/// fused and only returns `Ok(None)`.
pub struct Chunker<R> {
    reader: R,
    max_part_size: usize,
    finished: bool,
}

impl<R: AsyncRead + Unpin> Chunker<R> {
    pub fn new(reader: R, max_part_size: usize) -> Self {
        Self {
            reader,
            max_part_size,
            finished: false,
        }
    }

    /// Read the next chunk; `Ok(None)` at end of stream
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.finished || self.max_part_size == 0 {
            return Ok(None);
        }

        let mut buf = BytesMut::with_capacity(self.max_part_size);
        while buf.len() < self.max_part_size {
            let remaining = self.max_part_size - buf.len();
            match (&mut self.reader)
                .take(remaining as u64)
                .read_buf(&mut buf)
                .await
            {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }

        if buf.is_empty() {
            Ok(None)
        } else {
            Ok(Some(buf.freeze()))
        }
    }

    /// Whether the source has been fully consumed
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
