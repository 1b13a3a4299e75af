use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::BufferPool;

/// A piece of the body ready to become one part.
#[derive(Debug)]
pub struct Chunk {
    pub content: Bytes,
    /// No bytes follow this chunk. A final chunk may be shorter than the part size, or empty.
    pub is_final: bool,
}

/// Cuts a single-pass byte stream into parts of exactly `part_size` bytes, except the last.
///
/// Bytes of a stream item that overflow the current part are carried over to the next one, so
/// the concatenation of all chunks is the stream content, byte for byte.
pub struct StreamChunker<S> {
    stream: S,
    part_size: usize,
    buffer: BytesMut,
    carry: Bytes,
    finished: bool,
    pool: Option<Arc<BufferPool>>,
}

impl<S> StreamChunker<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    pub fn new(stream: S, part_size: usize) -> Self {
        assert!(part_size > 0, "part size must not be zero");
        Self {
            stream,
            part_size,
            buffer: BytesMut::new(),
            carry: Bytes::new(),
            finished: false,
            pool: None,
        }
    }

    /// Take the part buffer from `pool` and give it back when the chunker is dropped.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.buffer = pool.acquire();
        self.pool = Some(pool);
        self
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Wait for the next chunk.
    ///
    /// Returns once a full part is buffered or the stream ends. Read errors are returned as
    /// they happen; the chunker must not be used after an error. After the final chunk every
    /// call returns an empty final chunk without touching the stream.
    pub async fn next_chunk(&mut self) -> std::io::Result<Chunk> {
        if self.finished {
            return Ok(Chunk {
                content: Bytes::new(),
                is_final: true,
            });
        }
        self.buffer.reserve(self.part_size);
        loop {
            // Whole part available in the carried item, no copy needed.
            if self.buffer.is_empty() && self.carry.len() >= self.part_size {
                return Ok(Chunk {
                    content: self.carry.split_to(self.part_size),
                    is_final: false,
                });
            }
            if !self.carry.is_empty() {
                let take = (self.part_size - self.buffer.len()).min(self.carry.len());
                self.buffer.extend_from_slice(&self.carry.split_to(take));
            }
            if self.buffer.len() == self.part_size {
                return Ok(Chunk {
                    content: self.buffer.split().freeze(),
                    is_final: false,
                });
            }
            match self.stream.next().await {
                Some(Ok(bytes)) => self.carry = bytes,
                Some(Err(e)) => return Err(e),
                None => {
                    self.finished = true;
                    return Ok(Chunk {
                        content: self.buffer.split().freeze(),
                        is_final: true,
                    });
                }
            }
        }
    }
}

impl<S> Drop for StreamChunker<S> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.buffer));
        }
    }
}
