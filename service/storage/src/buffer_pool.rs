//! Part buffers shared across uploads.
//!
//! A chunker emits parts by splitting its buffer, so the emitted part and the buffer share one
//! allocation. Once the store drops the part, `reserve` on the buffer reclaims the allocation
//! in place instead of allocating again. The pool keeps those buffers alive between uploads.

use bytes::BytesMut;
use parking_lot::Mutex;

pub struct BufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    buffer_capacity: usize,
    max_buffers: usize,
}

impl BufferPool {
    /// A pool of at most `max_buffers` idle buffers of `buffer_capacity` bytes each.
    pub fn new(max_buffers: usize, buffer_capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_buffers)),
            buffer_capacity,
            max_buffers,
        }
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// An empty buffer with room for at least one full part.
    pub fn acquire(&self) -> BytesMut {
        let mut buffer = self.buffers.lock().pop().unwrap_or_default();
        buffer.reserve(self.buffer_capacity);
        buffer
    }

    pub fn release(&self, mut buffer: BytesMut) {
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_buffers {
            buffers.push(buffer);
        }
    }

    /// Idle buffers currently held.
    pub fn available(&self) -> usize {
        self.buffers.lock().len()
    }
}
