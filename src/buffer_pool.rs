use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared pool of fixed-size read buffers for port-43 responses.
#[derive(Clone)]
pub struct BufferPool {
    buffers: Arc<Mutex<Vec<Vec<u8>>>>,
    buffer_size: usize,
    max_pool_size: usize,
}

impl BufferPool {
    pub fn new(buffer_size: usize, max_pool_size: usize) -> Self {
        Self {
            buffers: Arc::new(Mutex::new(Vec::with_capacity(max_pool_size))),
            buffer_size,
            max_pool_size,
        }
    }

    /// Take a zeroed buffer; it goes back to the pool when dropped.
    pub fn checkout(&self) -> PooledBuffer {
        let reused = self.buffers.lock().ok().and_then(|mut pool| pool.pop());

        let buffer = match reused {
            Some(mut buf) => {
                buf.clear();
                buf.resize(self.buffer_size, 0);
                buf
            }
            None => {
                debug!("Buffer pool empty, allocating {} bytes", self.buffer_size);
                vec![0; self.buffer_size]
            }
        };

        PooledBuffer {
            buffer,
            pool: self.clone(),
        }
    }
}

// RAII guard: returns its buffer to the pool on drop
pub struct PooledBuffer {
    buffer: Vec<u8>,
    pool: BufferPool,
}

impl PooledBuffer {
    pub fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Ok(mut pool) = self.pool.buffers.lock() {
            if pool.len() < self.pool.max_pool_size {
                pool.push(std::mem::take(&mut self.buffer));
            }
        }
    }
}
