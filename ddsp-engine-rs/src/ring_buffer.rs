use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free SPSC ring buffer for f32 audio samples.
///
/// Single producer, single consumer, no mutex. Read and write positions
/// are monotonic counters reduced modulo the capacity on access, so the
/// capacity does not need to be a power of two. The consumer never reads
/// past the committed write position.
pub struct SpscRingBuffer {
    buffer: Box<[f32]>,
    capacity: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
}

// SAFETY: designed for single-producer single-consumer use across
// threads; the atomic positions provide the synchronization.
unsafe impl Send for SpscRingBuffer {}
unsafe impl Sync for SpscRingBuffer {}

impl SpscRingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");
        Self {
            buffer: vec![0.0f32; capacity].into_boxed_slice(),
            capacity,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Number of samples available to read.
    pub fn available(&self) -> usize {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Acquire);
        w.wrapping_sub(r)
    }

    /// Number of samples that can be written.
    pub fn free_space(&self) -> usize {
        self.capacity - self.available()
    }

    /// Write samples. Returns the number actually written; the rest is
    /// dropped when the buffer is full.
    ///
    /// Only the producer thread may call this.
    pub fn write(&self, data: &[f32]) -> usize {
        let writable = data.len().min(self.free_space());
        if writable == 0 {
            return 0;
        }

        let pos = self.write_pos.load(Ordering::Relaxed);
        let mut offset = pos % self.capacity;
        let mut pending = &data[..writable];
        while !pending.is_empty() {
            let run = pending.len().min(self.capacity - offset);
            // SAFETY: the single producer owns the uncommitted region
            // [write_pos, write_pos + writable); the consumer never reads
            // past the committed write position.
            let segment = unsafe {
                std::slice::from_raw_parts_mut(self.buffer.as_ptr().add(offset) as *mut f32, run)
            };
            segment.copy_from_slice(&pending[..run]);
            pending = &pending[run..];
            offset = 0;
        }

        self.write_pos.store(pos.wrapping_add(writable), Ordering::Release);
        writable
    }

    /// Read samples. Returns the number actually read.
    ///
    /// Only the consumer thread may call this.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let readable = out.len().min(self.available());
        if readable == 0 {
            return 0;
        }

        let pos = self.read_pos.load(Ordering::Relaxed);
        let mut filled = 0;
        while filled < readable {
            let offset = pos.wrapping_add(filled) % self.capacity;
            let run = (readable - filled).min(self.capacity - offset);
            out[filled..filled + run].copy_from_slice(&self.buffer[offset..offset + run]);
            filled += run;
        }

        self.read_pos.store(pos.wrapping_add(readable), Ordering::Release);
        readable
    }

    /// Reset to the empty state.
    pub fn reset(&self) {
        self.read_pos.store(0, Ordering::Release);
        self.write_pos.store(0, Ordering::Release);
    }
}
