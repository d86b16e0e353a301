//! Sample Ring Buffer
//!
//! Lock-free single-producer single-consumer queue of interleaved samples,
//! bridging the capture callback (producer) and the render callback
//! (consumer).
//!
//! Samples are stored as `f32` bit patterns in `AtomicU32` slots, so the ring
//! can be shared by reference between the two callback threads without any
//! unsafe code. The cursors increase monotonically and are reduced modulo the
//! capacity only when indexing.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Fixed-capacity SPSC ring of interleaved `f32` samples.
///
/// Only one thread may call [`write`](Self::write) and only one thread may
/// call [`read`](Self::read). Overflow drops the newest samples; underrun
/// yields silence.
pub struct SampleRing {
    storage: Box<[AtomicU32]>,
    /// Total samples ever written. Published with `Release` after the copy.
    write_pos: AtomicUsize,
    /// Total samples ever read. Published with `Release` after the copy.
    read_pos: AtomicUsize,
}

impl SampleRing {
    /// Creates a ring holding up to `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let storage = (0..capacity.max(1))
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            storage,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Maximum number of samples the ring can hold.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of samples currently readable.
    pub fn available(&self) -> usize {
        // Read cursor first so it can never be ahead of the write cursor seen.
        let read = self.read_pos.load(Ordering::Acquire);
        let write = self.write_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Number of samples that can be written without dropping.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.available().min(self.capacity())
    }

    /// Appends up to `samples.len()` samples and returns how many were
    /// stored. Samples that do not fit are dropped.
    ///
    /// REAL-TIME SAFE: no locks, no allocation.
    pub fn write(&self, samples: &[f32]) -> usize {
        let capacity = self.capacity();
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        let free = capacity - write.wrapping_sub(read).min(capacity);
        let count = samples.len().min(free);

        for (i, sample) in samples[..count].iter().enumerate() {
            let index = write.wrapping_add(i) % capacity;
            self.storage[index].store(sample.to_bits(), Ordering::Relaxed);
        }

        self.write_pos.store(write.wrapping_add(count), Ordering::Release);
        count
    }

    /// Fills `dest` from the ring and returns how many samples were real.
    /// The remainder of `dest` is zero-filled.
    ///
    /// REAL-TIME SAFE: no locks, no allocation.
    pub fn read(&self, dest: &mut [f32]) -> usize {
        let capacity = self.capacity();
        let read = self.read_pos.load(Ordering::Relaxed);
        let write = self.write_pos.load(Ordering::Acquire);
        let count = dest.len().min(write.wrapping_sub(read));

        for (i, sample) in dest[..count].iter_mut().enumerate() {
            let index = read.wrapping_add(i) % capacity;
            *sample = f32::from_bits(self.storage[index].load(Ordering::Relaxed));
        }
        dest[count..].fill(0.0);

        self.read_pos.store(read.wrapping_add(count), Ordering::Release);
        count
    }

    /// Resets both cursors and zeroes the storage.
    ///
    /// Must only be called while neither callback is running.
    pub fn clear(&self) {
        for slot in self.storage.iter() {
            slot.store(0, Ordering::Relaxed);
        }
        self.read_pos.store(0, Ordering::Release);
        self.write_pos.store(0, Ordering::Release);
    }
}
