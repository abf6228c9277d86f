use std::sync::Arc;

use parking_lot::Mutex;

/// Shared storage behind a [`RingBuffer`] and its markers.
#[derive(Debug)]
struct Inner<T> {
    data: Vec<T>,
    /// Total elements ever pushed. Never decreases.
    write_count: u64,
    /// Positions below this were discarded by `clear`.
    floor: u64,
}

impl<T: Copy> Inner<T> {
    fn oldest(&self) -> u64 {
        self.write_count
            .saturating_sub(self.data.len() as u64)
            .max(self.floor)
    }

    /// Move a lagging read position up to the oldest retained element,
    /// returning how many elements it missed.
    fn catch_up(&self, position: &mut u64) -> u64 {
        let oldest = self.oldest();
        let skipped = oldest.saturating_sub(*position);
        if skipped > 0 {
            log::debug!(
                "Marker fell {} elements behind the retained window, clamping to {}",
                skipped,
                oldest
            );
            *position = oldest;
        }
        skipped
    }

    /// Copy `out.len()` elements starting at absolute position `start`.
    /// The caller guarantees the range lies inside the retained window.
    fn copy_out(&self, start: u64, out: &mut [T]) {
        let capacity = self.data.len();
        let begin = (start % capacity as u64) as usize;
        let first = out.len().min(capacity - begin);
        out[..first].copy_from_slice(&self.data[begin..begin + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&self.data[..rest]);
    }
}

/// Fixed-capacity circular store with a monotonic write cursor.
///
/// One producer pushes; any number of [`Marker`]s read from their own
/// positions without disturbing each other. The readable window is
/// `[write_count - capacity, write_count)`. Once the buffer is full every push
/// overwrites the oldest elements, which is the only backpressure there is.
///
/// Cloning the buffer shares the same storage.
#[derive(Debug)]
pub struct RingBuffer<T> {
    inner: Arc<Mutex<Inner<T>>>,
    capacity: usize,
}

impl<T> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer holding `capacity` elements (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data: vec![T::default(); capacity],
                write_count: 0,
                floor: 0,
            })),
            capacity,
        }
    }

    /// Append elements, overwriting the oldest once full.
    ///
    /// If `data` is larger than the capacity, only its tail is stored, but the
    /// write cursor still advances by the full length.
    pub fn push(&self, data: &[T]) {
        if data.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        let total = data.len() as u64;
        let kept = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };

        let start = inner.write_count + total - kept.len() as u64;
        let begin = (start % self.capacity as u64) as usize;
        let first = kept.len().min(self.capacity - begin);
        inner.data[begin..begin + first].copy_from_slice(&kept[..first]);
        let rest = kept.len() - first;
        inner.data[..rest].copy_from_slice(&kept[first..]);
        inner.write_count += total;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total elements pushed since creation.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().write_count
    }

    /// Absolute position of the oldest element still retained.
    pub fn oldest_position(&self) -> u64 {
        self.inner.lock().oldest()
    }

    /// Elements currently retained.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        (inner.write_count - inner.oldest()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements readable from absolute position `position`, clamped to the
    /// retained window.
    pub fn available_from(&self, position: u64) -> usize {
        let inner = self.inner.lock();
        let from = position.max(inner.oldest());
        inner.write_count.saturating_sub(from) as usize
    }

    /// Create a marker `offset` elements relative to the write head.
    ///
    /// Negative offsets look back into retained data; the result is clamped
    /// to `[oldest_position, write_count]`.
    pub fn create_marker(&self, offset: i64) -> Marker<T> {
        let position = {
            let inner = self.inner.lock();
            let target = inner.write_count as i128 + offset as i128;
            target.clamp(inner.oldest() as i128, inner.write_count as i128) as u64
        };
        Marker {
            buffer: Arc::clone(&self.inner),
            position,
        }
    }

    /// Create a marker `offset_secs` away from the write head, converted with
    /// `elements_per_second` (sample rate times channels for audio).
    pub fn create_marker_at_time(&self, offset_secs: f64, elements_per_second: f64) -> Marker<T> {
        self.create_marker((offset_secs * elements_per_second).round() as i64)
    }

    /// Create a marker at the oldest retained element.
    pub fn create_marker_at_oldest(&self) -> Marker<T> {
        self.create_marker(i64::MIN)
    }

    /// Discard all retained elements. The write cursor keeps its value so
    /// existing markers stay ordered.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.floor = inner.write_count;
    }
}

/// Outcome of a marker read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerRead {
    /// Elements delivered.
    pub read: usize,
    /// Elements overwritten before this marker reached them.
    pub skipped: u64,
}

/// Read cursor into a [`RingBuffer`].
///
/// Markers never modify the buffer; cloning one produces an independent
/// cursor at the same position. A marker that has fallen more than
/// `capacity` elements behind has lost data: its next read clamps to the
/// oldest retained element and reports the loss in [`MarkerRead::skipped`].
#[derive(Debug)]
pub struct Marker<T> {
    buffer: Arc<Mutex<Inner<T>>>,
    position: u64,
}

impl<T> Clone for Marker<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            position: self.position,
        }
    }
}

impl<T: Copy + Default> Marker<T> {
    /// Absolute position of the next element this marker reads.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether every element from this position is still retained.
    pub fn is_valid(&self) -> bool {
        let inner = self.buffer.lock();
        self.position >= inner.oldest()
    }

    /// Elements readable now, after clamping.
    pub fn available(&self) -> usize {
        let inner = self.buffer.lock();
        let from = self.position.max(inner.oldest());
        inner.write_count.saturating_sub(from) as usize
    }

    /// Copy up to `out.len()` elements and advance.
    pub fn read(&mut self, out: &mut [T]) -> MarkerRead {
        let inner = self.buffer.lock();
        let skipped = inner.catch_up(&mut self.position);
        let count = out.len().min((inner.write_count - self.position) as usize);
        inner.copy_out(self.position, &mut out[..count]);
        self.position += count as u64;
        MarkerRead { read: count, skipped }
    }

    /// Drain everything up to the write head into each writer in turn.
    ///
    /// Data is copied under the lock and writers run after it is released,
    /// so a slow writer never stalls the producer.
    pub fn read_into_writers(&mut self, writers: &mut [&mut dyn FnMut(&[T])]) -> MarkerRead {
        let (pending, skipped) = {
            let inner = self.buffer.lock();
            let skipped = inner.catch_up(&mut self.position);
            let count = (inner.write_count - self.position) as usize;
            let mut pending = vec![T::default(); count];
            inner.copy_out(self.position, &mut pending);
            self.position += count as u64;
            (pending, skipped)
        };

        if !pending.is_empty() {
            for writer in writers.iter_mut() {
                writer(&pending);
            }
        }
        MarkerRead {
            read: pending.len(),
            skipped,
        }
    }

    /// Jump to the write head, discarding everything unread.
    pub fn skip_to_head(&mut self) -> u64 {
        let write_count = self.buffer.lock().write_count;
        let skipped = write_count.saturating_sub(self.position);
        self.position = write_count;
        skipped
    }
}
