//! The emulation core side of the adapter: data source and ring buffer access

mod descriptor;

pub use descriptor::{
    AudioSourceDescriptor, BitDepth, ByteOrder, MAX_SOURCE_SAMPLE_RATE, SampleEncoding,
};

use crate::error::Result;
use ringbuf::traits::{Consumer, Observer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::{Arc, Mutex, MutexGuard};

/// Read end of a lock-free single-producer/single-consumer byte queue.
///
/// The emulation core owns the write end. Implementations must never block the
/// producer, and `read` must never return bytes past the producer's write cursor.
pub trait RingBufferReader: Send {
    /// Number of bytes that can currently be read
    fn available_bytes(&self) -> usize;

    /// Copies up to `dst.len()` bytes into `dst`, returning the count copied
    fn read(&mut self, dst: &mut [u8]) -> usize;

    /// Discards everything currently readable
    fn reset(&mut self);
}

impl RingBufferReader for HeapCons<u8> {
    fn available_bytes(&self) -> usize {
        self.occupied_len()
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        Consumer::pop_slice(self, dst)
    }

    fn reset(&mut self) {
        Consumer::clear(self);
    }
}

/// Audio-producing collaborator, usually an emulation core.
///
/// Buffer indices run over `0..audio_buffer_count()`.
pub trait AudioDataSource {
    fn audio_buffer_count(&self) -> usize;

    /// Lends the read end of the ring buffer for `index`.
    ///
    /// The source stays the owner: dropping the returned reader must make the
    /// buffer available to a later call again, so a failed or stopped graph can
    /// be set up anew. Returns `None` if the buffer does not exist or is
    /// currently lent out.
    fn ring_buffer(&mut self, index: usize) -> Option<Box<dyn RingBufferReader>>;

    fn channel_count(&self, buffer: usize) -> u32;

    fn audio_sample_rate(&self, buffer: usize) -> f64;

    /// Bit depth shared by every buffer
    fn audio_bit_depth(&self) -> u32;

    fn sample_encoding(&self, _buffer: usize) -> SampleEncoding {
        SampleEncoding::SignedInt
    }

    fn byte_order(&self, _buffer: usize) -> ByteOrder {
        ByteOrder::native()
    }

    /// Snapshot of the format of `buffer`
    fn descriptor(&self, buffer: usize) -> Result<AudioSourceDescriptor> {
        Ok(AudioSourceDescriptor::new(
            self.channel_count(buffer),
            self.audio_bit_depth(),
            self.audio_sample_rate(buffer),
        )?
        .with_encoding(self.sample_encoding(buffer))?
        .with_byte_order(self.byte_order(buffer)))
    }
}

type ReaderSlot = Arc<Mutex<Option<HeapCons<u8>>>>;

fn lock(slot: &Mutex<Option<HeapCons<u8>>>) -> MutexGuard<'_, Option<HeapCons<u8>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SourceStream {
    channels: u32,
    sample_rate: f64,
    reader: ReaderSlot,
}

/// Consumer on loan from a [`RingBufferSource`]; returns home when dropped.
///
/// The slot is only locked on lend and on drop, never while reading.
struct LentReader {
    consumer: Option<HeapCons<u8>>,
    home: ReaderSlot,
}

impl RingBufferReader for LentReader {
    fn available_bytes(&self) -> usize {
        self.consumer
            .as_ref()
            .map_or(0, RingBufferReader::available_bytes)
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        self.consumer
            .as_mut()
            .map_or(0, |consumer| RingBufferReader::read(consumer, dst))
    }

    fn reset(&mut self) {
        if let Some(consumer) = self.consumer.as_mut() {
            RingBufferReader::reset(consumer);
        }
    }
}

impl Drop for LentReader {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            *lock(&self.home) = Some(consumer);
        }
    }
}

/// An [`AudioDataSource`] backed by `ringbuf` heap buffers.
///
/// Each call to [`RingBufferSource::add_stream`] allocates a byte ring and returns
/// its producer, which the core thread writes raw PCM into. The consumer ends are
/// lent to the engine during graph setup and come back when the graph is torn
/// down, so the same source can be set up again.
pub struct RingBufferSource {
    bit_depth: u32,
    encoding: SampleEncoding,
    byte_order: ByteOrder,
    streams: Vec<SourceStream>,
}

impl RingBufferSource {
    pub fn new(bit_depth: u32) -> Self {
        Self {
            bit_depth,
            encoding: SampleEncoding::SignedInt,
            byte_order: ByteOrder::native(),
            streams: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Adds a stream and returns the producer the core writes PCM bytes into
    pub fn add_stream(&mut self, channels: u32, sample_rate: f64, capacity_bytes: usize) -> HeapProd<u8> {
        let (producer, consumer) = HeapRb::<u8>::new(capacity_bytes).split();
        self.streams.push(SourceStream {
            channels,
            sample_rate,
            reader: Arc::new(Mutex::new(Some(consumer))),
        });
        producer
    }
}

impl AudioDataSource for RingBufferSource {
    fn audio_buffer_count(&self) -> usize {
        self.streams.len()
    }

    fn ring_buffer(&mut self, index: usize) -> Option<Box<dyn RingBufferReader>> {
        let home = self.streams.get(index)?.reader.clone();
        let consumer = lock(&home).take()?;
        Some(Box::new(LentReader {
            consumer: Some(consumer),
            home,
        }))
    }

    fn channel_count(&self, buffer: usize) -> u32 {
        self.streams.get(buffer).map_or(0, |s| s.channels)
    }

    fn audio_sample_rate(&self, buffer: usize) -> f64 {
        self.streams.get(buffer).map_or(0.0, |s| s.sample_rate)
    }

    fn audio_bit_depth(&self) -> u32 {
        self.bit_depth
    }

    fn sample_encoding(&self, _buffer: usize) -> SampleEncoding {
        self.encoding
    }

    fn byte_order(&self, _buffer: usize) -> ByteOrder {
        self.byte_order
    }
}
