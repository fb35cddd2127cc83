//! PCM decoding from raw ring buffer bytes to f32 stereo

use crate::source::{AudioSourceDescriptor, BitDepth, ByteOrder, SampleEncoding};

/// Scale that maps the signed integer range of `bit_depth` onto [-1.0, 1.0)
pub fn int_sample_scale(bit_depth: BitDepth) -> f64 {
    1.0 / (1u64 << (bit_depth.bits() - 1)) as f64
}

/// Decodes one sample. `bytes` must hold exactly `desc.bytes_per_sample()` bytes.
pub fn decode_sample(bytes: &[u8], desc: &AudioSourceDescriptor) -> f32 {
    let little = desc.byte_order() == ByteOrder::Little;
    let scale = int_sample_scale(desc.bit_depth());

    match (desc.bit_depth(), desc.encoding()) {
        (BitDepth::Eight, _) => (bytes[0] as i8 as f64 * scale) as f32,
        (BitDepth::Sixteen, _) => {
            let raw = [bytes[0], bytes[1]];
            let value = if little {
                i16::from_le_bytes(raw)
            } else {
                i16::from_be_bytes(raw)
            };
            (value as f64 * scale) as f32
        }
        (BitDepth::ThirtyTwo, SampleEncoding::SignedInt) => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            let value = if little {
                i32::from_le_bytes(raw)
            } else {
                i32::from_be_bytes(raw)
            };
            (value as f64 * scale) as f32
        }
        (BitDepth::ThirtyTwo, SampleEncoding::Float) => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            let value = if little {
                f32::from_le_bytes(raw)
            } else {
                f32::from_be_bytes(raw)
            };
            // Garbage from the core must not poison the output
            if value.is_finite() { value } else { 0.0 }
        }
    }
}

/// Decodes whole frames from `bytes` into planar stereo.
///
/// Mono sources are duplicated into both channels. Trailing bytes that do not
/// form a complete frame are ignored. Returns the number of frames written.
pub fn decode_frames(
    bytes: &[u8],
    desc: &AudioSourceDescriptor,
    left: &mut [f32],
    right: &mut [f32],
) -> usize {
    let bytes_per_sample = desc.bytes_per_sample();
    let bytes_per_frame = desc.bytes_per_frame();
    let stereo = desc.channels() == 2;

    let mut frames = 0;
    for (frame, (l, r)) in bytes
        .chunks_exact(bytes_per_frame)
        .zip(left.iter_mut().zip(right.iter_mut()))
    {
        *l = decode_sample(&frame[..bytes_per_sample], desc);
        *r = if stereo {
            decode_sample(&frame[bytes_per_sample..], desc)
        } else {
            *l
        };
        frames += 1;
    }
    frames
}
