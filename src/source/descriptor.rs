use crate::error::{Result, RetroSonicError};

/// Bit depth of one source sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BitDepth {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            32 => Ok(Self::ThirtyTwo),
            other => Err(RetroSonicError::AudioFormat(format!(
                "Unsupported bit depth {} (expected 8, 16 or 32)",
                other
            ))),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }
}

/// How the bits of a sample are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleEncoding {
    /// Two's complement signed integer
    #[default]
    SignedInt,
    /// IEEE 754 single precision, only valid at 32 bits
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Immutable description of one emulation audio stream.
///
/// Built once when the audio graph is set up and replaced wholesale on
/// reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSourceDescriptor {
    channels: u16,
    bit_depth: BitDepth,
    encoding: SampleEncoding,
    sample_rate: f64,
    byte_order: ByteOrder,
}

/// Highest native rate accepted for a source stream, in Hz
pub const MAX_SOURCE_SAMPLE_RATE: f64 = 768_000.0;

impl AudioSourceDescriptor {
    /// Creates a descriptor for signed integer samples in native byte order
    pub fn new(channels: u32, bit_depth: u32, sample_rate: f64) -> Result<Self> {
        if channels != 1 && channels != 2 {
            return Err(RetroSonicError::AudioFormat(format!(
                "Unsupported channel count {} (expected 1 or 2)",
                channels
            )));
        }

        if !sample_rate.is_finite() || sample_rate <= 0.0 || sample_rate > MAX_SOURCE_SAMPLE_RATE
        {
            return Err(RetroSonicError::AudioFormat(format!(
                "Invalid source sample rate {} (expected 0 < rate <= {})",
                sample_rate, MAX_SOURCE_SAMPLE_RATE
            )));
        }

        Ok(Self {
            channels: channels as u16,
            bit_depth: BitDepth::from_bits(bit_depth)?,
            encoding: SampleEncoding::SignedInt,
            sample_rate,
            byte_order: ByteOrder::native(),
        })
    }

    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Result<Self> {
        if encoding == SampleEncoding::Float && self.bit_depth != BitDepth::ThirtyTwo {
            return Err(RetroSonicError::AudioFormat(format!(
                "Float samples must be 32-bit, got {}-bit",
                self.bit_depth.bits()
            )));
        }
        self.encoding = encoding;
        Ok(self)
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bit_depth.bytes_per_sample()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }
}
