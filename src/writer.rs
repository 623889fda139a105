#[cfg(feature = "std")]
use std::io;

use log::trace;

use crate::format::{MagnitudeTier, BITS_IN_BYTE};
use crate::stream::ByteSink;

/// Result type for [`BitWriter`] operations over the sink `S`.
pub type Result<T, S> = core::result::Result<T, WriterError<<S as ByteSink>::Error>>;

/// Packs bits, bytes, dynamic numbers and strings into a [`ByteSink`].
///
/// Bits are placed most-significant first. A byte is handed to the sink as soon as all eight of
/// its bits are known; a partially filled byte stays in the writer until it is completed or
/// until [`Self::align`], [`Self::flush`] or [`Self::close`] pads it with zero bits.
///
/// Single-bit, single-byte and alignment writes hand their byte to the sink before they update
/// the writer's own state, so one that fails with [`WriterError::Sink`] leaves the pending bits
/// as they were and can be retried. Multi-byte writes keep whatever they wrote before the failure.
///
/// Dropping a writer does not flush it. Call [`Self::close`] to emit the final partial byte.
#[derive(Debug)]
pub struct BitWriter<S> {
    sink: S,

    /// The byte being assembled. Bits at and after `bit_pos` are always zero.
    pending_byte: u8,

    /// Bits already placed into `pending_byte`, in `0..8`.
    bit_pos: u8,
}

impl<S: Default> Default for BitWriter<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> BitWriter<S> {
    /// Creates a writer over `sink`.
    pub const fn new(sink: S) -> Self {
        Self {
            sink,
            pending_byte: 0,
            bit_pos: 0,
        }
    }

    /// Extracts the underlying sink without flushing. Bits of a partially filled byte are lost.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Accesses the underlying sink.
    pub const fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Accesses the underlying sink mutably.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Bits already placed into the pending byte (0-7).
    #[inline]
    pub const fn bit_pos(&self) -> u8 {
        self.bit_pos
    }

    /// Returns `true` if the next write starts at a byte boundary.
    #[inline]
    pub const fn is_aligned(&self) -> bool {
        self.bit_pos == 0
    }
}

impl<S: ByteSink> BitWriter<S> {
    fn put(&mut self, byte: u8) -> Result<(), S> {
        self.sink.put_byte(byte).map_err(WriterError::Sink)
    }

    /// Writes a single bit. Only the lowest bit of `bit` is used.
    pub fn write_bit(&mut self, bit: u8) -> Result<(), S> {
        let byte = self.pending_byte | ((bit & 1) << (BITS_IN_BYTE - self.bit_pos - 1));

        if self.bit_pos + 1 == BITS_IN_BYTE {
            self.put(byte)?;
            self.pending_byte = 0;
            self.bit_pos = 0;
        } else {
            self.pending_byte = byte;
            self.bit_pos += 1;
        }

        Ok(())
    }

    /// Writes a `bool` as a single bit. True is encoded as 1. False is encoded as 0.
    pub fn write_bool(&mut self, value: bool) -> Result<(), S> {
        self.write_bit(u8::from(value))
    }

    /// Writes the low `count` bits of `value`, most-significant first. `count` is clamped to 64.
    pub fn write_bits(&mut self, value: u64, count: u32) -> Result<(), S> {
        let count = count.min(u64::BITS);
        for i in (0..count).rev() {
            self.write_bit((value >> i) as u8)?;
        }
        Ok(())
    }

    /// Writes a full byte.
    ///
    /// If the writer sits mid-byte, the high bits of `value` complete the pending byte, which is
    /// emitted, and the low bits start the next one. Either way exactly one byte reaches the
    /// sink and [`Self::bit_pos`] is unchanged.
    pub fn write_byte(&mut self, value: u8) -> Result<(), S> {
        if self.bit_pos == 0 {
            return self.put(value);
        }

        self.put(self.pending_byte | (value >> self.bit_pos))?;
        self.pending_byte = value << (BITS_IN_BYTE - self.bit_pos);
        Ok(())
    }

    /// Writes every byte of `bytes`, as if by [`Self::write_byte`].
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), S> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Writes a signed integer using a variable number of bits, with fewer bits for values of
    /// smaller magnitude.
    ///
    /// Zero is a single `0` bit. Any other value is a `1` bit, a sign bit (`1` for negative),
    /// a tier header and the magnitude as 0, 1, 2, 4 or 8 big-endian bytes:
    ///
    /// ```text
    /// 1S0          magnitude 1
    /// 1S10   + 1   magnitude up to 255
    /// 1S110  + 2   magnitude up to 65535
    /// 1S1110 + 4   magnitude up to 4294967295
    /// 1S1111 + 8   any remaining magnitude
    /// ```
    ///
    /// That is 1, 3, 12, 21, 38 or 70 bits in total. See [`crate::format`].
    pub fn write_dynamic_number(&mut self, value: i64) -> Result<(), S> {
        if value == 0 {
            return self.write_bit(0);
        }

        self.write_bit(1)?;
        self.write_bool(value < 0)?;

        // `unsigned_abs` keeps `i64::MIN` as 2^63 instead of wrapping.
        let magnitude = value.unsigned_abs();
        let tier = MagnitudeTier::for_magnitude(magnitude);
        let (header, header_len) = tier.header();
        self.write_bits(header, header_len)?;

        let mut buf = [0u8; 8];
        self.write_bytes(tier.encode(magnitude, &mut buf))
    }

    /// Writes raw bytes in length-prefixed form.
    ///
    /// The length is written as a dynamic number. If `align` is set and the length is non-zero,
    /// the writer aligns to a byte boundary before the contents.
    pub fn write_str_bytes(&mut self, bytes: &[u8], align: bool) -> Result<(), S> {
        let len = i64::try_from(bytes.len()).map_err(|_| WriterError::CannotEncode)?;
        self.write_dynamic_number(len)?;

        if align && !bytes.is_empty() {
            self.align()?;
        }

        self.write_bytes(bytes)
    }

    /// Writes a UTF-8 string in length-prefixed form. See [`Self::write_str_bytes`].
    pub fn write_string(&mut self, s: &str, align: bool) -> Result<(), S> {
        self.write_str_bytes(s.as_bytes(), align)
    }

    /// Pads the pending byte with zero bits and emits it, so that the next write starts at a
    /// byte boundary.
    ///
    /// Up to 7 bits are wasted. Does nothing if the writer is already aligned.
    pub fn align(&mut self) -> Result<(), S> {
        if self.bit_pos == 0 {
            return Ok(());
        }

        trace!("padding {} bits to align", BITS_IN_BYTE - self.bit_pos);
        self.put(self.pending_byte)?;
        self.pending_byte = 0;
        self.bit_pos = 0;
        Ok(())
    }

    /// Aligns, then flushes the sink.
    pub fn flush(&mut self) -> Result<(), S> {
        self.align()?;
        self.sink.flush().map_err(WriterError::Sink)
    }

    /// Flushes any partial byte and releases the sink.
    pub fn close(mut self) -> Result<S, S> {
        self.flush()?;
        Ok(self.sink)
    }
}

#[cfg(feature = "std")]
impl<W: io::Write> io::Write for BitWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for (i, &b) in buf.iter().enumerate() {
            match self.write_byte(b) {
                Ok(()) => {}
                Err(_) if i > 0 => return Ok(i),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(BitWriter::flush(self)?)
    }
}

/// Error type for `BitWriter`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriterError<E> {
    /// Indicates that a value cannot be encoded. This is used for strings that are too long for
    /// their length to be a dynamic number.
    CannotEncode,

    /// The underlying sink failed.
    Sink(E),
}

impl<E: core::fmt::Display> core::fmt::Display for WriterError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CannotEncode => f.write_str("The data cannot be encoded"),
            Self::Sink(e) => write!(f, "Failed to write to sink: {e}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for WriterError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Sink(e) => Some(e),
            Self::CannotEncode => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<WriterError<io::Error>> for io::Error {
    fn from(e: WriterError<io::Error>) -> Self {
        match e {
            WriterError::Sink(e) => e,
            WriterError::CannotEncode => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}
