use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "std")]
use std::io;

use log::{debug, trace};

use crate::format::{apply_sign, low_order_mask, MagnitudeTier, BITS_IN_BYTE};
use crate::stream::ByteSource;

/// Result type for [`BitReader`] operations over the source `S`.
pub type Result<T, S> = core::result::Result<T, ReaderError<<S as ByteSource>::Error>>;

// Upper bound on the allocation made up front for a length-prefixed string. The declared length
// comes from the stream, so larger strings grow the buffer as bytes actually arrive.
const MAX_PREALLOC: usize = 4096;

/// Reads bits, bytes, dynamic numbers and strings from a [`ByteSource`].
///
/// Bytes are pulled from the source lazily, one at a time, and dispensed most-significant bit
/// first. Once the source reports end-of-data the reader is exhausted for good: bit-level reads
/// return `Ok(None)` from then on.
///
/// A reader must not be shared between threads of control without external synchronization;
/// all state lives in plain fields.
#[derive(Debug)]
pub struct BitReader<S> {
    source: S,

    /// The byte currently being dispensed.
    current_byte: u8,

    /// Bits already consumed from `current_byte`. `8` means the next read must fetch a fresh
    /// byte from the source.
    bit_pos: u8,

    exhausted: bool,

    /// An error hit by `io::Read::read` after it had already filled part of the buffer. It is
    /// returned by the next call.
    #[cfg(feature = "std")]
    deferred_error: Option<io::Error>,
}

impl<S> BitReader<S> {
    /// Creates a reader over `source`. No byte is pulled until the first read.
    pub const fn new(source: S) -> Self {
        Self {
            source,
            current_byte: 0,
            bit_pos: BITS_IN_BYTE,
            exhausted: false,
            #[cfg(feature = "std")]
            deferred_error: None,
        }
    }

    /// Releases the underlying source. Unconsumed bits of the current byte are lost.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Accesses the underlying source.
    pub const fn get_ref(&self) -> &S {
        &self.source
    }

    /// Offset (0-7) of the next bit within the current byte.
    #[inline]
    pub const fn bit_pos(&self) -> u8 {
        self.bit_pos % BITS_IN_BYTE
    }

    /// Returns `true` if the next read starts at a byte boundary.
    #[inline]
    pub const fn is_aligned(&self) -> bool {
        self.bit_pos() == 0
    }

    /// Returns `true` once the source has reported end-of-data.
    #[inline]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Discards the remainder of the current byte, so that the next read starts with a fresh
    /// byte from the source.
    ///
    /// Does nothing if the reader is already at a byte boundary.
    pub fn align(&mut self) {
        if self.bit_pos != 0 && self.bit_pos != BITS_IN_BYTE {
            trace!("discarding {} bits to align", BITS_IN_BYTE - self.bit_pos);
            self.bit_pos = BITS_IN_BYTE;
        }
    }
}

impl<S: ByteSource> BitReader<S> {
    /// Makes sure `current_byte` has unread bits. Returns `false` at end-of-data.
    fn prime(&mut self) -> Result<bool, S> {
        if self.exhausted {
            return Ok(false);
        }

        if self.bit_pos == BITS_IN_BYTE {
            match self.source.next_byte().map_err(ReaderError::Source)? {
                Some(b) => {
                    self.current_byte = b;
                    self.bit_pos = 0;
                }
                None => {
                    trace!("source reached end of data");
                    self.exhausted = true;
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Reads a single bit, returning `0` or `1`, or `None` at end-of-data.
    pub fn read_bit(&mut self) -> Result<Option<u8>, S> {
        if !self.prime()? {
            return Ok(None);
        }

        let bit = (self.current_byte >> (BITS_IN_BYTE - self.bit_pos - 1)) & 1;
        self.bit_pos += 1;
        Ok(Some(bit))
    }

    /// Reads a single bit as a `bool`, or `None` at end-of-data.
    pub fn read_bool(&mut self) -> Result<Option<bool>, S> {
        Ok(self.read_bit()?.map(|bit| bit != 0))
    }

    /// Reads up to 64 bits, most-significant first, and returns them in the low bits of the
    /// result. `count` is clamped to 64.
    ///
    /// Returns `None` if the source was already at end-of-data. If the source ends after some
    /// but not all bits were read, this returns `Err(ReaderError::NeedsMoreData)`.
    pub fn read_bits(&mut self, count: u32) -> Result<Option<u64>, S> {
        let count = count.min(u64::BITS);
        let mut bits: u64 = 0;

        for i in 0..count {
            match self.read_bit()? {
                Some(bit) => bits = (bits << 1) | u64::from(bit),
                None if i == 0 => return Ok(None),
                None => return Err(ReaderError::NeedsMoreData),
            }
        }

        Ok(Some(bits))
    }

    /// Reads a full byte, or `None` at end-of-data.
    ///
    /// If the reader sits mid-byte, the result is composed from the remaining bits of the
    /// current byte and the leading bits of the following one. In that case the read has
    /// already committed to one more source byte, so running out of data is an error
    /// ([`ReaderError::InsufficientData`]) rather than a clean end-of-data.
    pub fn read_byte(&mut self) -> Result<Option<u8>, S> {
        if !self.prime()? {
            return Ok(None);
        }

        if self.bit_pos == 0 {
            self.bit_pos = BITS_IN_BYTE;
            return Ok(Some(self.current_byte));
        }

        let bits_remaining = BITS_IN_BYTE - self.bit_pos;
        let high = (self.current_byte & low_order_mask(bits_remaining)) << self.bit_pos;

        let Some(next) = self.source.next_byte().map_err(ReaderError::Source)? else {
            debug!("source ended with {bits_remaining} bits left in a straddling byte read");
            self.exhausted = true;
            return Err(ReaderError::InsufficientData);
        };

        // `bit_pos` bits of the new byte are now consumed, same offset as before.
        self.current_byte = next;
        Ok(Some(high | (next >> bits_remaining)))
    }

    /// Reads a small array of bytes, with a constant length.
    pub fn read_cbytes<const N: usize>(&mut self) -> Result<[u8; N], S> {
        let mut out = [0u8; N];
        for b in out.iter_mut() {
            *b = self.require_byte()?;
        }
        Ok(out)
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, S> {
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            out.push(self.require_byte()?);
        }
        Ok(out)
    }

    /// Reads a dynamic number, as written by
    /// [`BitWriter::write_dynamic_number`](crate::BitWriter::write_dynamic_number).
    ///
    /// Running out of data anywhere inside the number is an error. A magnitude that does not
    /// fit an `i64` with the decoded sign is reported as [`ReaderError::Invalid`].
    pub fn read_dynamic_number(&mut self) -> Result<i64, S> {
        if self.require_bit()? == 0 {
            return Ok(0);
        }

        let negative = self.require_bit()? == 1;

        let tier = if self.require_bit()? == 0 {
            MagnitudeTier::One
        } else if self.require_bit()? == 0 {
            MagnitudeTier::U8
        } else if self.require_bit()? == 0 {
            MagnitudeTier::U16
        } else if self.require_bit()? == 0 {
            MagnitudeTier::U32
        } else {
            MagnitudeTier::U64
        };

        let mut buf = [0u8; 8];
        let payload = &mut buf[..tier.byte_len()];
        for b in payload.iter_mut() {
            *b = self.require_byte()?;
        }

        let magnitude = tier.decode(payload).ok_or(ReaderError::Invalid)?;
        apply_sign(magnitude, negative).ok_or(ReaderError::Invalid)
    }

    /// Reads a length-prefixed run of bytes without validating it as UTF-8.
    ///
    /// The length is a dynamic number. If `align` is set and the length is non-zero, the reader
    /// aligns to a byte boundary before the contents, mirroring
    /// [`BitWriter::write_string`](crate::BitWriter::write_string).
    pub fn read_str_bytes(&mut self, align: bool) -> Result<Vec<u8>, S> {
        let len = self.read_dynamic_number()?;
        let Ok(len) = usize::try_from(len) else {
            return Err(ReaderError::Invalid);
        };

        if align && len > 0 {
            self.align();
        }

        self.read_bytes(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// The contents must be well-formed UTF-8; otherwise this returns
    /// `Err(ReaderError::Invalid)`.
    pub fn read_string(&mut self, align: bool) -> Result<String, S> {
        let bytes = self.read_str_bytes(align)?;
        String::from_utf8(bytes).map_err(|_| ReaderError::Invalid)
    }

    /// Reads a length-prefixed UTF-8 string, replacing ill-formed sequences with the Unicode
    /// replacement character.
    #[cfg(feature = "std")]
    pub fn read_string_lossy(&mut self, align: bool) -> Result<String, S> {
        let bytes = self.read_str_bytes(align)?;
        match String::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    /// Reads a length-prefixed string and returns it as a `bstr::BString`.
    ///
    /// The caller must handle validating that the string is well-formed UTF-8, if necessary.
    #[cfg(feature = "bstr")]
    pub fn read_bstring(&mut self, align: bool) -> Result<bstr::BString, S> {
        Ok(bstr::BString::from(self.read_str_bytes(align)?))
    }

    fn require_bit(&mut self) -> Result<u8, S> {
        self.read_bit()?.ok_or(ReaderError::NeedsMoreData)
    }

    fn require_byte(&mut self) -> Result<u8, S> {
        self.read_byte()?.ok_or(ReaderError::NeedsMoreData)
    }
}

#[cfg(feature = "std")]
impl<R: io::Read> io::Read for BitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }

        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.read_byte() {
                Ok(Some(b)) => *slot = b,
                Ok(None) => break,
                Err(e) if n > 0 => {
                    // The bytes already handed out must not be reported as a failure.
                    self.deferred_error = Some(e.into());
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            n += 1;
        }
        Ok(n)
    }
}

/// Error type for `BitReader`
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReaderError<E> {
    /// A byte read began mid-byte and the source ended before the byte could be completed.
    ///
    /// Unlike a clean end-of-data, part of a byte was already consumed in the expectation that
    /// more data follows.
    InsufficientData,

    /// The source ended inside a value that needs more data, such as a dynamic number or the
    /// contents of a string.
    NeedsMoreData,

    /// The input is malformed: a string length is negative or too large, string contents are
    /// not UTF-8, or a dynamic number's magnitude is out of range.
    Invalid,

    /// The underlying source failed.
    Source(E),
}

impl<E: core::fmt::Display> core::fmt::Display for ReaderError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InsufficientData => f.write_str("Insufficient data remaining to read byte"),
            Self::NeedsMoreData => f.write_str("The input ended in the middle of a value"),
            Self::Invalid => f.write_str("The input data is malformed"),
            Self::Source(e) => write!(f, "Failed to read from source: {e}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for ReaderError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Source(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<ReaderError<io::Error>> for io::Error {
    fn from(e: ReaderError<io::Error>) -> Self {
        match e {
            ReaderError::Source(e) => e,
            ReaderError::Invalid => io::Error::new(io::ErrorKind::InvalidData, e),
            ReaderError::InsufficientData | ReaderError::NeedsMoreData => {
                io::Error::new(io::ErrorKind::UnexpectedEof, e)
            }
        }
    }
}
