//! The byte-at-a-time boundary between the bit codec and whatever transport carries the bytes.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(not(feature = "std"))]
use core::convert::Infallible;

#[cfg(feature = "std")]
use std::io;

/// A forward-only source of bytes.
pub trait ByteSource {
    /// Error reported by the underlying transport.
    type Error;

    /// Returns the next byte, or `Ok(None)` once the source has no further bytes.
    ///
    /// This may block until a byte is available.
    fn next_byte(&mut self) -> Result<Option<u8>, Self::Error>;
}

/// A forward-only sink for bytes.
pub trait ByteSink {
    /// Error reported by the underlying transport.
    type Error;

    /// Writes a single byte.
    fn put_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Pushes any bytes buffered by the sink itself further downstream.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(feature = "std")]
impl<R: io::Read + ?Sized> ByteSource for R {
    type Error = io::Error;

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(feature = "std")]
impl<W: io::Write + ?Sized> ByteSink for W {
    type Error = io::Error;

    fn put_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

#[cfg(not(feature = "std"))]
impl ByteSource for &[u8] {
    type Error = Infallible;

    fn next_byte(&mut self) -> Result<Option<u8>, Infallible> {
        match self.split_first() {
            Some((&first, rest)) => {
                *self = rest;
                Ok(Some(first))
            }
            None => Ok(None),
        }
    }
}

#[cfg(not(feature = "std"))]
impl ByteSink for Vec<u8> {
    type Error = Infallible;

    fn put_byte(&mut self, byte: u8) -> Result<(), Infallible> {
        self.push(byte);
        Ok(())
    }
}

#[cfg(not(feature = "std"))]
impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    type Error = S::Error;

    fn next_byte(&mut self) -> Result<Option<u8>, S::Error> {
        (**self).next_byte()
    }
}

#[cfg(not(feature = "std"))]
impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    type Error = S::Error;

    fn put_byte(&mut self, byte: u8) -> Result<(), S::Error> {
        (**self).put_byte(byte)
    }

    fn flush(&mut self) -> Result<(), S::Error> {
        (**self).flush()
    }
}
