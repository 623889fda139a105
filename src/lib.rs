//! Reads and writes individual bits, bytes, variable-length signed integers and
//! length-prefixed UTF-8 strings against a forward-only byte stream.
//!
//! Bits are packed most-significant first within each byte. Whole bytes written while the
//! writer sits mid-byte straddle the byte boundary, so flag bits can be packed directly ahead of
//! payload bytes without any manual shift/mask arithmetic.
//!
//! The wire format for variable-length integers ("dynamic numbers") is described on
//! [`BitWriter::write_dynamic_number`] and in the [`format`] module.
//!
//! Both [`BitWriter`] and [`BitReader`] talk to the outside world through the minimal
//! [`ByteSink`] and [`ByteSource`] traits. With the `std` feature every [`std::io::Write`] is a
//! sink and every [`std::io::Read`] is a source.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![forbid(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(missing_docs)]

extern crate alloc;

pub mod format;
mod reader;
mod stream;
mod writer;


pub use reader::{BitReader, ReaderError};
pub use stream::{ByteSink, ByteSource};
pub use writer::{BitWriter, WriterError};
