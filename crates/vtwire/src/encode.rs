//! Sink-oriented write helpers for control sequence emission.
//!
//! The renderer assembles its output from many tiny fragments (sequence
//! introducers, decimal parameters, cluster text). These helpers write each
//! fragment into any `io::Write` sink without heap allocation on the fast
//! path and surface short writes as [`EncodeError::BufferOverflow`] so that
//! fixed-size buffers can be used as sinks too.

use core::fmt;
use std::io::{self, Write};

/// Error type for encoding operations.
#[derive(Debug)]
pub enum EncodeError {
    /// The sink was too small; carries the number of bytes that did not fit.
    BufferOverflow(usize),
    /// The sink reported an I/O error.
    Io(std::io::Error),
}

impl From<EncodeError> for io::Error {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::BufferOverflow(n) => io::Error::new(
                io::ErrorKind::WriteZero,
                format!("buffer overflow: {n} bytes could not be written"),
            ),
            EncodeError::Io(e) => e,
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Io(e) => Some(e),
            EncodeError::BufferOverflow(_) => None,
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BufferOverflow(n) => {
                write!(f, "buffer overflow: {n} bytes could not be written")
            }
            EncodeError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

struct CountingWriter<W> {
    inner: W,
    written: usize,
    overflow: usize,
}

impl<W: io::Write> CountingWriter<W> {
    #[inline]
    fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            overflow: 0,
        }
    }
}

impl<W: io::Write> io::Write for CountingWriter<W> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let requested = buf.len();
        let n = self.inner.write(buf)?;
        self.written += n;
        if n < requested {
            self.overflow += requested - n;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy a byte slice into the provided sink, returning the number of bytes
/// written.
///
/// # Errors
///
/// Return an error if the sink is too small to hold the data or reports an
/// I/O error.
#[inline]
pub fn write_bytes_into<W: io::Write + ?Sized>(
    sink: &mut W,
    s: &[u8],
) -> Result<usize, EncodeError> {
    let mut w = CountingWriter::new(sink);
    match w.write(s) {
        Err(ref e) if e.kind() == io::ErrorKind::WriteZero => {
            Err(EncodeError::BufferOverflow(w.overflow))
        }
        Err(e) => Err(EncodeError::Io(e)),
        Ok(_n) if w.overflow > 0 => Err(EncodeError::BufferOverflow(w.overflow)),
        Ok(n) => Ok(n),
    }
}

/// Copy a UTF-8 string into the provided sink, returning the number of bytes
/// written.
///
/// # Errors
///
/// Return an error if the sink is too small to hold the string.
#[inline]
pub fn write_str_into<W: io::Write + ?Sized>(sink: &mut W, s: &str) -> Result<usize, EncodeError> {
    write_bytes_into(sink, s.as_bytes())
}

/// Write an integer to a sink without allocation.
///
/// Uses the `itoa` crate for efficient integer-to-string conversion.
///
/// # Errors
///
/// Return an error if the sink is too small to hold the integer.
#[inline]
pub fn write_int<W: io::Write + ?Sized>(
    sink: &mut W,
    value: impl itoa::Integer,
) -> Result<usize, EncodeError> {
    let mut buffer = itoa::Buffer::new();
    let s = buffer.format(value);
    write_str_into(sink, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_int_into_vec() {
        let mut buf = Vec::new();
        assert_eq!(write_int(&mut buf, 1049u16).unwrap(), 4);
        assert_eq!(buf, b"1049");
    }

    #[test]
    fn test_write_str_into_slice() {
        let mut storage = [0u8; 4];
        let written = write_str_into(&mut &mut storage[..], "\x1b[5n").unwrap();
        assert_eq!(written, 4);
        assert_eq!(&storage, b"\x1b[5n");
    }

    #[test]
    fn test_overflow_reports_missing_bytes() {
        let mut storage = [0u8; 2];
        match write_str_into(&mut &mut storage[..], "\x1b[5n") {
            Err(EncodeError::BufferOverflow(n)) => assert_eq!(n, 2),
            other => panic!("expected overflow, got {other:?}"),
        }
    }
}
