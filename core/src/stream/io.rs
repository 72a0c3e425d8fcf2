// ## 📂 File: `src/stream/io.rs`
// ## Chunk-sized reads over arbitrary sources

use std::io::{ErrorKind, Read};

use crate::types::StreamError;

/// Fill `buf` as far as the reader allows; short only at EOF.
pub fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> Result<usize, StreamError> {
    let mut off = 0;
    while off < buf.len() {
        match r.read(&mut buf[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(off)
}

/// Read up to `len` bytes. A result shorter than `len` means the source is exhausted.
pub fn read_exact_or_eof<R: Read + ?Sized>(r: &mut R, len: usize) -> Result<Vec<u8>, StreamError> {
    let mut buf = vec![0u8; len];
    let n = read_full(r, &mut buf)?;
    buf.truncate(n);
    Ok(buf)
}
