//! archive/tar.rs
//! USTAR headers: 512-byte blocks, NUL-terminated octal numeric fields.

use chrono::{DateTime, Utc};

use crate::archive::types::ArchiveError;

pub const BLOCK_LEN: usize = 512;
pub const NAME_LEN: usize = 100;
pub const PREFIX_LEN: usize = 155;

const MODE_0644: u64 = 0o644;
/// 11 octal digits in a 12-byte field.
const MAX_OCTAL_11: u64 = (1 << 33) - 1;

/// Split a long path into (name, prefix) at a '/', truncating whatever still
/// exceeds the field sizes.
pub fn split_name(path: &str) -> (Vec<u8>, Vec<u8>) {
    let bytes = path.as_bytes();
    if bytes.len() <= NAME_LEN {
        return (bytes.to_vec(), Vec::new());
    }

    let mut name = bytes;
    let mut prefix: &[u8] = &[];
    if bytes.len() <= NAME_LEN + PREFIX_LEN {
        let search = &bytes[..bytes.len().min(PREFIX_LEN + 1)];
        if let Some(idx) = search.iter().rposition(|&b| b == b'/') {
            if idx > 0 {
                prefix = &bytes[..idx];
                name = &bytes[idx + 1..];
            }
        }
    }

    let name = &name[..name.len().min(NAME_LEN)];
    let prefix = &prefix[..prefix.len().min(PREFIX_LEN)];
    (name.to_vec(), prefix.to_vec())
}

/// Zero-padded octal, `width - 1` digits and a trailing NUL.
fn octal(value: u64, width: usize) -> Vec<u8> {
    let mut out = format!("{:0w$o}", value, w = width - 1).into_bytes();
    out.push(0);
    out
}

fn put(header: &mut [u8; BLOCK_LEN], offset: usize, field_len: usize, data: &[u8]) {
    let n = data.len().min(field_len);
    header[offset..offset + n].copy_from_slice(&data[..n]);
}

pub fn header(path: &str, size: u64, modified: &DateTime<Utc>) -> Result<[u8; BLOCK_LEN], ArchiveError> {
    if path.is_empty() {
        return Err(ArchiveError::InvalidName(path.to_string()));
    }
    if size > MAX_OCTAL_11 {
        return Err(ArchiveError::TooLarge(format!("entry {path} of {size} bytes exceeds USTAR size field")));
    }
    let mtime = u64::try_from(modified.timestamp()).unwrap_or(0).min(MAX_OCTAL_11);
    let (name, prefix) = split_name(path);

    let mut h = [0u8; BLOCK_LEN];
    put(&mut h, 0, 100, &name);
    put(&mut h, 100, 8, &octal(MODE_0644, 8));
    put(&mut h, 108, 8, &octal(0, 8));       // uid
    put(&mut h, 116, 8, &octal(0, 8));       // gid
    put(&mut h, 124, 12, &octal(size, 12));
    put(&mut h, 136, 12, &octal(mtime, 12));
    put(&mut h, 148, 8, b"        ");        // checksum placeholder
    put(&mut h, 156, 1, b"0");               // regular file
    put(&mut h, 257, 6, b"ustar\0");
    put(&mut h, 263, 2, b"00");
    put(&mut h, 345, 155, &prefix);

    let sum: u32 = h.iter().map(|&b| u32::from(b)).sum();
    let mut checksum = format!("{sum:06o}").into_bytes();
    checksum.extend_from_slice(b"\0 ");
    put(&mut h, 148, 8, &checksum);
    Ok(h)
}

/// Zero bytes that bring `size` up to a block boundary.
#[inline]
pub fn padding(size: u64) -> usize {
    let rem = (size % BLOCK_LEN as u64) as usize;
    if rem == 0 { 0 } else { BLOCK_LEN - rem }
}

/// Two zero blocks.
pub fn end_of_archive() -> Vec<u8> {
    vec![0u8; 2 * BLOCK_LEN]
}

/// Exact stream length; every size must be known.
pub fn predicted_len(sizes: impl IntoIterator<Item = Option<u64>>) -> Option<u64> {
    let mut total = 2 * BLOCK_LEN as u64;
    for size in sizes {
        let size = size?;
        total += BLOCK_LEN as u64 + size + padding(size) as u64;
    }
    Some(total)
}
