// ## 📂 File: `src/envelope/decode.rs`
//! src/envelope/decode.rs
//!
//! Header decoding utilities.
//!
//! Design notes:
//! - Field order must match `encode.rs`.
//! - The header is untrusted input: every length is checked against both the
//!   declared `header_len` and the configured ceiling before allocation.
//! - Short input is `TruncatedHeader`; anything structurally wrong is
//!   `UnsupportedFormat`. Authentication happens later, in `metadata`.

use std::io::Read;

use crate::constants::flags;
use crate::crypto::types::{KdfParams, TAG_LEN};
use crate::envelope::types::{EnvelopeHeader, KdfBlock};
use crate::stream::io::read_full;
use crate::types::StreamError;

#[inline]
fn get_u32(buf: &[u8], i: &mut usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[*i..*i + 4]);
    *i += 4;
    u32::from_be_bytes(b)
}

#[inline]
fn get_bytes<const N: usize>(buf: &[u8], i: &mut usize) -> [u8; N] {
    let mut dst = [0u8; N];
    dst.copy_from_slice(&buf[*i..*i + N]);
    *i += N;
    dst
}

/// Validate magic and return the declared total header length.
fn check_preamble(buf: &[u8], max_header_len: usize) -> Result<usize, StreamError> {
    // A partial magic that already disagrees is a format error, not truncation.
    let seen = buf.len().min(EnvelopeHeader::MAGIC.len());
    if buf[..seen] != EnvelopeHeader::MAGIC[..seen] {
        return Err(StreamError::UnsupportedFormat(format!("bad magic 0x{}", hex::encode(&buf[..seen]))));
    }
    if buf.len() < EnvelopeHeader::PREAMBLE_LEN {
        return Err(StreamError::TruncatedHeader { have: buf.len(), need: EnvelopeHeader::PREAMBLE_LEN });
    }
    let mut i = 4;
    let header_len = get_u32(buf, &mut i) as usize;
    if header_len < EnvelopeHeader::FIXED_LEN + TAG_LEN {
        return Err(StreamError::UnsupportedFormat(format!("header length {header_len} below minimum")));
    }
    if header_len > max_header_len {
        return Err(StreamError::UnsupportedFormat(format!(
            "header length {header_len} exceeds limit {max_header_len}"
        )));
    }
    Ok(header_len)
}

/// Parse a header from the front of `buf`.
///
/// Returns the header and the number of bytes it occupies; the ciphertext body
/// starts right after.
pub fn parse_header(buf: &[u8], max_header_len: usize) -> Result<(EnvelopeHeader, usize), StreamError> {
    let header_len = check_preamble(buf, max_header_len)?;
    if buf.len() < header_len {
        return Err(StreamError::TruncatedHeader { have: buf.len(), need: header_len });
    }
    let buf = &buf[..header_len];

    let mut i = EnvelopeHeader::PREAMBLE_LEN;
    let flag_bits = buf[i];
    i += 1;
    if flag_bits & !flags::KNOWN != 0 {
        return Err(StreamError::UnsupportedFormat(format!("unknown flag bits 0x{flag_bits:02x}")));
    }
    let has_kdf = flag_bits & flags::PASSWORD_PROTECTED != 0;

    // Every fixed field must fit before reading the blob length.
    let fixed = EnvelopeHeader::encoded_len_for(has_kdf, 0);
    if header_len < fixed {
        return Err(StreamError::UnsupportedFormat(format!(
            "header length {header_len} too small for flags 0x{flag_bits:02x}"
        )));
    }

    let meta_salt = get_bytes::<16>(buf, &mut i);
    let meta_nonce = get_bytes::<12>(buf, &mut i);
    let kdf = if has_kdf {
        let salt = get_bytes::<16>(buf, &mut i);
        let iterations = get_u32(buf, &mut i);
        let memory_kib = get_u32(buf, &mut i);
        let parallelism = get_u32(buf, &mut i);
        Some(KdfBlock { salt, params: KdfParams { memory_kib, iterations, parallelism } })
    } else {
        None
    };
    let header_nonce = get_bytes::<12>(buf, &mut i);
    let blob_len = get_u32(buf, &mut i) as usize;

    if fixed + blob_len != header_len {
        return Err(StreamError::UnsupportedFormat(format!(
            "blob length {blob_len} inconsistent with header length {header_len}"
        )));
    }
    if blob_len < TAG_LEN {
        return Err(StreamError::UnsupportedFormat(format!("metadata blob of {blob_len} bytes")));
    }
    let blob = buf[i..].to_vec();

    Ok((
        EnvelopeHeader { flags: flag_bits, meta_salt, meta_nonce, kdf, header_nonce, blob },
        header_len,
    ))
}

/// Read exactly one header from a stream, leaving the reader at the first body byte.
pub fn read_header<R: Read + ?Sized>(r: &mut R, max_header_len: usize) -> Result<EnvelopeHeader, StreamError> {
    let mut preamble = [0u8; EnvelopeHeader::PREAMBLE_LEN];
    let got = read_full(r, &mut preamble)?;
    let header_len = check_preamble(&preamble[..got], max_header_len)?;

    let mut buf = vec![0u8; header_len];
    buf[..EnvelopeHeader::PREAMBLE_LEN].copy_from_slice(&preamble);
    let got = read_full(r, &mut buf[EnvelopeHeader::PREAMBLE_LEN..])?;
    let have = EnvelopeHeader::PREAMBLE_LEN + got;
    if have < header_len {
        return Err(StreamError::TruncatedHeader { have, need: header_len });
    }

    let (header, _) = parse_header(&buf, max_header_len)?;
    Ok(header)
}
