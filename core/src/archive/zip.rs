// ## 📂 File: `src/archive/zip.rs`
//! src/archive/zip.rs
//!
//! Streaming ZIP records (all integers little-endian).
//!
//! Design notes:
//! - General purpose flag bit 3: CRC and sizes are zero in the local header and
//!   follow the data in a data descriptor, so nothing is ever rewritten.
//! - Bit 11: names are UTF-8.
//! - Classic ZIP only. Anything that would need ZIP64 is `TooLarge`.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::archive::types::{ArchiveEntry, ArchiveError};

pub const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
pub const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

/// Version 2.0 (made by and needed to extract).
pub const VERSION_20: u16 = 0x0014;
/// Data descriptor + UTF-8 names.
pub const FLAGS: u16 = 0x0808;

pub const LOCAL_HEADER_LEN: usize = 30;
pub const DATA_DESCRIPTOR_LEN: usize = 16;
pub const CENTRAL_HEADER_LEN: usize = 46;
pub const END_OF_CENTRAL_DIR_LEN: usize = 22;

pub const MAX_ENTRIES: usize = u16::MAX as usize;

#[inline]
fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn fit_u32(what: &str, v: u64) -> Result<u32, ArchiveError> {
    u32::try_from(v).map_err(|_| ArchiveError::TooLarge(format!("{what} {v} needs ZIP64")))
}

fn name_bytes(name: &str) -> Result<&[u8], ArchiveError> {
    if name.is_empty() {
        return Err(ArchiveError::InvalidName(name.to_string()));
    }
    if name.len() > u16::MAX as usize {
        return Err(ArchiveError::TooLarge(format!("entry name of {} bytes", name.len())));
    }
    Ok(name.as_bytes())
}

/// MS-DOS (time, date) in UTC, clamped to the representable 1980..=2107 range.
pub fn dos_datetime(dt: &DateTime<Utc>) -> (u16, u16) {
    if dt.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    if dt.year() > 2107 {
        return ((23 << 11) | (59 << 5) | (58 >> 1), (127 << 9) | (12 << 5) | 31);
    }
    let time = (dt.hour() << 11) | (dt.minute() << 5) | (dt.second() >> 1);
    let date = ((dt.year() as u32 - 1980) << 9) | (dt.month() << 5) | dt.day();
    (time as u16, date as u16)
}

pub fn local_header(name: &str, modified: &DateTime<Utc>, method: u16) -> Result<Vec<u8>, ArchiveError> {
    let name = name_bytes(name)?;
    let (time, date) = dos_datetime(modified);

    let mut out = Vec::with_capacity(LOCAL_HEADER_LEN + name.len());
    put_u32(&mut out, LOCAL_HEADER_SIG);
    put_u16(&mut out, VERSION_20);         // version needed
    put_u16(&mut out, FLAGS);
    put_u16(&mut out, method);
    put_u16(&mut out, time);
    put_u16(&mut out, date);
    put_u32(&mut out, 0);                  // crc32, in descriptor
    put_u32(&mut out, 0);                  // compressed size, in descriptor
    put_u32(&mut out, 0);                  // uncompressed size, in descriptor
    put_u16(&mut out, name.len() as u16);
    put_u16(&mut out, 0);                  // extra length
    out.extend_from_slice(name);
    Ok(out)
}

pub fn data_descriptor(crc32: u32, compressed_size: u64, size: u64) -> Result<Vec<u8>, ArchiveError> {
    let mut out = Vec::with_capacity(DATA_DESCRIPTOR_LEN);
    put_u32(&mut out, DATA_DESCRIPTOR_SIG);
    put_u32(&mut out, crc32);
    put_u32(&mut out, fit_u32("compressed size", compressed_size)?);
    put_u32(&mut out, fit_u32("size", size)?);
    Ok(out)
}

pub fn central_header(entry: &ArchiveEntry) -> Result<Vec<u8>, ArchiveError> {
    let name = name_bytes(&entry.name)?;
    let (time, date) = dos_datetime(&entry.modified);

    let mut out = Vec::with_capacity(CENTRAL_HEADER_LEN + name.len());
    put_u32(&mut out, CENTRAL_HEADER_SIG);
    put_u16(&mut out, VERSION_20);         // version made by
    put_u16(&mut out, VERSION_20);         // version needed
    put_u16(&mut out, FLAGS);
    put_u16(&mut out, entry.method);
    put_u16(&mut out, time);
    put_u16(&mut out, date);
    put_u32(&mut out, entry.crc32);
    put_u32(&mut out, fit_u32("compressed size", entry.compressed_size)?);
    put_u32(&mut out, fit_u32("size", entry.size)?);
    put_u16(&mut out, name.len() as u16);
    put_u16(&mut out, 0);                  // extra length
    put_u16(&mut out, 0);                  // comment length
    put_u16(&mut out, 0);                  // disk number start
    put_u16(&mut out, 0);                  // internal attributes
    put_u32(&mut out, 0);                  // external attributes
    put_u32(&mut out, fit_u32("entry offset", entry.offset)?);
    out.extend_from_slice(name);
    Ok(out)
}

pub fn end_of_central_directory(entries: usize, cd_size: u64, cd_offset: u64) -> Result<Vec<u8>, ArchiveError> {
    if entries > MAX_ENTRIES {
        return Err(ArchiveError::TooLarge(format!("{entries} entries")));
    }
    let mut out = Vec::with_capacity(END_OF_CENTRAL_DIR_LEN);
    put_u32(&mut out, END_OF_CENTRAL_DIR_SIG);
    put_u16(&mut out, 0);                  // this disk
    put_u16(&mut out, 0);                  // disk with central directory
    put_u16(&mut out, entries as u16);     // entries on this disk
    put_u16(&mut out, entries as u16);     // total entries
    put_u32(&mut out, fit_u32("central directory size", cd_size)?);
    put_u32(&mut out, fit_u32("central directory offset", cd_offset)?);
    put_u16(&mut out, 0);                  // comment length
    Ok(out)
}

/// Exact stream length for stored entries of known size.
pub fn predicted_store_len<'a>(entries: impl IntoIterator<Item = (&'a str, Option<u64>)>) -> Option<u64> {
    let mut total = END_OF_CENTRAL_DIR_LEN as u64;
    for (name, size) in entries {
        let name_len = name.len() as u64;
        total += (LOCAL_HEADER_LEN + DATA_DESCRIPTOR_LEN + CENTRAL_HEADER_LEN) as u64 + 2 * name_len + size?;
    }
    Some(total)
}
