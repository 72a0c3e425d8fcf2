//! upload.rs
//! `multipart/form-data` framing around one streamed file part.
//!
//! Scalar fields come first, the file part last, so the encrypted body can be
//! streamed straight through without buffering:
//!
//! ```text
//! --B\r\nContent-Disposition: form-data; name="k"\r\n\r\nv\r\n      (per field)
//! --B\r\nContent-Disposition: form-data; name="file"; filename="n"\r\n
//! Content-Type: application/octet-stream\r\n\r\n
//! <body>
//! \r\n--B--\r\n
//! ```

use std::fmt;
use std::io::{self, Read};

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::debug;

use crate::types::StreamError;

pub const BOUNDARY_LEN: usize = 32;
/// RFC 2046 upper bound on boundary length.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Random boundary of 32 ASCII alphanumerics.
pub fn generate_boundary() -> String {
    OsRng.sample_iter(&Alphanumeric).take(BOUNDARY_LEN).map(char::from).collect()
}

/// Percent-escape the characters that would break a quoted header parameter.
fn escape_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("%22"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
    out
}

fn check_boundary(boundary: &str) -> Result<(), StreamError> {
    let ok = !boundary.is_empty()
        && boundary.len() <= MAX_BOUNDARY_LEN
        && boundary.bytes().all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=?".contains(&b));
    if ok {
        Ok(())
    } else {
        Err(StreamError::Validation(format!("invalid multipart boundary {boundary:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preamble,
    File,
    Postamble,
    Done,
    Cancelled,
}

/// Pull-driven multipart body: preamble → file bytes → closing boundary.
pub struct MultipartBody<R: Read> {
    boundary: String,
    preamble: Vec<u8>,
    postamble: Vec<u8>,
    body: Option<R>,
    stage: Stage,
    pos: usize,
    body_bytes: u64,
}

impl<R: Read> fmt::Debug for MultipartBody<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("stage", &self.stage)
            .field("body_bytes", &self.body_bytes)
            .finish_non_exhaustive()
    }
}

impl<R: Read> MultipartBody<R> {
    /// `fields` are emitted in the given order ahead of the file part.
    pub fn new(
        boundary: impl Into<String>,
        fields: &[(&str, &str)],
        file_field: &str,
        filename: &str,
        body: R,
    ) -> Result<Self, StreamError> {
        let boundary = boundary.into();
        check_boundary(&boundary)?;
        let delimiter = format!("--{boundary}");

        let mut preamble = String::new();
        for (name, value) in fields {
            if value.contains(&delimiter) {
                return Err(StreamError::Validation(format!("field {name:?} contains the boundary")));
            }
            preamble.push_str(&delimiter);
            preamble.push_str("\r\n");
            preamble.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", escape_param(name)));
            preamble.push_str(value);
            preamble.push_str("\r\n");
        }
        preamble.push_str(&delimiter);
        preamble.push_str("\r\n");
        preamble.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            escape_param(file_field),
            escape_param(filename)
        ));
        preamble.push_str("Content-Type: application/octet-stream\r\n\r\n");

        let postamble = format!("\r\n{delimiter}--\r\n");

        Ok(Self {
            boundary,
            preamble: preamble.into_bytes(),
            postamble: postamble.into_bytes(),
            body: Some(body),
            stage: Stage::Preamble,
            pos: 0,
            body_bytes: 0,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact framed length for a file part of `body_len` bytes.
    pub fn content_length(&self, body_len: u64) -> u64 {
        self.preamble.len() as u64 + body_len + self.postamble.len() as u64
    }

    /// File bytes passed through so far.
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes
    }

    /// Drop the file body. Later reads fail rather than end the upload early.
    pub fn cancel(&mut self) {
        if self.stage != Stage::Done {
            debug!(body_bytes = self.body_bytes, "multipart body cancelled");
            self.stage = Stage::Cancelled;
        }
        self.body = None;
    }

    fn copy_out(src: &[u8], pos: &mut usize, buf: &mut [u8]) -> usize {
        let n = buf.len().min(src.len() - *pos);
        buf[..n].copy_from_slice(&src[*pos..*pos + n]);
        *pos += n;
        n
    }
}

impl<R: Read> Read for MultipartBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.stage {
                Stage::Preamble => {
                    if self.pos < self.preamble.len() {
                        return Ok(Self::copy_out(&self.preamble, &mut self.pos, buf));
                    }
                    self.stage = Stage::File;
                    self.pos = 0;
                }
                Stage::File => {
                    let n = match self.body.as_mut() {
                        Some(body) => body.read(buf)?,
                        None => 0,
                    };
                    if n > 0 {
                        self.body_bytes += n as u64;
                        return Ok(n);
                    }
                    self.body = None;
                    self.stage = Stage::Postamble;
                }
                Stage::Postamble => {
                    if self.pos < self.postamble.len() {
                        return Ok(Self::copy_out(&self.postamble, &mut self.pos, buf));
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return Ok(0),
                Stage::Cancelled => {
                    return Err(StreamError::Pipeline("multipart body cancelled".into()).into_io());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_line_breaks() {
        assert_eq!(escape_param("a\"b\r\nc"), "a%22b%0D%0Ac");
        assert_eq!(escape_param("plain.zip"), "plain.zip");
    }

    #[test]
    fn generated_boundaries_are_valid() {
        let b = generate_boundary();
        assert_eq!(b.len(), BOUNDARY_LEN);
        assert!(check_boundary(&b).is_ok());
        assert_ne!(b, generate_boundary());
    }

    #[test]
    fn rejects_bad_boundaries() {
        assert!(check_boundary("").is_err());
        assert!(check_boundary("has space").is_err());
        assert!(check_boundary(&"x".repeat(71)).is_err());
    }
}
