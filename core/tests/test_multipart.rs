#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use chithi_core::crypto::Ikm;
    use chithi_core::stream::{EncryptParams, EncryptingReader, ParallelismProfile};
    use chithi_core::types::StreamError;
    use chithi_core::upload::{generate_boundary, MultipartBody};

    const BOUNDARY: &str = "XyZ0123456789abcdefXyZ0123456789";

    fn drain<R: Read>(mut r: R, step: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; step];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_exact_layout() {
        let body = MultipartBody::new(
            BOUNDARY,
            &[("expiry", "86400"), ("downloads", "1")],
            "file",
            "bundle.zip",
            Cursor::new(b"CIPHERTEXT".to_vec()),
        )
        .unwrap();

        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"expiry\"\r\n\r\n86400\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"downloads\"\r\n\r\n1\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"bundle.zip\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             CIPHERTEXT\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        assert_eq!(body.content_length(10), expected.len() as u64);
        assert_eq!(body.content_type(), format!("multipart/form-data; boundary={BOUNDARY}"));
        assert_eq!(String::from_utf8(drain(body, 7)).unwrap(), expected);
    }

    #[test]
    fn test_empty_file_part() {
        let body = MultipartBody::new(BOUNDARY, &[], "file", "empty", Cursor::new(Vec::new())).unwrap();
        let len = body.content_length(0);
        let out = drain(body, 4096);
        assert_eq!(out.len() as u64, len);
        assert!(out.ends_with(format!("\r\n\r\n\r\n--{BOUNDARY}--\r\n").as_bytes()));
    }

    #[test]
    fn test_filenames_are_escaped() {
        let body =
            MultipartBody::new(BOUNDARY, &[], "file", "evil\"\r\nX-Injected: 1", Cursor::new(Vec::new())).unwrap();
        let text = String::from_utf8(drain(body, 64)).unwrap();
        assert!(text.contains("filename=\"evil%22%0D%0AX-Injected: 1\""));
        assert!(!text.contains("\r\nX-Injected"));
    }

    #[test]
    fn test_field_containing_boundary_rejected() {
        let value = format!("prefix --{BOUNDARY} suffix");
        let err = MultipartBody::new(BOUNDARY, &[("note", value.as_str())], "file", "f", Cursor::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, StreamError::Validation(_)));
    }

    #[test]
    fn test_invalid_boundary_rejected() {
        for bad in ["", "has space", "semi;colon"] {
            assert!(MultipartBody::new(bad, &[], "file", "f", Cursor::new(Vec::new())).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_cancel_fails_later_reads() {
        let mut body =
            MultipartBody::new(generate_boundary(), &[], "file", "f", Cursor::new(vec![7u8; 100_000])).unwrap();
        let mut buf = [0u8; 512];
        while body.body_bytes() == 0 {
            body.read(&mut buf).unwrap();
        }
        body.cancel();
        let err = body.read(&mut buf).unwrap_err();
        assert!(matches!(StreamError::from(err), StreamError::Pipeline(_)));
    }

    #[test]
    fn test_frames_an_encrypting_reader() {
        let data = vec![0x5au8; 150_000];
        let ikm = Ikm::generate();
        let params = EncryptParams::new()
            .with_plaintext_size(data.len() as u64)
            .with_profile(ParallelismProfile::with_workers(2));
        let enc = EncryptingReader::new(Cursor::new(data), &ikm, params).unwrap();
        let wire_len = enc.predicted_len().unwrap();

        let body = MultipartBody::new(generate_boundary(), &[("v", "1")], "file", "blob", enc).unwrap();
        let framed_len = body.content_length(wire_len);
        let out = drain(body, 10_000);
        assert_eq!(out.len() as u64, framed_len);
    }
}
