#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use chrono::{TimeZone, Utc};
    use flate2::read::DeflateDecoder;

    use chithi_core::archive::tar::{split_name, BLOCK_LEN};
    use chithi_core::archive::zip::dos_datetime;
    use chithi_core::archive::{ArchiveError, ArchiveFormat, ArchiveInput, ArchiveOptions, ArchiveProducer, Compression};
    use chithi_core::crypto::{Ikm, KdfParams};
    use chithi_core::stream::{decrypt_stream, encrypt_files, DecryptParams, EncryptParams, ParallelismProfile};
    use chithi_core::types::StreamError;

    #[derive(Debug)]
    struct Parsed {
        name: String,
        method: u16,
        crc32: u32,
        data: Vec<u8>,
    }

    fn le16(b: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([b[at], b[at + 1]])
    }

    fn le32(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    fn files() -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("a.txt", b"alpha alpha alpha alpha alpha".to_vec()),
            ("dir/b.bin", (0..70_000u32).map(|i| (i % 7) as u8).collect()),
            ("c-empty", Vec::new()),
        ]
    }

    fn inputs() -> Vec<ArchiveInput> {
        let when = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 10).unwrap();
        files()
            .into_iter()
            .map(|(name, data)| ArchiveInput::from_bytes(name, data).with_modified(when))
            .collect()
    }

    fn produce(inputs: Vec<ArchiveInput>, options: ArchiveOptions) -> (Vec<u8>, ArchiveProducer) {
        let mut producer = ArchiveProducer::new(inputs, options).unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 1000];
        loop {
            let n = producer.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        (out, producer)
    }

    /// Walk the central directory and pull each entry back out of the stream.
    fn parse_zip(zip: &[u8]) -> Vec<Parsed> {
        let eocd = zip.len() - 22;
        assert_eq!(le32(zip, eocd), 0x0605_4b50);
        let count = le16(zip, eocd + 10) as usize;
        let cd_size = le32(zip, eocd + 12) as usize;
        let mut at = le32(zip, eocd + 16) as usize;
        assert_eq!(at + cd_size, eocd);

        let mut out = Vec::new();
        for _ in 0..count {
            assert_eq!(le32(zip, at), 0x0201_4b50);
            assert_eq!(le16(zip, at + 8), 0x0808);
            let method = le16(zip, at + 10);
            let crc32 = le32(zip, at + 16);
            let compressed = le32(zip, at + 20) as usize;
            let size = le32(zip, at + 24) as usize;
            let name_len = le16(zip, at + 28) as usize;
            let local = le32(zip, at + 42) as usize;
            let name = String::from_utf8(zip[at + 46..at + 46 + name_len].to_vec()).unwrap();
            at += 46 + name_len;

            assert_eq!(le32(zip, local), 0x0403_4b50);
            assert_eq!(le32(zip, local + 14), 0, "crc deferred to descriptor");
            assert_eq!(le16(zip, local + 26) as usize, name_len);
            let start = local + 30 + name_len;
            let raw = &zip[start..start + compressed];

            let desc = start + compressed;
            assert_eq!(le32(zip, desc), 0x0807_4b50);
            assert_eq!(le32(zip, desc + 4), crc32);
            assert_eq!(le32(zip, desc + 8) as usize, compressed);
            assert_eq!(le32(zip, desc + 12) as usize, size);

            let data = match method {
                0 => raw.to_vec(),
                8 => {
                    let mut d = Vec::new();
                    DeflateDecoder::new(raw).read_to_end(&mut d).unwrap();
                    d
                }
                m => panic!("unexpected method {m}"),
            };
            assert_eq!(data.len(), size);
            out.push(Parsed { name, method, crc32, data });
        }
        out
    }

    /// (name, size, crc32, method, contents) as seen by the `zip` crate.
    fn read_with_zip(bytes: &[u8]) -> Vec<(String, u64, u32, zip::CompressionMethod, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), file.size(), file.crc32(), file.compression(), data)
            })
            .collect()
    }

    /// (path, size, contents) as seen by the `tar` crate.
    fn read_with_tar(bytes: &[u8]) -> Vec<(String, u64, Vec<u8>)> {
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let size = entry.header().size().unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (path, size, data)
            })
            .collect()
    }

    fn octal(field: &[u8]) -> u64 {
        let s: String = field.iter().take_while(|&&b| b != 0 && b != b' ').map(|&b| b as char).collect();
        u64::from_str_radix(&s, 8).unwrap()
    }

    fn parse_tar(tar: &[u8]) -> Vec<(String, Vec<u8>)> {
        assert_eq!(tar.len() % BLOCK_LEN, 0);
        let mut at = 0;
        let mut out = Vec::new();
        loop {
            let h = &tar[at..at + BLOCK_LEN];
            if h.iter().all(|&b| b == 0) {
                assert!(tar[at + BLOCK_LEN..at + 2 * BLOCK_LEN].iter().all(|&b| b == 0));
                assert_eq!(at + 2 * BLOCK_LEN, tar.len());
                break;
            }
            assert_eq!(&h[257..263], b"ustar\0");
            assert_eq!(&h[263..265], b"00");
            assert_eq!(h[156], b'0');

            let mut blank = h.to_vec();
            blank[148..156].copy_from_slice(b"        ");
            let sum: u64 = blank.iter().map(|&b| u64::from(b)).sum();
            assert_eq!(octal(&h[148..156]), sum);
            assert_eq!(&h[154..156], b"\0 ");

            let field = |r: std::ops::Range<usize>| {
                String::from_utf8(h[r].iter().take_while(|&&b| b != 0).copied().collect()).unwrap()
            };
            let (name, prefix) = (field(0..100), field(345..500));
            let full = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            let size = octal(&h[124..136]) as usize;

            at += BLOCK_LEN;
            out.push((full, tar[at..at + size].to_vec()));
            at += size.div_ceil(BLOCK_LEN) * BLOCK_LEN;
        }
        out
    }

    #[test]
    fn test_zip_store_reproduces_names_sizes_and_crcs() {
        let (zip, producer) = produce(inputs(), ArchiveOptions::default());
        assert_eq!(producer.predicted_len(), Some(zip.len() as u64));
        assert_eq!(producer.position(), zip.len() as u64);

        let parsed = parse_zip(&zip);
        assert_eq!(parsed.len(), 3);
        for ((name, data), entry) in files().iter().zip(&parsed) {
            assert_eq!(&entry.name, name);
            assert_eq!(entry.method, 0);
            assert_eq!(&entry.data, data);
            assert_eq!(entry.crc32, crc32fast::hash(data));
        }

        let recorded: Vec<_> = producer.entries().iter().map(|e| (e.name.clone(), e.size, e.crc32)).collect();
        let expected: Vec<_> = parsed.iter().map(|p| (p.name.clone(), p.data.len() as u64, p.crc32)).collect();
        assert_eq!(recorded, expected);
    }

    #[test]
    fn test_zip_reader_agrees_in_both_modes() {
        for (compression, method) in [
            (Compression::Store, zip::CompressionMethod::Stored),
            (Compression::Deflate, zip::CompressionMethod::Deflated),
        ] {
            let options = ArchiveOptions { compression, ..ArchiveOptions::default() };
            let (bytes, _) = produce(inputs(), options);
            let read = read_with_zip(&bytes);
            assert_eq!(read.len(), 3);
            for ((name, data), (read_name, size, crc32, read_method, contents)) in files().iter().zip(&read) {
                assert_eq!(read_name, name);
                assert_eq!(*size, data.len() as u64);
                assert_eq!(*crc32, crc32fast::hash(data));
                assert_eq!(*read_method, method);
                assert_eq!(contents, data);
            }
        }
    }

    #[test]
    fn test_tar_reader_agrees() {
        let long = format!("{}/nested/file.bin", "p".repeat(110));
        let mut all = inputs();
        all.push(ArchiveInput::from_bytes(long.clone(), vec![1u8; 513]));

        let options = ArchiveOptions { format: ArchiveFormat::Tar, ..ArchiveOptions::default() };
        let (bytes, _) = produce(all, options);
        let read = read_with_tar(&bytes);

        let mut expected: Vec<_> = files().into_iter().map(|(n, d)| (n.to_string(), d.len() as u64, d)).collect();
        expected.push((long, 513, vec![1u8; 513]));
        assert_eq!(read, expected);
    }

    #[test]
    fn test_zip_deflate_roundtrip() {
        let options = ArchiveOptions { compression: Compression::Deflate, ..ArchiveOptions::default() };
        let (zip, producer) = produce(inputs(), options);
        assert_eq!(producer.predicted_len(), None);

        let parsed = parse_zip(&zip);
        for ((_, data), entry) in files().iter().zip(&parsed) {
            assert_eq!(entry.method, 8);
            assert_eq!(&entry.data, data);
            assert_eq!(entry.crc32, crc32fast::hash(data));
        }
        let b = &producer.entries()[1];
        assert!(b.compressed_size < b.size);
    }

    #[test]
    fn test_zip_falls_back_to_store_when_deflate_unavailable() {
        let options = ArchiveOptions { compression: Compression::Deflate, deflate_level: 42, ..ArchiveOptions::default() };
        let (zip, _) = produce(inputs(), options);
        assert!(parse_zip(&zip).iter().all(|e| e.method == 0));
    }

    #[test]
    fn test_zip_dos_timestamp() {
        let when = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 10).unwrap();
        let (time, date) = dos_datetime(&when);
        assert_eq!(time, (12 << 11) | (30 << 5) | 5);
        assert_eq!(date, ((2024 - 1980) << 9) | (5 << 5) | 17);

        let (zip, _) = produce(inputs(), ArchiveOptions::default());
        assert_eq!(le16(&zip, 10), time);
        assert_eq!(le16(&zip, 12), date);

        let ancient = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(dos_datetime(&ancient), (0, (1 << 5) | 1));
    }

    #[test]
    fn test_tar_reproduces_names_and_contents() {
        let options = ArchiveOptions { format: ArchiveFormat::Tar, ..ArchiveOptions::default() };
        let (tar, producer) = produce(inputs(), options);
        assert_eq!(producer.predicted_len(), Some(tar.len() as u64));

        let parsed = parse_tar(&tar);
        let expected: Vec<_> = files().into_iter().map(|(n, d)| (n.to_string(), d)).collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_tar_long_names_split_at_slash() {
        let dir = "d".repeat(120);
        let path = format!("{dir}/file.txt");
        let (name, prefix) = split_name(&path);
        assert_eq!(name, b"file.txt");
        assert_eq!(prefix, dir.as_bytes());

        let options = ArchiveOptions { format: ArchiveFormat::Tar, ..ArchiveOptions::default() };
        let (tar, _) = produce(vec![ArchiveInput::from_bytes(path.clone(), b"x".to_vec())], options);
        assert_eq!(parse_tar(&tar)[0].0, path);
    }

    #[test]
    fn test_tar_names_without_usable_slash_are_truncated() {
        let long = "n".repeat(300);
        let (name, prefix) = split_name(&long);
        assert_eq!(name.len(), 100);
        assert!(prefix.is_empty());
    }

    #[test]
    fn test_tar_requires_sizes() {
        let options = ArchiveOptions { format: ArchiveFormat::Tar, ..ArchiveOptions::default() };
        let unsized_input = ArchiveInput::from_reader("stream.bin", Cursor::new(vec![1, 2, 3]), None);
        assert!(matches!(ArchiveProducer::new(vec![unsized_input], options), Err(ArchiveError::MissingSize(_))));
    }

    #[test]
    fn test_zip_accepts_unsized_readers() {
        let input = ArchiveInput::from_reader("stream.bin", Cursor::new(vec![9u8; 5000]), None);
        let (zip, producer) = produce(vec![input], ArchiveOptions::default());
        assert_eq!(producer.predicted_len(), None);
        assert_eq!(parse_zip(&zip)[0].data, vec![9u8; 5000]);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let short = ArchiveInput::from_reader("short.bin", Cursor::new(vec![0u8; 5]), Some(10));
        let mut producer = ArchiveProducer::new(vec![short], ArchiveOptions::default()).unwrap();
        let mut out = Vec::new();
        let err = producer.read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            StreamError::from(err),
            StreamError::Archive(ArchiveError::SizeMismatch { declared: 10, actual: 5, .. })
        ));

        let long = ArchiveInput::from_reader("long.bin", Cursor::new(vec![0u8; 5000]), Some(10));
        let mut producer = ArchiveProducer::new(vec![long], ArchiveOptions::default()).unwrap();
        assert!(producer.read_to_end(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_cancel_stops_the_stream() {
        let mut producer = ArchiveProducer::new(inputs(), ArchiveOptions::default()).unwrap();
        let mut buf = [0u8; 64];
        assert!(producer.read(&mut buf).unwrap() > 0);
        producer.cancel();
        let err = producer.read(&mut buf).unwrap_err();
        assert!(matches!(StreamError::from(err), StreamError::Archive(ArchiveError::Cancelled)));
    }

    #[test]
    fn test_files_are_opened_lazily_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("first.txt");
        let b = dir.path().join("second.txt");
        std::fs::write(&a, b"first file").unwrap();
        std::fs::write(&b, b"second file").unwrap();

        let inputs = vec![ArchiveInput::from_path(&a).unwrap(), ArchiveInput::from_path(&b).unwrap()];
        assert_eq!(inputs[0].name, "first.txt");
        assert_eq!(inputs[1].size, Some(11));

        // Removing a file before its turn surfaces as an I/O error on that entry.
        std::fs::remove_file(&b).unwrap();
        let mut producer = ArchiveProducer::new(inputs, ArchiveOptions::default()).unwrap();
        let err = producer.read_to_end(&mut Vec::new()).unwrap_err();
        assert!(matches!(StreamError::from(err), StreamError::Archive(ArchiveError::Io { ref name, .. }) if name == "second.txt"));
    }

    #[test]
    fn test_empty_names_rejected() {
        let bad = ArchiveInput::from_bytes("", b"x".to_vec());
        assert!(matches!(ArchiveProducer::new(vec![bad], ArchiveOptions::default()), Err(ArchiveError::InvalidName(_))));
    }

    #[test]
    fn test_encrypt_files_roundtrip() {
        let params = EncryptParams {
            kdf: KdfParams { memory_kib: 1024, iterations: 1, parallelism: 1 },
            profile: ParallelismProfile::with_workers(2),
            ..EncryptParams::default()
        }
        .with_password("archive-pw");
        let (mut reader, ikm) = encrypt_files(inputs(), ArchiveOptions::default(), params).unwrap();
        let predicted = reader.predicted_len();
        let mut sealed = Vec::new();
        reader.read_to_end(&mut sealed).unwrap();
        assert_eq!(predicted, Some(sealed.len() as u64));

        let token = ikm.to_token();
        let ikm = Ikm::from_token(&token).unwrap();
        let mut zip = Vec::new();
        decrypt_stream(Cursor::new(sealed), &mut zip, &ikm, DecryptParams::new().with_password("archive-pw")).unwrap();

        let read = read_with_zip(&zip);
        let expected: Vec<_> = files().into_iter().map(|(n, d)| (n.to_string(), d)).collect();
        let got: Vec<_> = read.into_iter().map(|(n, _, _, _, d)| (n, d)).collect();
        assert_eq!(got, expected);
    }
}
