#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use chithi_core::crypto::{CipherSuite, TAG_LEN};
    use chithi_core::stream::chunk_worker::{ChunkCodec, ChunkTransform, Direction};
    use chithi_core::types::StreamError;

    const KEY: [u8; 32] = [0x42; 32];
    const BASE: [u8; 12] = [0x24; 12];

    fn codec(suite: CipherSuite, direction: Direction) -> ChunkCodec {
        ChunkCodec::new(suite, &KEY, BASE, direction).unwrap()
    }

    #[test]
    fn test_roundtrip_both_ciphers() {
        for suite in [CipherSuite::Aes256Gcm, CipherSuite::Chacha20Poly1305] {
            let enc = codec(suite, Direction::Encrypt);
            let dec = codec(suite, Direction::Decrypt);
            let pt = b"sixty-four kibibytes, give or take".to_vec();

            let ct = enc.encrypt_chunk(3, &pt).unwrap();
            assert_eq!(ct.len(), pt.len() + TAG_LEN);
            assert_eq!(dec.decrypt_chunk(3, &ct).unwrap(), pt);
        }
    }

    #[test]
    fn test_empty_chunk_is_tag_only() {
        let enc = codec(CipherSuite::Aes256Gcm, Direction::Encrypt);
        let ct = enc.encrypt_chunk(0, &[]).unwrap();
        assert_eq!(ct.len(), TAG_LEN);

        let dec = codec(CipherSuite::Aes256Gcm, Direction::Decrypt);
        assert!(dec.decrypt_chunk(0, &ct).unwrap().is_empty());
    }

    #[test]
    fn test_index_is_bound_through_nonce() {
        let enc = codec(CipherSuite::Aes256Gcm, Direction::Encrypt);
        let dec = codec(CipherSuite::Aes256Gcm, Direction::Decrypt);
        let ct = enc.encrypt_chunk(1, b"chunk one").unwrap();
        assert!(matches!(dec.decrypt_chunk(2, &ct), Err(StreamError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_key_is_authentication_failure() {
        let enc = codec(CipherSuite::Chacha20Poly1305, Direction::Encrypt);
        let other = ChunkCodec::new(CipherSuite::Chacha20Poly1305, &[0x43; 32], BASE, Direction::Decrypt).unwrap();
        let ct = enc.encrypt_chunk(0, b"secret").unwrap();
        assert!(matches!(other.decrypt_chunk(0, &ct), Err(StreamError::AuthenticationFailed)));
    }

    #[test]
    fn test_shorter_than_tag_is_truncation() {
        let dec = codec(CipherSuite::Aes256Gcm, Direction::Decrypt);
        assert!(matches!(dec.decrypt_chunk(0, &[0u8; TAG_LEN - 1]), Err(StreamError::TruncatedStream(_))));
        assert!(matches!(dec.decrypt_chunk(0, &[]), Err(StreamError::TruncatedStream(_))));
    }

    #[test]
    fn test_transform_follows_direction() {
        let enc = codec(CipherSuite::Aes256Gcm, Direction::Encrypt);
        let dec = codec(CipherSuite::Aes256Gcm, Direction::Decrypt);
        let ct = enc.apply(5, b"via the trait".to_vec()).unwrap();
        assert_eq!(dec.apply(5, ct).unwrap(), b"via the trait");
    }

    #[test]
    fn test_bad_key_length_rejected() {
        assert!(ChunkCodec::new(CipherSuite::Aes256Gcm, &[0u8; 16], BASE, Direction::Encrypt).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_bit_flip_fails_authentication(
            pt in proptest::collection::vec(any::<u8>(), 0..512),
            index in any::<u32>(),
            flip in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let enc = codec(CipherSuite::Aes256Gcm, Direction::Encrypt);
            let dec = codec(CipherSuite::Aes256Gcm, Direction::Decrypt);
            let mut ct = enc.encrypt_chunk(index, &pt).unwrap();
            let at = flip.index(ct.len());
            ct[at] ^= 1 << bit;
            prop_assert!(matches!(dec.decrypt_chunk(index, &ct), Err(StreamError::AuthenticationFailed)));
        }
    }
}
