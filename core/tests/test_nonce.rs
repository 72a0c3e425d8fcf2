#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use chithi_core::crypto::chunk_nonce;

    #[test]
    fn test_index_zero_is_base_nonce() {
        let base = [0x5A; 12];
        assert_eq!(chunk_nonce(&base, 0), base);
    }

    #[test]
    fn test_index_lands_in_low_32_bits_big_endian() {
        let base = [0u8; 12];
        let n = chunk_nonce(&base, 0x0102_0304);
        assert_eq!(&n[..8], &[0u8; 8]);
        assert_eq!(&n[8..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_no_collisions_over_2_pow_20_chunks() {
        let base = [0xC3, 0x11, 0x7E, 0x00, 0x42, 0x99, 0x10, 0xAA, 0xFF, 0x0F, 0xF0, 0x01];
        let mut seen = HashSet::with_capacity(1 << 20);
        for index in 0..(1u32 << 20) {
            assert!(seen.insert(chunk_nonce(&base, index)), "nonce collision at {index}");
        }
    }

    proptest! {
        #[test]
        fn prop_distinct_indices_distinct_nonces(base in any::<[u8; 12]>(), a in any::<u32>(), b in any::<u32>()) {
            prop_assume!(a != b);
            prop_assert_ne!(chunk_nonce(&base, a), chunk_nonce(&base, b));
        }

        #[test]
        fn prop_high_bytes_untouched(base in any::<[u8; 12]>(), index in any::<u32>()) {
            let n = chunk_nonce(&base, index);
            prop_assert_eq!(&n[..8], &base[..8]);
        }
    }
}
