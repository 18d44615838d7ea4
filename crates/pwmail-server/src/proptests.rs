#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::service::PageRequest;

    proptest! {
        // Consecutive pages tile the inbox without gaps or overlap
        #[test]
        fn test_pages_are_contiguous(page in 1i64..10_000, limit in 1i64..=100) {
            let (offset, got_limit) = PageRequest { page, limit }.bounds(100).unwrap();
            let (next_offset, _) = PageRequest { page: page + 1, limit }.bounds(100).unwrap();

            prop_assert_eq!(got_limit, limit as u64);
            prop_assert_eq!(offset, (page as u64 - 1) * limit as u64);
            prop_assert_eq!(next_offset, offset + got_limit);
        }

        // Out-of-range input is rejected, never clamped
        #[test]
        fn test_out_of_range_rejected(page in i64::MIN..1, limit in any::<i64>()) {
            let request = PageRequest { page, limit };
            prop_assert!(request.bounds(100).is_err());
        }
    }
}
