#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::address::{Address, ADDRESS_HEX_LEN};
    use crate::identity::{verify_signature, Account};

    fn scalar_hex() -> impl Strategy<Value = String> {
        // Non-zero leading byte keeps the scalar away from zero
        (1u8..=255, any::<[u8; 31]>()).prop_map(|(head, tail)| {
            let mut bytes = vec![head];
            bytes.extend_from_slice(&tail);
            hex::encode(bytes)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Address Round-Trip
        #[test]
        fn test_address_round_trip(scalar in scalar_hex()) {
            let account = Account::from_scalar_hex(&scalar).unwrap();
            let encoded = account.address().to_string();

            prop_assert_eq!(encoded.len(), ADDRESS_HEX_LEN);
            let decoded = Address::parse(&encoded).unwrap();
            prop_assert_eq!(&decoded, account.address());
        }

        // Signature Soundness
        #[test]
        fn test_sign_then_verify(
            scalar in scalar_hex(),
            payload in any::<Vec<u8>>()
        ) {
            let account = Account::from_scalar_hex(&scalar).unwrap();
            let signature = account.sign(&payload);
            prop_assert!(verify_signature(account.address(), &payload, &signature));
        }

        // Unforgeability across keys
        #[test]
        fn test_other_key_rejects(
            signer in scalar_hex(),
            other in scalar_hex(),
            payload in any::<Vec<u8>>()
        ) {
            prop_assume!(signer != other);
            let signer = Account::from_scalar_hex(&signer).unwrap();
            let other = Account::from_scalar_hex(&other).unwrap();

            let signature = signer.sign(&payload);
            prop_assert!(!verify_signature(other.address(), &payload, &signature));
        }

        // Malformed signatures never verify and never panic
        #[test]
        fn test_random_bytes_never_verify(
            scalar in scalar_hex(),
            payload in any::<Vec<u8>>(),
            signature in prop::collection::vec(any::<u8>(), 0..96)
        ) {
            let account = Account::from_scalar_hex(&scalar).unwrap();
            prop_assert!(!verify_signature(account.address(), &payload, &signature));
        }

        // Address parsing is total
        #[test]
        fn test_parse_never_panics(input in ".{0,160}") {
            let _ = Address::parse(&input);
        }
    }
}
