#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use pwmail_crypto::Account;

    use crate::error::AuthError;
    use crate::freshness::FreshnessGate;
    use crate::ledger::MemoryNonceLedger;
    use crate::message::{format_timestamp, GetInbox, SendEmail, SignedEnvelope};
    use crate::pipeline::RequestPipeline;

    const ALICE: &str = "1baa694c49154f63b1503c7138f184c80f221670f035403ff428a65183bab247";

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    proptest! {
        // Freshness Boundary
        #[test]
        fn test_freshness_matches_window(
            window in 1u64..3_600,
            skew in 0u64..300,
            offset in -4_000i64..4_000
        ) {
            let gate = FreshnessGate::new(Duration::from_secs(window), Duration::from_secs(skew));
            let now = base_time();
            let ts = format_timestamp(now - chrono::Duration::seconds(offset));

            let expected_fresh = if offset >= 0 {
                offset as u64 <= window
            } else {
                offset.unsigned_abs() <= skew
            };

            match gate.check(&ts, now) {
                Ok(issued_at) => {
                    prop_assert!(expected_fresh);
                    prop_assert_eq!(now - issued_at, chrono::Duration::seconds(offset));
                }
                Err(err) => {
                    prop_assert!(!expected_fresh);
                    prop_assert_eq!(err, AuthError::Timeout);
                }
            }
        }

        // Timestamp parsing is total
        #[test]
        fn test_freshness_never_panics(input in ".{0,64}") {
            let _ = FreshnessGate::default().check(&input, base_time());
        }

        // Arbitrary envelopes are rejected, never accepted and never panic
        #[test]
        fn test_pipeline_rejects_arbitrary_envelopes(
            data in ".{0,256}",
            signature in proptest::collection::vec(any::<u8>(), 0..96),
            signed in any::<bool>()
        ) {
            let alice = Account::from_scalar_hex(ALICE).unwrap();
            let ledger = Arc::new(MemoryNonceLedger::new());
            let pipeline = RequestPipeline::new(ledger.clone(), FreshnessGate::default());
            // Properly signed garbage reaches the parser; the rest stops at the signature
            let envelope = if signed {
                SignedEnvelope::sign_payload(&alice, data)
            } else {
                SignedEnvelope { data, signature }
            };

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (inbox, send) = runtime.block_on(async {
                (
                    pipeline.authenticate::<GetInbox>(&envelope, alice.address(), base_time()).await,
                    pipeline.authenticate::<SendEmail>(&envelope, alice.address(), base_time()).await,
                )
            });

            prop_assert!(inbox.is_err());
            prop_assert!(send.is_err());
            prop_assert!(ledger.is_empty());
        }
    }
}
