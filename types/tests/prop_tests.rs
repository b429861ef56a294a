use proptest::prelude::*;

use carbon_types::{AccountId, BatchId, Timestamp};

proptest! {
    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// elapsed_since never underflows.
    #[test]
    fn elapsed_since_saturates(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let elapsed = Timestamp::new(a).elapsed_since(Timestamp::new(b));
        prop_assert_eq!(elapsed, b.saturating_sub(a));
    }

    /// BatchId byte keys sort the same way as the ids themselves.
    #[test]
    fn batch_id_key_order(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let (ka, kb) = (BatchId::new(a).to_be_bytes(), BatchId::new(b).to_be_bytes());
        prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
    }

    /// Any non-zero hex address is a valid identity.
    #[test]
    fn nonzero_hex_addresses_are_valid(body in "[0-9a-f]{40}") {
        prop_assume!(body.bytes().any(|b| b != b'0'));
        let id = AccountId::new(format!("0x{body}"));
        prop_assert!(id.is_valid());
    }

    /// AccountId survives a bincode round trip unchanged.
    #[test]
    fn account_id_bincode_roundtrip(raw in "[a-zA-Z0-9:_-]{1,64}") {
        let id = AccountId::new(raw);
        let encoded = bincode::serialize(&id).unwrap();
        let decoded: AccountId = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, id);
    }
}
