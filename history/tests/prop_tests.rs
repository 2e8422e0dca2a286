//! Property tests for composite history key ordering.

use ledgerline_history::{composite_history_key, decode_history_key, key_prefix};
use ledgerline_types::Height;
use proptest::prelude::*;

proptest! {
    #[test]
    fn key_order_matches_commit_order(
        ns in "[a-z]{1,8}",
        key in "[a-z0-9]{1,12}",
        a in (any::<u64>(), any::<u32>()),
        b in (any::<u64>(), any::<u32>()),
    ) {
        let ka = composite_history_key(&ns, &key, a.0, a.1);
        let kb = composite_history_key(&ns, &key, b.0, b.1);
        prop_assert_eq!(ka.cmp(&kb), Height::new(a.0, a.1).cmp(&Height::new(b.0, b.1)));
    }

    #[test]
    fn position_is_recoverable(
        ns in "[a-z]{1,8}",
        key in "[a-z0-9]{0,12}",
        block in any::<u64>(),
        tx in any::<u32>(),
    ) {
        let k = composite_history_key(&ns, &key, block, tx);
        prop_assert!(k.starts_with(&key_prefix(&ns, &key)));
        prop_assert_eq!(decode_history_key(&k).unwrap(), Height::new(block, tx));
    }
}
