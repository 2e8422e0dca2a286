//! Ledger persisted in LMDB: chain survives reopen, and blocks appended
//! without indexing (a crash between append and index) are replayed into the
//! history index when the ledger is opened again.

use ledgerline_history::{HistoryDb, RecoveryStatus};
use ledgerline_ledger::{assemble_block, block_hash, BlockLedger, KvLedger, Ledger, SeekPosition};
use ledgerline_store_lmdb::{LmdbEnvironment, LmdbKvStore};
use ledgerline_types::{Envelope, HeaderType, NsRwSet, TransactionAction, TxRwSet};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), 8, 32 * 1024 * 1024).expect("open env");
    (dir, env)
}

fn open_kv(env: &LmdbEnvironment) -> KvLedger<LmdbKvStore, LmdbKvStore> {
    KvLedger::open(
        BlockLedger::open(env.block_store()).expect("block ledger"),
        HistoryDb::new(env.history_store(), "orders", true),
    )
    .expect("kv ledger")
}

fn write_tx(n: u64) -> Envelope {
    let set = NsRwSet::new("assets").write("counter", n.to_be_bytes().to_vec());
    let action = TransactionAction::new(&TxRwSet::new(vec![set])).expect("action");
    Envelope::endorser_transaction("orders", format!("tx{n}"), &action).expect("envelope")
}

fn append_next<L: Ledger>(ledger: &L, envelopes: Vec<Envelope>) {
    let prev = ledger
        .last_block()
        .expect("read tip")
        .map(|b| block_hash(&b))
        .unwrap_or_default();
    let block = assemble_block(ledger.height(), prev, envelopes);
    ledger.append(&block).expect("append");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn chain_survives_reopen_with_intact_links() {
    let (dir, env) = temp_env();
    {
        let ledger = open_kv(&env);
        for n in 0..5 {
            append_next(&ledger, vec![write_tx(n)]);
        }
    }
    drop(env);

    let env = LmdbEnvironment::open(dir.path(), 8, 32 * 1024 * 1024).expect("reopen");
    let ledger = open_kv(&env);
    assert_eq!(ledger.height(), 5);

    let blocks: Vec<_> = ledger
        .iterator(SeekPosition::Oldest)
        .collect::<Result<_, _>>()
        .expect("iterate");
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].header.previous_hash, block_hash(&pair[0]));
        assert_eq!(pair[1].number(), pair[0].number() + 1);
    }
}

#[test]
fn unindexed_blocks_are_replayed_on_open() {
    let (_dir, env) = temp_env();
    {
        // Blocks reach the chain but the process dies before indexing them.
        let chain = BlockLedger::open(env.block_store()).expect("block ledger");
        for n in 0..4 {
            append_next(&chain, vec![write_tx(n)]);
        }
        append_next(
            &chain,
            vec![Envelope::new(HeaderType::Config, "orders", b"{}".to_vec())],
        );
    }

    let ledger = open_kv(&env);
    assert_eq!(
        ledger.history().should_recover().expect("status"),
        RecoveryStatus::ResumeFrom(5)
    );
    let mods = ledger.key_history("assets", "counter").expect("history");
    let tx_ids: Vec<&str> = mods.iter().map(|m| m.tx_id.as_str()).collect();
    assert_eq!(tx_ids, vec!["tx0", "tx1", "tx2", "tx3"]);
    assert_eq!(mods[3].value, 3u64.to_be_bytes().to_vec());
}

#[test]
fn disabled_history_never_touches_its_store() {
    let (_dir, env) = temp_env();
    let ledger = KvLedger::open(
        BlockLedger::open(env.block_store()).expect("block ledger"),
        HistoryDb::new(env.history_store(), "orders", false),
    )
    .expect("kv ledger");
    append_next(&ledger, vec![write_tx(0)]);

    assert_eq!(ledger.height(), 1);
    assert!(env.history_store().is_empty().expect("len"));
}
