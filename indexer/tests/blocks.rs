// SPDX-License-Identifier: CC0-1.0

//! Block-level scenarios: full pipeline runs over in-memory stores.

use base64::Engine as _;
use bigdecimal::BigDecimal;
use stampd_indexer::pipeline::{Block, Indexer};
use stampd_indexer::store::{MemoryBlobStore, MemoryStore, StateStore};
use types::tick::tick_hash;
use types::{Base64Validity, Candidate, Feature};

/// Inside the SRC-20 era: repair is over, src20_end not yet reached.
const SRC20_ERA: u64 = 790_000;
/// Before the repair cutoff.
const REPAIR_ERA: u64 = Feature::Base64RepairEnd.activation_height() - 1;

fn tx(
    height: u64,
    index: u32,
    hash: &str,
    source: &str,
    destination: &str,
    data: &str,
    cpid: Option<&str>,
) -> Candidate {
    Candidate {
        block_height: height,
        block_time: 1_700_000_000 + height,
        tx_index: index,
        tx_hash: hash.to_owned(),
        source: source.to_owned(),
        destination: destination.to_owned(),
        keyburn: true,
        op_return: false,
        data: data.as_bytes().to_vec(),
        cpid: cpid.map(str::to_owned),
        asset_longname: None,
        description: None,
    }
}

fn block(height: u64, transactions: Vec<Candidate>) -> Block {
    Block { height, time: 1_700_000_000 + height, transactions }
}

fn indexer() -> Indexer<MemoryStore, MemoryBlobStore> {
    Indexer::new(MemoryStore::new(), MemoryBlobStore::new(), "stampd.example")
}

fn src20(op_fields: &str, cpid_index: u32) -> (String, String) {
    let data = format!(r#"{{"p":"SRC-20",{}}}"#, op_fields);
    let cpid = format!("A9542895666168{:04}", cpid_index);
    (data, cpid)
}

#[test]
fn deploy_mint_overflow_then_transfers() {
    let mut indexer = indexer();
    let dogs_hash = tick_hash("dogs");

    // Block 1: DEPLOY dogs max=1000 lim=1000 dec=0.
    let (deploy, cpid0) =
        src20(r#""op":"DEPLOY","tick":"dogs","max":"1000","lim":"1000","dec":"0""#, 0);
    let summary = indexer
        .process_block(&block(SRC20_ERA, vec![tx(SRC20_ERA, 0, "tx0", "svc", "svc", &deploy, Some(&cpid0))]))
        .unwrap();
    assert_eq!(summary.stamps, 1);
    assert_eq!(summary.src20_ops, 1);
    assert_eq!(summary.balance_string, "");

    // The deploy stamp is a numbered BTC stamp rendered as SVG.
    let stamp = &indexer.store.stamps()[0];
    assert_eq!(stamp.stamp_number, Some(0));
    assert!(stamp.is_btc_stamp);
    assert_eq!(stamp.file_suffix.as_deref(), Some("svg"));
    assert_eq!(stamp.mime_type.as_deref(), Some("image/svg+xml"));
    assert!(stamp.file_hash.is_some());

    // Block 2: mint 60 to alice; mint 950 to bob clamps to the remaining
    // 940; one more mint hits OM and moves nothing.
    let h = SRC20_ERA + 1;
    let (m1, c1) = src20(r#""op":"MINT","tick":"dogs","amt":"60""#, 1);
    let (m2, c2) = src20(r#""op":"MINT","tick":"dogs","amt":"950""#, 2);
    let (m3, c3) = src20(r#""op":"MINT","tick":"dogs","amt":"1""#, 3);
    let summary = indexer
        .process_block(&block(
            h,
            vec![
                tx(h, 0, "tx1", "svc", "alice", &m1, Some(&c1)),
                tx(h, 1, "tx2", "svc", "bob", &m2, Some(&c2)),
                tx(h, 2, "tx3", "svc", "carol", &m3, Some(&c3)),
            ],
        ))
        .unwrap();
    assert_eq!(summary.src20_ops, 3);
    assert_eq!(summary.balance_string, "dogs,alice,60;dogs,bob,940");

    let ops = indexer.store.src20();
    assert!(ops[1].valid);
    assert!(ops[2].valid);
    assert!(ops[2].status.as_deref().unwrap().starts_with("OMA:"));
    assert!(!ops[3].valid);
    assert!(ops[3].status.as_deref().unwrap().starts_with("OM:"));
    assert_eq!(indexer.store.balance("dogs", &dogs_hash, "carol"), BigDecimal::from(0));

    // Block 3: a transfer from an empty address is BB; alice pays dave 40.
    let h = SRC20_ERA + 2;
    let (t1, c4) = src20(r#""op":"TRANSFER","tick":"dogs","amt":"100""#, 4);
    let (t2, c5) = src20(r#""op":"TRANSFER","tick":"dogs","amt":"40""#, 5);
    let summary = indexer
        .process_block(&block(
            h,
            vec![
                tx(h, 0, "tx4", "carol", "dave", &t1, Some(&c4)),
                tx(h, 1, "tx5", "alice", "dave", &t2, Some(&c5)),
            ],
        ))
        .unwrap();
    assert_eq!(summary.balance_string, "dogs,alice,20;dogs,dave,40");
    assert_eq!(indexer.store.balance("dogs", &dogs_hash, "alice"), BigDecimal::from(20));
    assert_eq!(indexer.store.balance("dogs", &dogs_hash, "dave"), BigDecimal::from(40));
    assert_eq!(indexer.store.balance("dogs", &dogs_hash, "bob"), BigDecimal::from(940));

    let bb = &indexer.store.src20()[4];
    assert!(!bb.valid);
    assert!(bb.status.as_deref().unwrap().starts_with("BB:"));

    // Every tick stays within its deployed supply.
    assert!(indexer.store.verify_integrity().is_ok());
}

#[test]
fn decimal_overflow_is_excluded_from_accounting_not_stamping() {
    let mut indexer = indexer();
    let h = SRC20_ERA;
    let (deploy, c0) =
        src20(r#""op":"DEPLOY","tick":"prec","max":"1000","lim":"100","dec":"2""#, 10);
    let (bad, c1) = src20(r#""op":"MINT","tick":"prec","amt":"1.234""#, 11);
    let (good, c2) = src20(r#""op":"MINT","tick":"prec","amt":"1.23""#, 12);
    let summary = indexer
        .process_block(&block(
            h,
            vec![
                tx(h, 0, "p0", "svc", "svc", &deploy, Some(&c0)),
                tx(h, 1, "p1", "svc", "alice", &bad, Some(&c1)),
                tx(h, 2, "p2", "svc", "alice", &good, Some(&c2)),
            ],
        ))
        .unwrap();

    // All three stamps exist and are numbered even though one op is ID.
    assert_eq!(summary.stamps, 3);
    let ops = indexer.store.src20();
    assert!(!ops[1].valid);
    assert!(ops[1].status.as_deref().unwrap().starts_with("ID:"));
    assert!(ops[2].valid);
    assert_eq!(summary.balance_string, "prec,alice,1.23");
}

#[test]
fn scientific_notation_excludes_the_stamp_entirely() {
    let mut indexer = indexer();
    let h = SRC20_ERA;
    let (quoted, c0) = src20(r#""op":"MINT","tick":"sci","amt":"1e3""#, 20);
    let (bare, c1) = src20(r#""op":"MINT","tick":"sci","amt":1e3"#, 21);
    let summary = indexer
        .process_block(&block(
            h,
            vec![
                tx(h, 0, "s0", "svc", "alice", &quoted, Some(&c0)),
                tx(h, 1, "s1", "svc", "alice", &bare, Some(&c1)),
            ],
        ))
        .unwrap();
    assert_eq!(summary.stamps, 0);
    assert_eq!(summary.src20_ops, 0);
    assert!(indexer.store.stamps().is_empty());
}

#[test]
fn base64_repair_cutoff_changes_the_outcome() {
    // A PNG-looking payload whose base64 arrives with its padding stripped.
    let mut image = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
    image.extend_from_slice(&[7u8; 17]); // 25 bytes, so padding is required
    let encoded = base64::engine::general_purpose::STANDARD.encode(&image);
    let broken = encoded.trim_end_matches('=');
    assert_ne!(broken.len() % 4, 0);

    let payload = format!(r#"{{"description":"STAMP:{}"}}"#, broken);

    // Repair era: the padding is restored and the stamp becomes a numbered
    // BTC stamp with a stored artifact.
    let mut early = indexer();
    early
        .process_block(&block(
            REPAIR_ERA,
            vec![tx(REPAIR_ERA, 0, "b0", "src", "dst", &payload, Some("A100000000000000001"))],
        ))
        .unwrap();
    let stamp = &early.store.stamps()[0];
    assert_eq!(stamp.is_valid_base64, Base64Validity::Valid);
    assert_eq!(stamp.stamp_number, Some(0));
    assert_eq!(stamp.file_suffix.as_deref(), Some("png"));
    assert!(stamp.file_hash.is_some());
    assert_eq!(early.blob.len(), 1);

    // Strict era: no repair, no decode, no artifact.
    let mut late = indexer();
    late.process_block(&block(
        SRC20_ERA,
        vec![tx(SRC20_ERA, 0, "b0", "src", "dst", &payload, Some("A100000000000000001"))],
    ))
    .unwrap();
    let stamp = &late.store.stamps()[0];
    assert_ne!(stamp.is_valid_base64, Base64Validity::Valid);
    assert_eq!(stamp.file_hash, None);
    assert_eq!(stamp.stamp_number, None);
    assert!(late.blob.is_empty());
}

#[test]
fn ledger_hash_is_order_independent_within_a_block() {
    let h = SRC20_ERA;
    let (deploy, c0) =
        src20(r#""op":"DEPLOY","tick":"perm","max":"1000","lim":"1000","dec":"0""#, 30);
    let (m1, c1) = src20(r#""op":"MINT","tick":"perm","amt":"10""#, 31);
    let (m2, c2) = src20(r#""op":"MINT","tick":"perm","amt":"20""#, 32);
    let (m3, c3) = src20(r#""op":"MINT","tick":"perm","amt":"30""#, 33);
    let txs = vec![
        tx(h, 0, "o0", "svc", "svc", &deploy, Some(&c0)),
        tx(h, 1, "o1", "svc", "alice", &m1, Some(&c1)),
        tx(h, 2, "o2", "svc", "bob", &m2, Some(&c2)),
        tx(h, 3, "o3", "svc", "carol", &m3, Some(&c3)),
    ];

    let mut forward = indexer();
    let a = forward.process_block(&block(h, txs.clone())).unwrap();

    let mut shuffled = txs;
    shuffled.reverse();
    let mut backward = indexer();
    let b = backward.process_block(&block(h, shuffled)).unwrap();

    assert_eq!(a.balance_string, "perm,alice,10;perm,bob,20;perm,carol,30");
    assert_eq!(a.balance_string, b.balance_string);
    assert_eq!(a.ledger_hash, b.ledger_hash);
    assert_eq!(a.messages_hash, b.messages_hash);
}

#[test]
fn replay_is_deterministic() {
    let h = SRC20_ERA;
    let (deploy, c0) =
        src20(r#""op":"DEPLOY","tick":"rep","max":"500","lim":"500","dec":"0""#, 40);
    let (mint, c1) = src20(r#""op":"MINT","tick":"rep","amt":"500""#, 41);
    let blocks = vec![
        block(h, vec![tx(h, 0, "r0", "svc", "svc", &deploy, Some(&c0))]),
        block(h + 1, vec![tx(h + 1, 0, "r1", "svc", "alice", &mint, Some(&c1))]),
    ];

    let mut first = indexer();
    let mut second = indexer();
    for b in &blocks {
        let x = first.process_block(b).unwrap();
        let y = second.process_block(b).unwrap();
        assert_eq!(x.ledger_hash, y.ledger_hash);
        assert_eq!(x.messages_hash, y.messages_hash);
        assert_eq!(x.balance_string, y.balance_string);
    }
    assert_eq!(first.store.blocks().len(), 2);
    assert_eq!(first.store.last_indexed(), Some(h + 1));
}

#[test]
fn same_cpid_reissue_is_dropped() {
    let mut indexer = indexer();
    let h = SRC20_ERA;
    let (m1, _) = src20(r#""op":"MINT","tick":"dup","amt":"1""#, 50);
    let (m2, _) = src20(r#""op":"MINT","tick":"dup","amt":"2""#, 51);
    let cpid = "A200000000000000001";
    let summary = indexer
        .process_block(&block(
            h,
            vec![
                tx(h, 0, "d0", "svc", "alice", &m1, Some(cpid)),
                tx(h, 1, "d1", "svc", "alice", &m2, Some(cpid)),
            ],
        ))
        .unwrap();
    // Second record reissues the first cpid: dropped before numbering.
    assert_eq!(summary.stamps, 1);
    assert_eq!(indexer.store.stamps().len(), 1);
}

#[test]
fn src20_era_ends_at_the_gate() {
    let mut indexer = indexer();
    let h = Feature::Src20End.activation_height();
    let (mint, c0) = src20(r#""op":"MINT","tick":"dogs","amt":"1""#, 60);
    let summary = indexer
        .process_block(&block(h, vec![tx(h, 0, "e0", "svc", "alice", &mint, Some(&c0))]))
        .unwrap();
    // Still a stamp record (cursed by its json suffix), but no token op.
    assert_eq!(summary.stamps, 1);
    assert_eq!(summary.src20_ops, 0);
    let stamp = &indexer.store.stamps()[0];
    assert!(stamp.is_cursed);
    assert!(stamp.stamp_number.unwrap() < 0);
}

#[test]
fn cursed_numbering_is_monotone_and_negative() {
    let mut indexer = indexer();
    let h = Feature::Src20End.activation_height();
    let (m1, c1) = src20(r#""op":"MINT","tick":"a","amt":"1""#, 70);
    let (m2, c2) = src20(r#""op":"MINT","tick":"b","amt":"1""#, 71);
    indexer
        .process_block(&block(
            h,
            vec![
                tx(h, 0, "c0", "svc", "x", &m1, Some(&c1)),
                tx(h, 1, "c1", "svc", "x", &m2, Some(&c2)),
            ],
        ))
        .unwrap();
    let stamps = indexer.store.stamps();
    assert_eq!(stamps[0].stamp_number, Some(-1));
    assert_eq!(stamps[1].stamp_number, Some(-2));
}
