use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use openerp_plainkv::{Connection, KVConfig, PlainKV, RedbStore};

fn redb_conn(tmp: &TempDir) -> Connection {
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();
    let mut conn = Connection::new(Arc::new(store), KVConfig::default());
    conn.open().unwrap();
    conn
}

fn bench_redb_set(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut conn = redb_conn(&tmp);

    c.bench_function("redb_set", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("bench:key:{}", i);
            conn.set(black_box(&key), black_box(b"hello world")).unwrap();
            i += 1;
        });
    });
}

fn bench_redb_set_in_txn(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut conn = redb_conn(&tmp);

    c.bench_function("redb_set_100_in_txn", |b| {
        let mut i = 0u64;
        b.iter(|| {
            conn.begin().unwrap();
            for _ in 0..100 {
                let key = format!("bench:key:{}", i);
                conn.set(black_box(&key), black_box(b"hello world")).unwrap();
                i += 1;
            }
            conn.commit().unwrap();
        });
    });
}

fn bench_redb_get(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut conn = redb_conn(&tmp);

    // Pre-populate.
    conn.begin().unwrap();
    for i in 0..1000 {
        let key = format!("bench:key:{:04}", i);
        conn.set(&key, b"hello world").unwrap();
    }
    conn.commit().unwrap();

    c.bench_function("redb_get", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("bench:key:{:04}", i % 1000);
            let _ = conn.get(black_box(&key)).unwrap();
            i += 1;
        });
    });
}

fn bench_redb_tally_incr(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut conn = redb_conn(&tmp);

    c.bench_function("redb_tally_incr", |b| {
        b.iter(|| {
            conn.tally_incr(black_box("bench:counter")).unwrap();
        });
    });
}

fn bench_redb_list_keys(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut conn = redb_conn(&tmp);

    conn.begin().unwrap();
    for i in 0..1000 {
        let key = format!("bench:key:{:04}", i);
        conn.set(&key, b"hello world").unwrap();
    }
    conn.set("other", b"hello world").unwrap();
    conn.commit().unwrap();

    c.bench_function("redb_list_keys_1000", |b| {
        b.iter(|| {
            let keys = conn.list_keys(black_box("bench:key:*")).unwrap();
            assert_eq!(keys.len(), 1000);
        });
    });
}

criterion_group!(
    benches,
    bench_redb_set,
    bench_redb_set_in_txn,
    bench_redb_get,
    bench_redb_tally_incr,
    bench_redb_list_keys,
);
criterion_main!(benches);
