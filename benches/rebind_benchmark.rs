//! Criterion comparison of repeated single-row UPDATEs: a by-reference session that
//! keeps its prepared statement and only rebinds on kind changes, a by-value session
//! that rebuilds the statement every time, and raw `rusqlite` as the floor.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusqlite::params;
use sql_bindery::prelude::*;
use std::hint::black_box;
use std::sync::Arc;

const ROWS: i64 = 1_000;

fn seed(conn: &dyn Connection) -> Result<(), BackendError> {
    conn.exec("CREATE TABLE t_video (id INTEGER PRIMARY KEY, stock INTEGER)")?;
    conn.exec(&format!(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {ROWS}) \
         INSERT INTO t_video (id, stock) SELECT i, 0 FROM n"
    ))?;
    Ok(())
}

fn session() -> Result<(Session, Arc<Registry>), BinderyError> {
    let registry = Registry::with_allocator(TagAllocator::seeded(11));
    let conn = SqliteConnection::builder(":memory:".into()).wal(false).open()?;
    seed(&conn)?;
    registry.add_connection_instance("bench", Arc::new(conn), true);
    Ok((Session::new(&registry), registry))
}

fn workload(len: usize) -> Vec<(i64, Option<i64>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..len)
        .map(|_| {
            let id = rng.random_range(1..=ROWS);
            // roughly one in ten updates writes NULL and forces a rebind
            let stock = (rng.random_range(0..10) != 0).then(|| rng.random_range(0..500));
            (id, stock)
        })
        .collect()
}

fn bench_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebind_updates");
    for len in [100_usize, 1_000] {
        let ops = workload(len);
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("by_reference", len), &ops, |b, ops| {
            let (mut session, _registry) = session().unwrap();
            let id = ValueCell::new(1);
            let stock = ValueCell::default();
            let by_ref = session.injector_in(BindMode::ByReference);
            let id_tag = by_ref
                .inject(Param::from(&id), BindOpts::typed(SemanticType::Int))
                .unwrap();
            let stock_tag = by_ref
                .inject(Param::from(&stock), BindOpts::typed(SemanticType::Int).nullable())
                .unwrap();
            let sql = format!("UPDATE t_video SET stock = {stock_tag} WHERE id = {id_tag}");
            b.iter(|| {
                for (row, value) in ops {
                    id.set(*row);
                    stock.set(*value);
                    black_box(session.update(&sql).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("by_value", len), &ops, |b, ops| {
            let (mut session, _registry) = session().unwrap();
            b.iter(|| {
                for (row, value) in ops {
                    let by_val = session.injector_in(BindMode::ByValue);
                    let stock_tag = by_val
                        .inject(Param::from(*value), BindOpts::typed(SemanticType::Int).nullable())
                        .unwrap();
                    let id_tag = by_val.inject_as(*row, SemanticType::Int).unwrap();
                    let sql = format!("UPDATE t_video SET stock = {stock_tag} WHERE id = {id_tag}");
                    black_box(session.update(&sql).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("rusqlite", len), &ops, |b, ops| {
            let conn = rusqlite::Connection::open_in_memory().unwrap();
            conn.execute_batch("CREATE TABLE t_video (id INTEGER PRIMARY KEY, stock INTEGER)")
                .unwrap();
            b.iter(|| {
                let mut stmt = conn
                    .prepare_cached("UPDATE t_video SET stock = ?1 WHERE id = ?2")
                    .unwrap();
                for (row, value) in ops {
                    black_box(stmt.execute(params![value, row]).unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_updates);
criterion_main!(benches);
