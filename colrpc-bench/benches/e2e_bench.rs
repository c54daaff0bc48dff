//! End-to-end client-server benchmarks.

use async_trait::async_trait;
use bytes::Bytes;
use colrpc_client::{Client, ConnectionConfig};
use colrpc_protocol::types::{
    Column, ColumnOrSuperColumn, ColumnParent, ColumnPath, ConsistencyLevel, NotFoundException,
};
use colrpc_server::{Handler, HandlerError, Server, ServerConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;

/// Single-family column store keyed by (row, column).
#[derive(Default)]
struct BenchStore {
    columns: Mutex<HashMap<(Bytes, Bytes), Column>>,
}

#[async_trait]
impl Handler for BenchStore {
    async fn describe_version(&self) -> Result<String, HandlerError> {
        Ok("19.36.0".to_string())
    }

    async fn insert(
        &self,
        key: Bytes,
        _column_parent: ColumnParent,
        column: Column,
        _consistency_level: ConsistencyLevel,
    ) -> Result<(), HandlerError> {
        self.columns
            .lock()
            .unwrap()
            .insert((key, column.name.clone()), column);
        Ok(())
    }

    async fn get(
        &self,
        key: Bytes,
        column_path: ColumnPath,
        _consistency_level: ConsistencyLevel,
    ) -> Result<ColumnOrSuperColumn, HandlerError> {
        let name = column_path.column.unwrap_or_default();
        let column = self
            .columns
            .lock()
            .unwrap()
            .get(&(key, name))
            .cloned()
            .ok_or(NotFoundException {})?;
        Ok(ColumnOrSuperColumn {
            column: Some(column),
            ..Default::default()
        })
    }
}

struct TestSetup {
    _server_handle: tokio::task::JoinHandle<()>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(Server::new(
            ServerConfig::new(addr),
            BenchStore::default(),
        ));
        let server_handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();

        TestSetup {
            _server_handle: server_handle,
            client,
        }
    })
}

fn bench_describe_version_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_describe_version");
    group.throughput(Throughput::Elements(1));

    group.bench_function("describe_version", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.describe_version().await.unwrap()) });
    });

    group.finish();
}

fn bench_insert_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_insert");

    for size in [100, 1000, 10000] {
        let value = Bytes::from(vec![0x78u8; size]);
        let mut id = 0u64;

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.to_async(&rt).iter(|| {
                id += 1;
                let client = &setup.client;
                let key = Bytes::from(format!("row-{}", id));
                let column = Column::new(Bytes::from_static(b"payload"), value.clone(), id as i64);
                async move {
                    black_box(
                        client
                            .insert(key, ColumnParent::new("Standard1"), column, ConsistencyLevel::ONE)
                            .await
                            .unwrap(),
                    )
                }
            });
        });
    }

    group.finish();
}

fn bench_get_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    // Pre-populate rows
    rt.block_on(async {
        for i in 0..100 {
            setup
                .client
                .insert(
                    Bytes::from(format!("get-row-{}", i)),
                    ColumnParent::new("Standard1"),
                    Column::new(Bytes::from_static(b"n"), Bytes::from_static(b"v"), i),
                    ConsistencyLevel::ONE,
                )
                .await
                .unwrap();
        }
    });

    let mut group = c.benchmark_group("e2e_get");
    group.throughput(Throughput::Elements(1));

    let mut id = 0usize;
    group.bench_function("hit", |b| {
        b.to_async(&rt).iter(|| {
            id = (id + 1) % 100;
            let client = &setup.client;
            let key = Bytes::from(format!("get-row-{}", id));
            async move {
                black_box(
                    client
                        .get(
                            key,
                            ColumnPath::new("Standard1").with_column(Bytes::from_static(b"n")),
                            ConsistencyLevel::ONE,
                        )
                        .await
                        .unwrap(),
                )
            }
        });
    });

    group.bench_function("not_found", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                setup
                    .client
                    .get(
                        Bytes::from_static(b"missing"),
                        ColumnPath::new("Standard1").with_column(Bytes::from_static(b"n")),
                        ConsistencyLevel::ONE,
                    )
                    .await
                    .unwrap_err(),
            )
        });
    });

    group.finish();
}

fn bench_concurrent_requests(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_concurrent");
    group.sample_size(20);

    for concurrency in [1, 10, 50] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_with_input(
            BenchmarkId::new("describe_version", concurrency),
            &concurrency,
            |b, &conc| {
                b.to_async(&rt).iter(|| {
                    let client = &setup.client;
                    async move {
                        let futures: Vec<_> =
                            (0..conc).map(|_| client.describe_version()).collect();
                        black_box(futures::future::join_all(futures).await)
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_describe_version_latency,
    bench_insert_e2e,
    bench_get_e2e,
    bench_concurrent_requests,
);

criterion_main!(benches);
