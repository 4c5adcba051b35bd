use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hyper::HeaderMap;
use httpsink::recipients::extract_recipients;
use httpsink::store::{CaptureStore, CapturedHeaders, CapturedRequest};

fn request(i: usize) -> CapturedRequest {
    CapturedRequest::new(
        "POST",
        format!("/v3/mail/send?to=user{i}@x.com"),
        CapturedHeaders::default(),
        Bytes::from(vec![b'x'; 256]),
        vec![format!("user{}@x.com", i % 16)],
    )
}

fn seeded(rt: &tokio::runtime::Runtime, size: usize) -> CaptureStore {
    let store = CaptureStore::unbounded();
    rt.block_on(async {
        for i in 0..size {
            store.append(request(i)).await.unwrap();
        }
    });
    store
}

fn bench_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = CaptureStore::unbounded();
    let mut i = 0;

    c.bench_function("store_append", |b| {
        b.iter(|| {
            i += 1;
            rt.block_on(store.append(black_box(request(i)))).unwrap()
        });
    });
}

fn bench_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("store_lookup");

    for size in [100, 1_000, 10_000] {
        let store = seeded(&rt, size);
        let middle = i64::try_from(size / 2).unwrap();

        group.bench_with_input(BenchmarkId::new("get", size), &size, |b, _| {
            b.iter(|| rt.block_on(store.get(black_box(middle))).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("by_recipient", size), &size, |b, _| {
            b.iter(|| rt.block_on(store.by_recipient(black_box("user3@x.com"))));
        });
    }

    group.finish();
}

fn bench_extract_recipients(c: &mut Criterion) {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-smtpapi",
        r#"{"personalizations":[{"to":[{"email":"a@x.com"},{"email":"b@x.com"}]}]}"#
            .parse()
            .unwrap(),
    );

    c.bench_function("extract_recipients", |b| {
        b.iter(|| {
            extract_recipients(
                black_box(Some("to=c@x.com&to%5B%5D=d@x.com")),
                black_box(&headers),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_append,
    bench_lookup,
    bench_extract_recipients
);
criterion_main!(benches);
