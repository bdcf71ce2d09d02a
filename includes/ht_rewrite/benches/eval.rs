use std::{hint::black_box, str::FromStr};

use criterion::{Criterion, criterion_group, criterion_main};
use ht_rewrite::{Engine, RequestContext};
use pprof::criterion::{Output, PProfProfiler};

fn profiled() -> Criterion {
    let output = Output::Flamegraph(None);
    let prof = PProfProfiler::new(1000, output);
    Criterion::default().with_profiler(prof)
}

fn rewrite_match(engine: &Engine, ctx: &RequestContext) {
    let result = engine.rewrite(ctx);
    assert_eq!(result.uri, "http://h/files/hello%2Fworld");
}

fn rewrite_gated(engine: &Engine, ctx: &RequestContext) {
    let result = engine.rewrite(ctx);
    assert_eq!(result.uri, "http://h/ie/landing");
}

pub fn bench_rule_match(c: &mut Criterion) {
    let engine = Engine::from_str("RewriteRule ^static/(.*)$ /files/$1 [L]").unwrap();
    let ctx = RequestContext::new("http://h/static/hello/world");
    c.bench_function("basic_match", |b| {
        b.iter(|| black_box(rewrite_match(black_box(&engine), black_box(&ctx))))
    });
}

pub fn bench_condition_gate(c: &mut Criterion) {
    let engine = Engine::from_str(
        r#"
        RewriteCond %{HTTP_USER_AGENT} MSIE [NC]
        RewriteRule ^(.*)$ /ie/$1 [L]
    "#,
    )
    .unwrap();
    let ctx = RequestContext::new("http://h/landing")
        .user_agent("Mozilla/4.0 (compatible; MSIE 6.0)");
    c.bench_function("condition_gate", |b| {
        b.iter(|| black_box(rewrite_gated(black_box(&engine), black_box(&ctx))))
    });
}

criterion_group!(
    name = benches;
    config = profiled();
    targets = bench_rule_match, bench_condition_gate
);
criterion_main!(benches);
