use brpc::{
    lexer::SUGGESTED_TOKENS_CAPACITY,
    parser::{parse_schema, ParseOptions},
    token::Token,
    util::intern::Names,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

static INPUT: &str = include_str!("../data/big.brpc");

fn parser(input: &str, tokens: &mut Vec<Token>, names: &mut Names) {
    let schema = parse_schema(input, tokens, names, ParseOptions::default()).unwrap();
    _ = black_box(schema);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY * 2);

    c.bench_function("parser", |b| {
        b.iter(|| {
            tokens.clear();
            let mut names = Names::new();
            black_box(parser(black_box(INPUT), &mut tokens, &mut names));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
