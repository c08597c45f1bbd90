use brpc::{
    lexer,
    token::{Token, TokenKind},
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

static INPUT: &str = include_str!("../data/big.brpc");

fn lexer(input: &str, tokens: &mut Vec<Token>) {
    lexer::lex(input, tokens);
    let errors = tokens.iter().filter(|token| token.kind.is_error()).count();
    assert_eq!(errors, 0);
    black_box(tokens.last().map(|token| token.kind == TokenKind::Eof));
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY * 2);

    c.bench_function("lexer", |b| {
        b.iter(|| {
            tokens.clear();
            lexer(black_box(INPUT), &mut tokens);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
