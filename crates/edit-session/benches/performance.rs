use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use edit_session::{EditSession, Position, Range, Rule, RuleTable, SessionMode, Tokenizer};

fn large_text(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 64);
    for i in 0..line_count {
        out.push_str(&format!(
            "{i:06} let quick = brown(fox); /* jumps */ over(the, lazy, dog);\n"
        ));
    }
    // Drop the final '\n' so there is no trailing empty row.
    out.pop();
    out
}

fn code_mode() -> SessionMode {
    let mut rules = RuleTable::new();
    rules.insert(
        "start".to_string(),
        vec![
            Rule::new(r"/\*", "comment").next("comment"),
            Rule::new(r"\b(?:let|fn|if|else)\b", "keyword"),
            Rule::new(r"\d+", "constant.numeric"),
            Rule::new(r"[a-zA-Z_]\w*", "identifier"),
            Rule::new(r"[(){};,=]", "punctuation"),
        ],
    );
    rules.insert(
        "comment".to_string(),
        vec![
            Rule::new(r"\*/", "comment").next("start"),
            Rule::default_token("comment"),
        ],
    );
    SessionMode::new("bench/code", Tokenizer::new(rules).unwrap())
}

fn bench_large_file_open(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("large_file_open/50k_lines", |b| {
        b.iter(|| {
            let session = EditSession::new(black_box(&text));
            black_box(session.len());
        })
    });
}

fn bench_tokenize_all(c: &mut Criterion) {
    let text = large_text(10_000);
    c.bench_function("tokenize_all/10k_lines", |b| {
        b.iter_batched(
            || {
                let mut session = EditSession::new(&text);
                session.set_mode(code_mode());
                session
            },
            |mut session| {
                black_box(session.tokenize_all());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let text = large_text(50_000);
    c.bench_function("typing_middle/100_inserts", |b| {
        b.iter_batched(
            || EditSession::new(&text),
            |mut session| {
                let mut at = Position::new(25_000, 10);
                for _ in 0..100 {
                    at = session.insert(at, "x");
                }
                black_box(session.line_len(25_000));
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_screen_mapping_with_folds(c: &mut Criterion) {
    let text = large_text(50_000);
    let mut session = EditSession::new(&text);
    for row in (0..49_000).step_by(100) {
        session
            .add_fold("...", Range::new(row + 1, 0, row + 50, 5))
            .unwrap();
    }
    c.bench_function("screen_mapping/folded_50k_lines", |b| {
        b.iter(|| {
            let screen = session.document_to_screen_position(black_box(40_010), 7);
            black_box(session.screen_to_document_position(screen.row, screen.column));
        })
    });
}

criterion_group!(
    benches,
    bench_large_file_open,
    bench_tokenize_all,
    bench_typing_in_middle,
    bench_screen_mapping_with_folds
);
criterion_main!(benches);
