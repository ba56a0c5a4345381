use criterion::{criterion_group, criterion_main, Criterion};
use nerva_core::{CompoundOpcode, Dialect, OpcodeRegistry, Severity};
use std::hint::black_box;

fn bench_opcodes(c: &mut Criterion) {
    let registry = OpcodeRegistry::new();
    let mut dialect = Dialect::new("render.pulse", 12, 3);
    for i in 1..=64u16 {
        dialect = dialect.operation(format!("frame.{i}"), i);
    }
    registry.register_dialect(dialect);
    registry.seal();

    let mut group = c.benchmark_group("Opcode Registry");

    group.bench_function("Forge (known operation)", |b| {
        b.iter(|| {
            black_box(registry.forge_compound_code(
                black_box(Severity::Info),
                black_box("render.pulse"),
                black_box("frame.32"),
            ))
        });
    });

    group.bench_function("Forge (unknown apparatus)", |b| {
        b.iter(|| {
            black_box(registry.forge_compound_code(
                black_box(Severity::Warn),
                black_box("missing"),
                black_box("frame.32"),
            ))
        });
    });

    let code = registry.forge_compound_code(Severity::Info, "render.pulse", "frame.32");
    group.bench_function("Unpack", |b| {
        b.iter(|| black_box(CompoundOpcode::from_raw(black_box(code.raw())).unpack()));
    });

    group.bench_function("Resolve operation", |b| {
        b.iter(|| black_box(registry.resolve_operation(black_box("render.pulse"), black_box(32))));
    });

    group.finish();
}

criterion_group!(benches, bench_opcodes);
criterion_main!(benches);
