use criterion::{criterion_group, criterion_main, Criterion};
use treelox::Treelox;

fn fibonacci() {
    let src = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 2) + fib(n - 1);
        }

        fib(20);
    "#;

    let mut treelox = Treelox::new();
    treelox.run(src);
    assert!(!treelox.had_error() && !treelox.had_runtime_error());
}

fn method_dispatch() {
    let src = r#"
        class Zoo {
            init() {
                this.aardvark = 1;
                this.baboon   = 1;
                this.cat      = 1;
            }
            ant()    { return this.aardvark; }
            banana() { return this.baboon; }
            tuna()   { return this.cat; }
        }

        var zoo = Zoo();
        var sum = 0;
        while (sum < 30000) {
            sum = sum + zoo.ant() + zoo.banana() + zoo.tuna();
        }
    "#;

    let mut treelox = Treelox::new();
    treelox.run(src);
    assert!(!treelox.had_error() && !treelox.had_runtime_error());
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");
    group.sample_size(20);
    group.bench_function("fib 20", |b| b.iter(fibonacci));
    group.bench_function("method dispatch", |b| b.iter(method_dispatch));
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
