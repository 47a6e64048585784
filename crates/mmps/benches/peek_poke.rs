#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use mmps::{Bank, BankId};

fn peek_poke_round_trip(c: &mut Criterion) {
    let mut bank = Bank::new_heap(BankId(0), 512, 0, 64);

    c.bench_function("bank peek/poke round trip", |b| {
        b.iter(|| {
            let buf = bank.peek().expect("bank sized large enough for the benchmark");
            bank.poke(black_box(buf));
        })
    });
}

fn chained_write(c: &mut Criterion) {
    use mmps::pool::Pool;
    use mmps::Chain;

    let mut pool = Pool::new();
    pool.add_bank(Bank::new_heap(BankId(0), 64, 0, 256)).unwrap();
    let payload = vec![0xABu8; 4096];

    c.bench_function("chain put_data spanning many buffers", |b| {
        b.iter(|| {
            let mut chain = Chain::new();
            chain.put_data(&pool, black_box(&payload)).unwrap();
            pool.poke_chain(chain).unwrap();
        })
    });
}

criterion_group!(benches, peek_poke_round_trip, chained_write);
criterion_main!(benches);
