use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tms_core::tms1100::{NoIo, Tms1100};
use tms_core::{Cpu, Rom};

/// A one-page program that counts Y around and restarts forever:
/// TCY 0; IYC; YNEC 0; BR 1; BR 0.
fn looping_rom() -> Rom {
    let mut code = vec![0x00u8; 64];
    code[0] = 0x40; // TCY 0
    code[1] = 0x05; // IYC
    code[2] = 0x50; // YNEC 0
    code[3] = 0x81; // BR 1 while Y != 0
    code[4] = 0x80; // BR 0
    Rom::from_logical(code).expect("static program")
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("tms1100_step");

    group.bench_function("single_instruction", |b| {
        b.iter(|| {
            let mut cpu = Tms1100::new(looping_rom(), 128, NoIo);
            cpu.regs.pa = 0;
            cpu.regs.pb = 0;
            cpu.step().unwrap();
            black_box(cpu.regs.y);
        });
    });

    group.finish();
}

fn bench_multiple_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("tms1100_multiple_steps");

    for step_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(step_count),
            step_count,
            |b, &count| {
                b.iter(|| {
                    let mut cpu = Tms1100::new(looping_rom(), 128, NoIo);
                    cpu.regs.pa = 0;
                    cpu.regs.pb = 0;
                    for _ in 0..count {
                        cpu.step().unwrap();
                    }
                    black_box(cpu.regs.pc);
                });
            },
        );
    }

    group.finish();
}

fn bench_reset(c: &mut Criterion) {
    c.bench_function("tms1100_reset", |b| {
        let mut cpu = Tms1100::new(looping_rom(), 128, NoIo);
        b.iter(|| {
            cpu.reset();
            black_box(cpu.regs.pc);
        });
    });
}

criterion_group!(benches, bench_step, bench_multiple_steps, bench_reset);
criterion_main!(benches);
