//! Performance benchmarks for the DSP module
//!
//! Run with: cargo bench -p specan_dsp

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use specan_dsp::{ColorPoint, ColorScale, FftModifiers, FftRunRate, FrequencyModifier, Rgb};

fn tone(len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| ((i as f32 * 0.07).sin() * 12000.0) as i16)
        .collect()
}

fn benchmark_fft_runner(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft_runner");

    for fft_size in [256, 512, 1024] {
        group.throughput(Throughput::Elements(fft_size as u64));

        group.bench_function(format!("run_{}_point", fft_size), |b| {
            // Rate picked so every call fires exactly once
            let sample_rate = 44100.0;
            let mut runner =
                FftRunRate::new(sample_rate, fft_size, sample_rate / fft_size as f32).unwrap();
            let frame = tone(runner.samples_per_fft());

            b.iter(|| {
                black_box(runner.run(black_box(&frame)).is_some());
            });
        });
    }

    group.finish();
}

fn benchmark_frequency_modifier(c: &mut Criterion) {
    c.bench_function("frequency_modifier_128_to_60", |b| {
        let modifiers = FftModifiers {
            start_freq: 300.0,
            stop_freq: 12000.0,
            clip_max: 5000,
            log_scale: true,
            atten_low_freqs: true,
            atten_low_start_level: 0.2,
            atten_low_stop_freq: 6000.0,
            ..Default::default()
        };
        let modifier = FrequencyModifier::new(44100.0, 256, 60, &modifiers).unwrap();
        let source: Vec<u16> = (0..128).map(|i| (i * 97 % 6000) as u16).collect();
        let mut bins = source.clone();

        b.iter(|| {
            bins.copy_from_slice(&source);
            black_box(modifier.modify(black_box(&mut bins)));
        });
    });
}

fn benchmark_color_lookup(c: &mut Criterion) {
    c.bench_function("color_scale_get_color", |b| {
        let scale = ColorScale::from_colors(&[
            ColorPoint {
                color: Rgb::new(255, 0, 0),
                start: 0.0,
            },
            ColorPoint {
                color: Rgb::new(0, 255, 0),
                start: 0.4,
            },
            ColorPoint {
                color: Rgb::new(0, 0, 255),
                start: 1.0,
            },
        ])
        .unwrap();
        let mut position = 0_u16;

        b.iter(|| {
            position = position.wrapping_add(613);
            black_box(scale.get_color(black_box(position), 0.8));
        });
    });
}

criterion_group!(
    benches,
    benchmark_fft_runner,
    benchmark_frequency_modifier,
    benchmark_color_lookup
);

criterion_main!(benches);
