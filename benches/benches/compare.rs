// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use understory_regression::{Image, NeighborhoodMetric, ToleranceConfig, compare_images};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }
}

/// A noisy gradient, and a copy with every `stride`-th pixel perturbed.
fn image_pair(size: &[usize], stride: usize, seed: u64) -> (Image, Image) {
    let mut rng = Lcg::new(seed);
    let baseline = Image::from_fn(size, |i| {
        (i[0] + 2 * i[1]) as f64 + f64::from(rng.next_u32() % 4)
    })
    .expect("valid size");
    let mut n = 0_usize;
    let test = Image::from_fn(size, |i| {
        n += 1;
        let v = baseline.get(i).expect("same size");
        if n % stride == 0 { v + 40.0 } else { v }
    })
    .expect("valid size");
    (test, baseline)
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_regression");
    group.sample_size(20);

    for &(width, height) in &[(64_usize, 64_usize), (256, 256)] {
        let (test, baseline) = image_pair(&[width, height], 97, 0xC0FF_EE00_0000_0001);

        for radius in [0_usize, 1, 2] {
            let tolerance = ToleranceConfig::default().with_radius(radius);
            group.bench_function(format!("compare(w={width},h={height},r={radius})"), |b| {
                b.iter(|| black_box(compare_images(&test, &baseline, &tolerance)));
            });
        }

        let ball = ToleranceConfig::default()
            .with_radius(2)
            .with_metric(NeighborhoodMetric::Euclidean);
        group.bench_function(format!("compare_ball(w={width},h={height},r=2)"), |b| {
            b.iter(|| black_box(compare_images(&test, &baseline, &ball)));
        });
    }

    let (test, baseline) = image_pair(&[32, 32, 16], 97, 0xC0FF_EE00_0000_0002);
    let tolerance = ToleranceConfig::default().with_radius(1);
    group.bench_function("compare_volume(32x32x16,r=1)", |b| {
        b.iter(|| black_box(compare_images(&test, &baseline, &tolerance)));
    });

    group.finish();
}

criterion_group!(benches, bench_compare);
criterion_main!(benches);
