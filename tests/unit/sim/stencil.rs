use super::*;
use crate::foundation::core::FrameSize;

fn size(w: u32, h: u32) -> FrameSize {
    FrameSize::new(w, h).unwrap()
}

fn still() -> EvolveParams {
    EvolveParams {
        weights: StencilWeights::default(),
        wave: WaveParams::default(),
        drift: DriftParams::none(),
        noise_amplitude: 0.0,
        global_modulation: 0.0,
    }
}

fn impulse(w: u32, h: u32, x: usize, y: usize) -> Grid {
    let mut g = Grid::new(size(w, h));
    let width = g.width();
    g.cells_mut()[y * width + x] = 1.0;
    g
}

#[test]
fn default_weights_sum_to_one() {
    let weights = StencilWeights::default();
    assert!((weights.total() - 1.0).abs() < 1e-12);
    weights.validate().unwrap();
}

#[test]
fn weights_validation_rejects_bad_kernels() {
    let lossy = StencilWeights {
        center: 0.5,
        orthogonal: 0.1,
        diagonal: 0.1,
    };
    assert!(lossy.validate().is_err());

    let negative = StencilWeights {
        center: 1.2,
        orthogonal: -0.05,
        diagonal: 0.0,
    };
    assert!(negative.validate().is_err());

    let nan = StencilWeights {
        center: f64::NAN,
        ..StencilWeights::default()
    };
    assert!(nan.validate().is_err());
}

#[test]
fn uniform_field_is_a_fixed_point() {
    for v in [0.0f32, 0.25, 0.5, 0.73, 1.0] {
        let g = Grid::filled(size(7, 5), v);
        let next = evolve(&g, 3, &still(), &mut FieldRng::new(1));
        for &c in next.cells() {
            assert!((c - v).abs() <= 1e-6, "v={v} got {c}");
        }
    }
}

#[test]
fn uniform_field_survives_drift() {
    let params = EvolveParams {
        drift: DriftParams::default(),
        ..still()
    };
    let g = Grid::filled(size(6, 6), 0.4);
    let next = evolve(&g, 0, &params, &mut FieldRng::new(1));
    for &c in next.cells() {
        assert!((c - 0.4).abs() <= 1e-6);
    }
}

#[test]
fn impulse_spreads_toroidally() {
    let g = impulse(5, 4, 0, 0);
    let next = evolve(&g, 0, &still(), &mut FieldRng::new(1));
    let w = StencilWeights::default();
    let close = |a: f32, b: f64| (f64::from(a) - b).abs() < 1e-6;

    assert!(close(next.get(0, 0), w.center));
    // Orthogonal neighbours, two of them across the wrap.
    assert!(close(next.get(1, 0), w.orthogonal));
    assert!(close(next.get(4, 0), w.orthogonal));
    assert!(close(next.get(0, 1), w.orthogonal));
    assert!(close(next.get(0, 3), w.orthogonal));
    // Diagonals, three across a wrap.
    assert!(close(next.get(1, 1), w.diagonal));
    assert!(close(next.get(4, 1), w.diagonal));
    assert!(close(next.get(1, 3), w.diagonal));
    assert!(close(next.get(4, 3), w.diagonal));
    // Untouched.
    assert_eq!(next.get(2, 2), 0.0);

    let total: f64 = next.cells().iter().map(|&c| f64::from(c)).sum();
    assert!((total - 1.0).abs() < 1e-5);
}

#[test]
fn one_shot_evolve_does_not_touch_input() {
    let g = impulse(4, 4, 1, 2);
    let before = g.clone();
    let _ = evolve(&g, 9, &still(), &mut FieldRng::new(1));
    assert_eq!(g, before);
}

#[test]
fn drift_offsets_follow_slow_sinusoids() {
    let d = DriftParams::default();
    // cos(0) * 2 == 2 exactly; any later step truncates to 1 until the cosine falls further.
    assert_eq!(d.offsets(0), (0, 2));
    assert_eq!(d.offsets(1), (0, 1));
    // sin(600 * 0.001) * 2 = 1.129...
    assert_eq!(d.offsets(600).0, 1);
    // sin(2000 * 0.001) * 2 = 1.818..., cos(2000 * 0.0013) * 2 = -1.713...
    assert_eq!(d.offsets(2000), (1, -1));
    assert_eq!(DriftParams::none().offsets(1234), (0, 0));
}

#[test]
fn drift_moves_content_down_and_right() {
    let identity = StencilWeights {
        center: 1.0,
        orthogonal: 0.0,
        diagonal: 0.0,
    };
    let params = EvolveParams {
        weights: identity,
        drift: DriftParams::default(),
        ..still()
    };
    // Step 0 shifts by (0 rows, 2 columns).
    let g = impulse(5, 3, 4, 1);
    let next = evolve(&g, 0, &params, &mut FieldRng::new(1));
    assert_eq!(next.get(1, 1), 1.0);
    assert_eq!(next.cells().iter().filter(|&&c| c != 0.0).count(), 1);
}

#[test]
fn drift_validation_bounds_amplitude() {
    let mut d = DriftParams::default();
    d.validate().unwrap();
    d.max_cells = MAX_DRIFT_CELLS + 1.0;
    assert!(d.validate().is_err());
    d.max_cells = -1.0;
    assert!(d.validate().is_err());
    d.max_cells = 1.0;
    d.rate_x = f64::INFINITY;
    assert!(d.validate().is_err());
}

#[test]
fn wave_matches_closed_form() {
    let params = EvolveParams {
        global_modulation: 1.0,
        ..still()
    };
    let g = Grid::filled(size(8, 4), 0.5);
    let step = 10u64;
    let next = evolve(&g, step, &params, &mut FieldRng::new(1));
    let wave = WaveParams::default();
    for y in 0..4usize {
        for x in 0..8usize {
            let arg = wave.freq_x * TAU * x as f64 / 8.0
                + wave.freq_y * TAU * y as f64 / 4.0
                + step as f64 * wave.phase_rate;
            let expected = 0.5 + wave.amplitude * arg.sin();
            assert!((f64::from(next.get(x, y)) - expected).abs() < 1e-6);
        }
    }
}

#[test]
fn values_stay_clamped_under_heavy_forcing() {
    let params = EvolveParams {
        weights: StencilWeights::default(),
        wave: WaveParams {
            amplitude: 3.0,
            ..WaveParams::default()
        },
        drift: DriftParams::default(),
        noise_amplitude: 0.5,
        global_modulation: 1.0,
    };
    let mut rng = FieldRng::new(5);
    let mut g = Grid::random(size(17, 11), &mut rng);
    let mut evolver = Evolver::new(params);
    for step in 0..25 {
        g = evolver.evolve(g, step, &mut rng);
        let (lo, hi) = g.value_range();
        assert!(lo >= 0.0 && hi <= 1.0, "step {step}: [{lo}, {hi}]");
    }
}

#[test]
fn noisy_runs_reproduce_with_same_seed() {
    let params = EvolveParams {
        noise_amplitude: 0.05,
        global_modulation: 0.6,
        drift: DriftParams::default(),
        ..still()
    };
    let run = |seed: u64| {
        let mut rng = FieldRng::new(seed);
        let mut g = Grid::random(size(12, 8), &mut rng);
        let mut evolver = Evolver::new(params);
        for step in 0..10 {
            g = evolver.evolve(g, step, &mut rng);
        }
        g
    };
    assert_eq!(run(99), run(99));
    assert_ne!(run(99), run(100));
}

#[test]
fn noise_consumes_one_sample_per_cell() {
    let params = EvolveParams {
        noise_amplitude: 0.01,
        ..still()
    };
    let mut a = FieldRng::new(8);
    let g = Grid::filled(size(3, 3), 0.5);
    let _ = evolve(&g, 0, &params, &mut a);

    let mut b = FieldRng::new(8);
    for _ in 0..9 {
        b.normal(1.0);
    }
    assert_eq!(a.unit().to_bits(), b.unit().to_bits());
}
