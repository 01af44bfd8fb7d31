use super::*;

#[test]
fn same_seed_same_stream() {
    let mut a = FieldRng::new(7);
    let mut b = FieldRng::new(7);
    for _ in 0..64 {
        assert_eq!(a.unit().to_bits(), b.unit().to_bits());
    }
    for _ in 0..64 {
        assert_eq!(a.normal(0.5).to_bits(), b.normal(0.5).to_bits());
    }
}

#[test]
fn different_seeds_diverge() {
    let mut a = FieldRng::new(1);
    let mut b = FieldRng::new(2);
    let sa: Vec<u32> = (0..16).map(|_| a.unit().to_bits()).collect();
    let sb: Vec<u32> = (0..16).map(|_| b.unit().to_bits()).collect();
    assert_ne!(sa, sb);
}

#[test]
fn unit_samples_stay_in_half_open_interval() {
    let mut rng = FieldRng::new(1337);
    for _ in 0..10_000 {
        let v = rng.unit();
        assert!((0.0..1.0).contains(&v));
    }
}

#[test]
fn zero_std_dev_is_zero() {
    let mut rng = FieldRng::new(3);
    assert_eq!(rng.normal(0.0), 0.0);
    assert_eq!(rng.seed(), 3);
}
