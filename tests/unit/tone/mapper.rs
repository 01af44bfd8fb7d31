use super::*;
use crate::foundation::core::FrameSize;
use crate::sim::rng::FieldRng;
use crate::tone::palette::{Grayscale, GrayscaleOnly, RampPalette, resolve_palette_in};

fn size(w: u32, h: u32) -> FrameSize {
    FrameSize::new(w, h).unwrap()
}

fn gray(contrast: f64, gamma: f64) -> ToneMapper {
    ToneMapper::new(ToneParams { contrast, gamma }, Box::new(Grayscale))
}

fn red_ramp() -> RampPalette {
    RampPalette::from_stops("red", vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]).unwrap()
}

#[test]
fn tone_params_validation() {
    ToneParams::default().validate().unwrap();
    for (contrast, gamma) in [
        (0.0, 1.0),
        (-1.0, 1.0),
        (1.0, 0.0),
        (f64::NAN, 1.0),
        (1.0, f64::INFINITY),
    ] {
        assert!(ToneParams { contrast, gamma }.validate().is_err());
    }
}

#[test]
fn grayscale_quantizes_with_rounding() {
    let m = gray(1.0, 1.0);
    assert_eq!(m.map_cell(0.0), [0, 0, 0]);
    assert_eq!(m.map_cell(1.0), [255, 255, 255]);
    assert_eq!(m.map_cell(0.5), [128, 128, 128]);
    assert_eq!(m.map_cell(0.2), [51, 51, 51]);
}

#[test]
fn contrast_scales_then_clamps() {
    let m = gray(2.0, 1.0);
    assert_eq!(m.map_cell(0.3), [153, 153, 153]);
    assert_eq!(m.map_cell(0.7), [255, 255, 255]);
}

#[test]
fn gamma_applies_inverse_power() {
    let m = gray(1.0, 2.0);
    assert_eq!(m.map_cell(0.36), [153, 153, 153]);
    assert_eq!(m.map_cell(0.0), [0, 0, 0]);
    assert_eq!(m.map_cell(1.0), [255, 255, 255]);
}

#[test]
fn contrast_happens_before_palette_lookup() {
    let m = ToneMapper::new(
        ToneParams {
            contrast: 2.0,
            gamma: 1.0,
        },
        Box::new(red_ramp()),
    );
    assert_eq!(m.map_cell(0.25), [128, 0, 0]);
}

#[test]
fn gamma_applies_per_channel_after_palette() {
    let ramp = RampPalette::from_stops("rg", vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]).unwrap();
    let m = ToneMapper::new(
        ToneParams {
            contrast: 1.0,
            gamma: 2.0,
        },
        Box::new(ramp),
    );
    // sample(0.36) = [0.36, 0.64, 0]
    assert_eq!(m.map_cell(0.36), [153, 204, 0]);
}

#[test]
fn frame_layout_is_row_major_rgb() {
    let grid = Grid::from_cells(size(3, 2), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]).unwrap();
    let frame = gray(1.0, 1.0).map(&grid);
    assert_eq!(frame.data.len(), 3 * 2 * 3);
    assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
    assert_eq!(frame.pixel(2, 0), [102, 102, 102]);
    assert_eq!(frame.pixel(0, 1), [153, 153, 153]);
    assert_eq!(&frame.data[15..18], &[255, 255, 255]);
}

#[test]
fn neutral_tone_equals_raw_palette_mapping() {
    let grid = Grid::random(size(9, 7), &mut FieldRng::new(11));
    let ramp = red_ramp();
    let frame = map_grid(&grid, ToneParams::default(), &ramp);
    for (i, &v) in grid.cells().iter().enumerate() {
        let c = ramp.sample(v);
        let expected = [
            (c[0] * 255.0).round() as u8,
            (c[1] * 255.0).round() as u8,
            (c[2] * 255.0).round() as u8,
        ];
        assert_eq!(&frame.data[i * 3..i * 3 + 3], &expected);
    }
}

#[test]
fn gamma_round_trip_is_within_one_step() {
    let grid = Grid::random(size(32, 32), &mut FieldRng::new(2024));
    let reference = gray(1.0, 1.0).map(&grid);

    let brightened = gray(1.0, 2.0).map(&grid);
    let cells = brightened
        .data
        .chunks_exact(3)
        .map(|px| f32::from(px[0]) / 255.0)
        .collect();
    let back = gray(1.0, 0.5).map(&Grid::from_cells(size(32, 32), cells).unwrap());

    for (a, b) in reference.data.iter().zip(&back.data) {
        assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
    }
}

#[test]
fn grayscale_fallback_matches_explicit_gray() {
    let grid = Grid::random(size(10, 6), &mut FieldRng::new(5));
    let params = ToneParams {
        contrast: 1.3,
        gamma: 1.8,
    };
    let explicit = ToneMapper::new(params, Box::new(Grayscale)).map(&grid);
    let fallback = resolve_palette_in("plasma", &GrayscaleOnly);
    assert!(fallback.fallback.is_some());
    let fell_back = ToneMapper::new(params, fallback.palette).map(&grid);
    assert_eq!(explicit, fell_back);
}

#[test]
fn map_into_reuses_and_resizes() {
    let m = gray(1.0, 1.0);
    let grid = Grid::filled(size(4, 4), 0.5);
    let mut out = FrameBuffer::new(size(2, 2));
    m.map_into(&grid, &mut out);
    assert_eq!(out.size(), size(4, 4));
    assert!(out.data.iter().all(|&b| b == 128));
    assert_eq!(m.palette().name(), "gray");
}
