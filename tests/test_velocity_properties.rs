mod common;

use approx::assert_relative_eq;
use ndarray::Array2;
use sarvel::core::{LinearErrorTerm, RangeProjector};
use sarvel::io::encoding::encode_velocity;
use sarvel::VelocityDeriver;

#[test]
fn test_outlier_stable_pixel_ignored() {
    let _ = env_logger::builder().is_test(true).try_init();

    let shape = (4, 4);
    let mut inputs = common::optical_inputs(shape);
    inputs.vx = Array2::zeros(shape);
    inputs.vx[[1, 2]] = 1000.0;
    inputs.vy = Array2::zeros(shape);
    inputs.stable_surface = Array2::from_elem(shape, true);

    let product = VelocityDeriver::standard().derive(&inputs).unwrap();
    assert_eq!(product.stable_count, 16);
    assert!(product.stable_shift_applied);
    assert_eq!(product.vx.stable_shift, 0.0);
    assert_eq!(product.vx.error, 0.0);
}

#[test]
fn test_error_model_fallback_scales_with_baseline() {
    let shape = (3, 3);
    let mut inputs = common::radar_inputs(shape);
    inputs.stable_surface = Array2::from_elem(shape, false);
    inputs.error_model.vx = LinearErrorTerm::new(0.1, 5.0);

    let product = VelocityDeriver::standard().derive(&inputs).unwrap();
    assert_eq!(product.stable_count, 0);
    assert!(!product.stable_shift_applied);
    // (0.1 * 12 + 5) / 12 * 365
    assert_relative_eq!(product.vx.error, 6.2 / 12.0 * 365.0, epsilon = 1e-9);

    let radar = product.radar.unwrap();
    assert_eq!(radar.vr.stable_shift, 0.0);
    assert_eq!(radar.vxp.stable_shift, 0.0);
    // (0.05 * 12 + 2) / 12 * 365
    assert_relative_eq!(radar.vr.error, 2.6 / 12.0 * 365.0, epsilon = 1e-9);
}

#[test]
fn test_magnitude_matches_components() {
    let inputs = common::radar_inputs((5, 4));
    let product = VelocityDeriver::standard().derive(&inputs).unwrap();

    for ((&vx, &vy), &v) in product.vx.values.iter().zip(&product.vy.values).zip(&product.v) {
        assert_relative_eq!(v, (vx * vx + vy * vy).sqrt(), epsilon = 1e-4);
    }

    let radar = product.radar.as_ref().unwrap();
    for ((&vx, &vy), &v) in radar.vxp.values.iter().zip(&radar.vyp.values).zip(&radar.vp) {
        assert_relative_eq!(v, (vx * vx + vy * vy).sqrt(), epsilon = 1e-4);
    }
}

#[test]
fn test_derivation_is_deterministic() {
    let mut inputs = common::radar_inputs((6, 5));
    inputs.vy[[3, 1]] = f32::NAN;
    let deriver = VelocityDeriver::standard();

    let first = deriver.derive(&inputs).unwrap();
    let second = deriver.derive(&inputs).unwrap();

    let bits = |a: &Array2<f32>| a.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&first.vx.values), bits(&second.vx.values));
    assert_eq!(bits(&first.v_error), bits(&second.v_error));

    let (r1, r2) = (first.radar.unwrap(), second.radar.unwrap());
    assert_eq!(bits(&r1.vxp.values), bits(&r2.vxp.values));
    assert_eq!(bits(&r1.vp_error), bits(&r2.vp_error));
    assert_eq!(r1.vxp.stable_shift.to_bits(), r2.vxp.stable_shift.to_bits());
}

#[test]
fn test_no_data_propagates_to_radar_variables() {
    let shape = (3, 3);
    let mut inputs = common::radar_inputs(shape);
    inputs.vy[[1, 1]] = f32::NAN;

    let product = VelocityDeriver::standard().derive(&inputs).unwrap();
    let radar = product.radar.as_ref().unwrap();

    for field in [
        &product.vx.values,
        &product.v,
        &radar.vr.values,
        &radar.va.values,
        &radar.vxp.values,
        &radar.vp,
        &radar.vp_error,
    ] {
        assert_eq!(field[[1, 1]], -32767.0);
    }
    assert_eq!(product.chip_size_width[[1, 1]], 0.0);
    assert_eq!(product.interp_mask[[1, 1]], 0);
    assert_ne!(product.v[[0, 0]], -32767.0);
}

#[test]
fn test_valid_pixels_round_to_nearest() {
    let shape = (1, 4);
    let mut inputs = common::optical_inputs(shape);
    inputs.vx = Array2::from_shape_vec(shape, vec![1.4, 2.5, -3.6, 40000.0]).unwrap();
    inputs.vy = Array2::zeros(shape);

    let product = VelocityDeriver::standard().derive(&inputs).unwrap();
    let encoded = encode_velocity(&product.vx.values);
    assert_eq!(encoded, vec![1, 2, -4, 32767]);
}

#[test]
fn test_zero_slope_direction_undefined_for_any_mode() {
    let shape = (2, 2);
    let ones = Array2::from_elem(shape, 1.0f32);
    let zeros = Array2::zeros(shape);
    let projector = RangeProjector::new(&ones, &zeros, &zeros, &ones, 0.75);

    let (px, py) = projector.project(&ones, &zeros, &zeros);
    assert!(px.iter().chain(py.iter()).all(|v| v.is_nan()));

    // Once fused, undefined projections fall back to the direct estimate
    let mut inputs = common::radar_inputs(shape);
    if let Some(radar) = inputs.radar.as_mut() {
        radar.sx = zeros.clone();
        radar.sy = zeros.clone();
        radar.vx_ref = zeros.clone();
        radar.vy_ref = zeros.clone();
    }
    let product = VelocityDeriver::standard().derive(&inputs).unwrap();
    let radar = product.radar.unwrap();
    assert_eq!(radar.vxp.values, product.vx.values);
    assert_eq!(radar.vyp.values, product.vy.values);
}
