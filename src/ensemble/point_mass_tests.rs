use crate::ensemble::PointMass;
use crate::utils::GravityError;

#[test]
fn test_new_starts_with_zero_acceleration() {
    let body = PointMass::new([1.0, 2.0, 3.0], 4.5).expect("Failed to create point mass");
    assert_eq!(body.position, [1.0, 2.0, 3.0]);
    assert_eq!(body.acceleration, [0.0, 0.0, 0.0]);
    assert_eq!(body.mass, 4.5);
}

#[test]
fn test_zero_mass_is_allowed() {
    // Massless tracers feel gravity without exerting any.
    assert!(PointMass::<f64>::new([0.0; 3], 0.0).is_ok());
}

#[test]
fn test_invalid_masses_are_rejected() {
    assert!(matches!(
        PointMass::<f64>::new([0.0; 3], -1.0),
        Err(GravityError::InvalidMass)
    ));
    assert!(matches!(
        PointMass::<f64>::new([0.0; 3], f64::NAN),
        Err(GravityError::InvalidMass)
    ));
    assert!(matches!(
        PointMass::<f32>::new([0.0; 3], f32::INFINITY),
        Err(GravityError::InvalidMass)
    ));
}
