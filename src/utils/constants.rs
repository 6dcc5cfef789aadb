/// Newtonian constant of gravitation in SI units, m^3 / (kg * s^2).
///
/// CODATA 2018 recommended value. Ensembles take their own `g` so scaled
/// unit systems work too; this is the default for SI-unit setups.
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;
