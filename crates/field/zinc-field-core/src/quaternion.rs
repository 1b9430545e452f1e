//! Quaternion helpers for time-sequence SLERP. Components are ordered
//! (w, x, y, z).

use nalgebra::{Quaternion, UnitQuaternion};

#[inline]
fn to_unit(q: &[f64]) -> Option<UnitQuaternion<f64>> {
    match q {
        [w, x, y, z] => UnitQuaternion::try_new(Quaternion::new(*w, *x, *y, *z), f64::EPSILON),
        _ => None,
    }
}

#[inline]
fn to_array(q: &UnitQuaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Unit-length copy of `q`, or `None` for a zero (or wrongly sized) quaternion.
pub fn normalize(q: &[f64]) -> Option<[f64; 4]> {
    to_unit(q).map(|unit| to_array(&unit))
}

/// Spherical linear interpolation along the shorter arc between the
/// normalized inputs. Fractions at or beyond the ends return the normalized
/// end quaternion unchanged; when the arc is too short for SLERP to be
/// well conditioned a normalized linear blend is used.
pub fn slerp(from: &[f64], to: &[f64], fraction: f64, epsilon: f64) -> Option<[f64; 4]> {
    let a = to_unit(from)?;
    let b = to_unit(to)?;
    if fraction <= 0.0 {
        return Some(to_array(&a));
    }
    if fraction >= 1.0 {
        return Some(to_array(&b));
    }
    let blended = a
        .try_slerp(&b, fraction, epsilon)
        .unwrap_or_else(|| nlerp(&a, &b, fraction));
    Some(to_array(&blended))
}

fn nlerp(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    let target = if a.quaternion().dot(b.quaternion()) < 0.0 {
        -*b.quaternion()
    } else {
        *b.quaternion()
    };
    UnitQuaternion::new_normalize(a.quaternion().lerp(&target, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn norm(q: [f64; 4]) -> f64 {
        q.iter().map(|c| c * c).sum::<f64>().sqrt()
    }

    #[test]
    fn end_fractions_return_normalized_inputs() {
        let from = [2.0, 0.0, 0.0, 0.0];
        let to = [0.0, 0.0, 0.0, 3.0];
        assert_eq!(slerp(&from, &to, 0.0, 1e-9), Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(slerp(&from, &to, 1.0, 1e-9), Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn halfway_about_z_is_forty_five_degrees() {
        let q = slerp(&[1.0, 0.0, 0.0, 0.0], &[FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2], 0.5, 1e-9)
            .expect("slerp");
        let half = (std::f64::consts::PI / 8.0).cos();
        assert_relative_eq!(q[0], half, epsilon = 1e-12);
        assert_relative_eq!(q[3], (std::f64::consts::PI / 8.0).sin(), epsilon = 1e-12);
        assert_relative_eq!(norm(q), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn nearly_equal_inputs_fall_back_to_linear_blend() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [1.0, 1e-12, 0.0, 0.0];
        let q = slerp(&a, &b, 0.5, 1e-6).expect("blend");
        assert_relative_eq!(norm(q), 1.0, epsilon = 1e-12);
        assert_relative_eq!(q[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_quaternion_cannot_be_normalized() {
        assert!(normalize(&[0.0; 4]).is_none());
        assert!(slerp(&[0.0; 4], &[1.0, 0.0, 0.0, 0.0], 0.5, 1e-9).is_none());
        assert!(normalize(&[1.0, 0.0]).is_none());
    }
}
