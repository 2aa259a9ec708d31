//! Rigid camera-to-camera geometry.

use anyhow::{anyhow, Result};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// A fixed 6-DOF transform (rotation + translation) between two camera
/// frames. For a stereo rig this maps points in the right camera frame into
/// the left camera frame; it is supplied at construction and never mutated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from a row-major 3x3 rotation matrix and a translation vector,
    /// rejecting matrices that are not proper rotations.
    pub fn from_parts(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Result<Self> {
        let m = Matrix3::new(
            rotation[0][0],
            rotation[0][1],
            rotation[0][2],
            rotation[1][0],
            rotation[1][1],
            rotation[1][2],
            rotation[2][0],
            rotation[2][1],
            rotation[2][2],
        );
        let orthonormality = (m * m.transpose() - Matrix3::identity()).norm();
        if orthonormality > 1e-6 {
            return Err(anyhow!(
                "stereo rotation is not orthonormal (residual {orthonormality:.2e})"
            ));
        }
        if (m.determinant() - 1.0).abs() > 1e-6 {
            return Err(anyhow!("stereo rotation determinant is not +1"));
        }
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m));
        Ok(Self {
            rotation,
            translation: Vector3::new(translation[0], translation[1], translation[2]),
        })
    }

    /// Apply the transform to a point.
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_unchanged() {
        let t = RigidTransform::identity();
        let p = Vector3::new(1.0, -2.0, 3.0);
        assert_eq!(t.apply(&p), p);
    }

    #[test]
    fn from_parts_rejects_non_rotations() {
        let sheared = [[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(RigidTransform::from_parts(sheared, [0.0; 3]).is_err());

        let reflection = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(RigidTransform::from_parts(reflection, [0.0; 3]).is_err());
    }

    #[test]
    fn inverse_round_trips() {
        let t = RigidTransform::from_parts(
            [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            [0.1, -0.2, 0.3],
        )
        .unwrap();
        let p = Vector3::new(0.4, 0.5, 2.0);
        let back = t.inverse().apply(&t.apply(&p));
        assert!((back - p).norm() < 1e-12);
    }
}
