//! Camera calibration loading.
//!
//! Calibration files are TOML with a `[camera]` table (pinhole intrinsics,
//! radial-tangential distortion, input geometry) and an optional `[stereo]`
//! table carrying the right camera plus the fixed right-to-left extrinsic.
//! Everything here is validated before any thread is created; a bad
//! calibration is a fatal configuration error, not a runtime condition.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::geometry::RigidTransform;

/// Pinhole intrinsics.
#[derive(Clone, Copy, Debug)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Radial-tangential distortion coefficients (k1 k2 p1 p2 k3).
#[derive(Clone, Copy, Debug, Default)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    fn from_coeffs(coeffs: &[f64]) -> Result<Self> {
        if coeffs.len() > 5 {
            return Err(anyhow!(
                "distortion takes at most 5 coefficients (k1 k2 p1 p2 k3), got {}",
                coeffs.len()
            ));
        }
        let get = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k1: get(0),
            k2: get(1),
            p1: get(2),
            p2: get(3),
            k3: get(4),
        })
    }

    pub fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0 && self.k3 == 0.0
    }
}

/// One calibrated camera: intrinsics, distortion, and raw input geometry.
#[derive(Clone, Copy, Debug)]
pub struct CameraCalib {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    pub width: u32,
    pub height: u32,
}

/// Stereo extension: the right camera and the rig extrinsic.
#[derive(Clone, Copy, Debug)]
pub struct StereoCalib {
    pub right: CameraCalib,
    pub right_to_left: RigidTransform,
}

/// Full calibration for a run.
#[derive(Clone, Copy, Debug)]
pub struct Calibration {
    pub camera: CameraCalib,
    pub stereo: Option<StereoCalib>,
}

#[derive(Debug, Deserialize)]
struct CalibFile {
    camera: CameraTable,
    stereo: Option<StereoTable>,
}

#[derive(Debug, Deserialize)]
struct CameraTable {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    width: u32,
    height: u32,
    #[serde(default)]
    distortion: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct StereoTable {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    width: u32,
    height: u32,
    #[serde(default)]
    distortion: Vec<f64>,
    rotation: [[f64; 3]; 3],
    translation: [f64; 3],
}

impl Calibration {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read calibration file {}", path.display()))?;
        let file: CalibFile = toml::from_str(&raw)
            .with_context(|| format!("invalid calibration file {}", path.display()))?;

        let camera = camera_from_table(
            file.camera.fx,
            file.camera.fy,
            file.camera.cx,
            file.camera.cy,
            file.camera.width,
            file.camera.height,
            &file.camera.distortion,
        )
        .context("bad [camera] table")?;

        let stereo = match file.stereo {
            Some(table) => {
                let right = camera_from_table(
                    table.fx,
                    table.fy,
                    table.cx,
                    table.cy,
                    table.width,
                    table.height,
                    &table.distortion,
                )
                .context("bad [stereo] table")?;
                let right_to_left = RigidTransform::from_parts(table.rotation, table.translation)
                    .context("bad [stereo] extrinsic")?;
                Some(StereoCalib {
                    right,
                    right_to_left,
                })
            }
            None => None,
        };

        Ok(Self { camera, stereo })
    }

    /// The stereo table, or an error when the run requires one.
    pub fn require_stereo(&self) -> Result<&StereoCalib> {
        self.stereo
            .as_ref()
            .ok_or_else(|| anyhow!("calibration file has no [stereo] table"))
    }
}

fn camera_from_table(
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    width: u32,
    height: u32,
    distortion: &[f64],
) -> Result<CameraCalib> {
    if fx <= 0.0 || fy <= 0.0 {
        return Err(anyhow!("camera focal length must be positive (fx={fx}, fy={fy})"));
    }
    if width == 0 || height == 0 {
        return Err(anyhow!("camera geometry must be nonzero ({width}x{height})"));
    }
    Ok(CameraCalib {
        intrinsics: CameraIntrinsics { fx, fy, cx, cy },
        distortion: Distortion::from_coeffs(distortion)?,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_calib(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const MONO: &str = r#"
        [camera]
        fx = 458.654
        fy = 457.296
        cx = 367.215
        cy = 248.375
        width = 752
        height = 480
        distortion = [-0.28340811, 0.07395907, 0.00019359, 1.76187114e-05]
    "#;

    #[test]
    fn loads_mono_calibration() {
        let file = write_calib(MONO);
        let calib = Calibration::load(file.path()).unwrap();
        assert_eq!(calib.camera.width, 752);
        assert!((calib.camera.intrinsics.fx - 458.654).abs() < 1e-9);
        assert!((calib.camera.distortion.k1 + 0.28340811).abs() < 1e-9);
        assert_eq!(calib.camera.distortion.k3, 0.0);
        assert!(calib.stereo.is_none());
        assert!(calib.require_stereo().is_err());
    }

    #[test]
    fn loads_stereo_calibration() {
        let file = write_calib(&format!(
            "{MONO}
            [stereo]
            fx = 457.587
            fy = 456.134
            cx = 379.999
            cy = 255.238
            width = 752
            height = 480
            rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
            translation = [-0.11, 0.0, 0.0]
        "
        ));
        let calib = Calibration::load(file.path()).unwrap();
        let stereo = calib.require_stereo().unwrap();
        assert!((stereo.right_to_left.translation.x + 0.11).abs() < 1e-9);
        assert!(stereo.right.distortion.is_zero());
    }

    #[test]
    fn rejects_zero_focal_length() {
        let file = write_calib(
            r#"
            [camera]
            fx = 0.0
            fy = 457.296
            cx = 367.215
            cy = 248.375
            width = 752
            height = 480
        "#,
        );
        assert!(Calibration::load(file.path()).is_err());
    }

    #[test]
    fn rejects_zero_geometry() {
        let file = write_calib(
            r#"
            [camera]
            fx = 458.0
            fy = 457.0
            cx = 367.0
            cy = 248.0
            width = 0
            height = 480
        "#,
        );
        assert!(Calibration::load(file.path()).is_err());
    }
}
