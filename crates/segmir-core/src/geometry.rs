//! Mirror geometry tables and the optical surface.
//!
//! A [`MirrorGeometry`] carries everything the frame engine needs once at
//! start-up: ring panel counts, the ideal pad triangle of each ring in the
//! telescope frame, the optical surface and the actuator platform dimensions.

use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Vector3};
use segmir_topology::{MirrorTopology, RingLayout, TopologyError};
use serde::{Deserialize, Serialize};

use crate::kinematics::{KinematicsError, PanelType, SolverParams, StewartGeometry, StewartPlatform};
use crate::pose::PadTriangle;

/// Surface whose normal orients each ring's panel frame.
pub trait OpticalSurface {
    /// Height of the surface at radial distance `r`.
    fn sag(&self, r: f64) -> f64;

    /// `d sag / d r`.
    fn slope(&self, r: f64) -> f64;

    /// Unit normal at the surface point above `(x, y)`, with positive `z`.
    fn normal(&self, point: &Vector3<f64>) -> Vector3<f64> {
        let r = point.x.hypot(point.y);
        if r <= f64::EPSILON {
            return Vector3::z();
        }
        let s = self.slope(r);
        Vector3::new(-s * point.x / r, -s * point.y / r, 1.0).normalize()
    }
}

/// Even asphere `z(r) = sum_i c_i * r^(2 i)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AsphericSurface {
    pub coefficients: Vec<f64>,
}

impl AsphericSurface {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }
}

impl OpticalSurface for AsphericSurface {
    fn sag(&self, r: f64) -> f64 {
        let r2 = r * r;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * r2 + c)
    }

    fn slope(&self, r: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| 2.0 * i as f64 * c * r.powi(2 * i as i32 - 1))
            .sum()
    }
}

/// Which optical element a mirror controller drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorKind {
    Primary,
    Secondary,
    /// Lab stand with primary geometry.
    TestStand,
}

impl MirrorKind {
    /// Leading digit of panel positions on this mirror.
    pub const fn digit(self) -> u32 {
        match self {
            MirrorKind::Primary => 1,
            MirrorKind::Secondary => 2,
            MirrorKind::TestStand => 3,
        }
    }

    pub const fn from_digit(digit: u32) -> Option<Self> {
        match digit {
            1 => Some(MirrorKind::Primary),
            2 => Some(MirrorKind::Secondary),
            3 => Some(MirrorKind::TestStand),
            _ => None,
        }
    }
}

fn default_first_quadrant() -> u32 {
    1
}

/// One ring of panels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingGeometry {
    pub panels: u32,
    #[serde(default = "default_first_quadrant")]
    pub first_quadrant: u32,
    pub panel_type: PanelType,
    /// Pads of the ideal panel centred on the -X axis, telescope frame, mm.
    pub ideal_pads: PadTriangle,
}

impl RingGeometry {
    pub fn layout(&self) -> RingLayout {
        RingLayout {
            panels: self.panels,
            first_quadrant: self.first_quadrant,
        }
    }
}

/// Errors from building, validating or loading a geometry.
#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
    #[error("mirror has no rings")]
    NoRings,
    #[error("normal direction must be +1 or -1, got {0}")]
    InvalidNormalDirection(f64),
    #[error("surface normal is parallel to the telescope x axis")]
    DegenerateNormal,
}

/// Static description of one segmented mirror.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MirrorGeometry {
    /// Leading digit of this mirror's panel positions.
    pub mirror: u32,
    pub surface: AsphericSurface,
    /// `+1` when panel normals point along +Z, `-1` otherwise.
    pub normal_direction: f64,
    pub rings: Vec<RingGeometry>,
    #[serde(default)]
    pub platform: StewartGeometry,
}

const PRIMARY_SURFACE: [f64; 3] = [0.0, 4.4755e-5, 2.0e-13];
const PRIMARY_RINGS: [(u32, f64, PanelType); 2] = [(16, 2800.0, PanelType::P1), (32, 4100.0, PanelType::P2)];
const SECONDARY_SURFACE: [f64; 3] = [0.0, -9.2e-5, 0.0];
const SECONDARY_RINGS: [(u32, f64, PanelType); 2] = [(8, 1050.0, PanelType::S1), (16, 2000.0, PanelType::S2)];

impl MirrorGeometry {
    pub fn primary() -> Result<Self, GeometryError> {
        Self::built_in(MirrorKind::Primary)
    }

    pub fn secondary() -> Result<Self, GeometryError> {
        Self::built_in(MirrorKind::Secondary)
    }

    pub fn test_stand() -> Result<Self, GeometryError> {
        Self::built_in(MirrorKind::TestStand)
    }

    /// Built-in geometry of a mirror kind, ideal pads placed on the surface.
    pub fn built_in(kind: MirrorKind) -> Result<Self, GeometryError> {
        let (coefficients, rings, normal_direction) = match kind {
            MirrorKind::Primary | MirrorKind::TestStand => (PRIMARY_SURFACE, PRIMARY_RINGS, 1.0),
            MirrorKind::Secondary => (SECONDARY_SURFACE, SECONDARY_RINGS, -1.0),
        };
        let surface = AsphericSurface::new(coefficients.to_vec());
        let platform = StewartGeometry::default();
        let rings = rings
            .iter()
            .map(|&(panels, radius, panel_type)| {
                let ideal_pads = ideal_pads_on_surface(&surface, normal_direction, &platform, panel_type, radius)?;
                Ok(RingGeometry {
                    panels,
                    first_quadrant: default_first_quadrant(),
                    panel_type,
                    ideal_pads,
                })
            })
            .collect::<Result<Vec<_>, GeometryError>>()?;

        let geometry = Self {
            mirror: kind.digit(),
            surface,
            normal_direction,
            rings,
            platform,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.rings.is_empty() {
            return Err(GeometryError::NoRings);
        }
        if self.normal_direction != 1.0 && self.normal_direction != -1.0 {
            return Err(GeometryError::InvalidNormalDirection(self.normal_direction));
        }
        self.topology()?;
        Ok(())
    }

    pub fn topology(&self) -> Result<MirrorTopology, TopologyError> {
        MirrorTopology::new(self.mirror, self.rings.iter().map(RingGeometry::layout).collect())
    }

    /// Ring by its 1-based digit.
    pub fn ring(&self, ring: u32) -> Option<&RingGeometry> {
        self.rings.get((ring as usize).wrapping_sub(1))
    }

    /// Platform dimensions for panels on `ring`.
    pub fn platform_for(&self, ring: &RingGeometry) -> StewartGeometry {
        StewartGeometry {
            panel_type: ring.panel_type,
            ..self.platform.clone()
        }
    }

    /// Load a geometry from JSON on disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, GeometryError> {
        let raw = fs::read_to_string(path)?;
        let geometry: Self = serde_json::from_str(&raw)?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Write this geometry to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), GeometryError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Orthonormal panel basis at `center`: Z is the surface normal turned to
/// agree with `normal_direction`, X is the telescope X axis projected onto
/// the tangent plane, `Y = Z x X`.
pub fn ideal_panel_basis(
    surface: &dyn OpticalSurface,
    center: &Vector3<f64>,
    normal_direction: f64,
) -> Result<Matrix3<f64>, GeometryError> {
    let mut normal = surface.normal(center);
    if normal.z * normal_direction < 0.0 {
        normal = -normal;
    }
    let x = (Vector3::x() - normal * normal.x)
        .try_normalize(1e-9)
        .ok_or(GeometryError::DegenerateNormal)?;
    let y = normal.cross(&x);
    Ok(Matrix3::from_columns(&[x, y, normal]))
}

/// Ideal pads of a panel centred at `radius` on the -X axis, as produced by
/// nominal actuator lengths.
fn ideal_pads_on_surface(
    surface: &AsphericSurface,
    normal_direction: f64,
    platform: &StewartGeometry,
    panel_type: PanelType,
    radius: f64,
) -> Result<PadTriangle, GeometryError> {
    let center = Vector3::new(-radius, 0.0, surface.sag(radius));
    let basis = ideal_panel_basis(surface, &center, normal_direction)?;
    let sp = StewartPlatform::new(
        StewartGeometry {
            panel_type,
            ..platform.clone()
        },
        SolverParams::default(),
    )?;
    let nominal = sp.nominal_solution()?;
    let lift = nominal.pose.translation();
    Ok(nominal.pads.map(|p| center + basis * (p - lift)))
}
