//! DSK tolerance and margin parameters.
//!
//! These values steer how geometry code consumes DSK segment data; they do
//! not affect the file format. They are carried as an explicit value rather
//! than process-wide state, so callers (and tests) never observe each
//! other's settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use segfile_record::{ErrorKind, KernelError, Result};

/// Default plate expansion fraction
pub const DEFAULT_PLATE_EXPANSION: f64 = 1.0e-10;
/// Default greedy segment selection margin
pub const DEFAULT_SEGMENT_GREED: f64 = 1.0e-8;
/// Default segment bounding box pad margin
pub const DEFAULT_SEGMENT_PAD: f64 = 1.0e-10;
/// Default surface-point membership margin
pub const DEFAULT_POINT_MEMBERSHIP: f64 = 1.0e-7;
/// Angular rounding margin (fixed)
pub const ANGULAR_ROUNDING_MARGIN: f64 = 1.0e-12;
/// Longitude alias margin (fixed)
pub const LONGITUDE_ALIAS_MARGIN: f64 = 1.0e-12;

/// Names of the tolerance parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToleranceKey {
    /// Fraction by which plates are expanded for ray intersection
    PlateExpansion,
    /// Greedy margin used when selecting segments for a point
    SegmentGreed,
    /// Pad applied to segment coordinate bounds
    SegmentPad,
    /// Margin for deciding a point lies on a plate
    PointMembership,
    /// Rounding margin for angular coordinates; not adjustable
    AngularRounding,
    /// Margin for longitude aliasing; not adjustable
    LongitudeAlias,
}

impl ToleranceKey {
    pub const ALL: [ToleranceKey; 6] = [
        ToleranceKey::PlateExpansion,
        ToleranceKey::SegmentGreed,
        ToleranceKey::SegmentPad,
        ToleranceKey::PointMembership,
        ToleranceKey::AngularRounding,
        ToleranceKey::LongitudeAlias,
    ];

    pub fn is_adjustable(self) -> bool {
        !matches!(
            self,
            ToleranceKey::AngularRounding | ToleranceKey::LongitudeAlias
        )
    }
}

impl fmt::Display for ToleranceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToleranceKey::PlateExpansion => "plate_expansion",
            ToleranceKey::SegmentGreed => "segment_greed",
            ToleranceKey::SegmentPad => "segment_pad",
            ToleranceKey::PointMembership => "point_membership",
            ToleranceKey::AngularRounding => "angular_rounding",
            ToleranceKey::LongitudeAlias => "longitude_alias",
        };
        f.write_str(name)
    }
}

/// Adjustable DSK tolerances. All values are finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub plate_expansion: f64,
    pub segment_greed: f64,
    pub segment_pad: f64,
    pub point_membership: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            plate_expansion: DEFAULT_PLATE_EXPANSION,
            segment_greed: DEFAULT_SEGMENT_GREED,
            segment_pad: DEFAULT_SEGMENT_PAD,
            point_membership: DEFAULT_POINT_MEMBERSHIP,
        }
    }
}

impl ToleranceConfig {
    pub fn get(&self, key: ToleranceKey) -> f64 {
        match key {
            ToleranceKey::PlateExpansion => self.plate_expansion,
            ToleranceKey::SegmentGreed => self.segment_greed,
            ToleranceKey::SegmentPad => self.segment_pad,
            ToleranceKey::PointMembership => self.point_membership,
            ToleranceKey::AngularRounding => ANGULAR_ROUNDING_MARGIN,
            ToleranceKey::LongitudeAlias => LONGITUDE_ALIAS_MARGIN,
        }
    }

    pub fn set(&mut self, key: ToleranceKey, value: f64) -> Result<()> {
        if !key.is_adjustable() {
            return Err(KernelError::new(
                ErrorKind::ImmutableValue,
                format!("tolerance {} cannot be changed", key),
            ));
        }
        check_value(key, value)?;
        match key {
            ToleranceKey::PlateExpansion => self.plate_expansion = value,
            ToleranceKey::SegmentGreed => self.segment_greed = value,
            ToleranceKey::SegmentPad => self.segment_pad = value,
            ToleranceKey::PointMembership => self.point_membership = value,
            ToleranceKey::AngularRounding | ToleranceKey::LongitudeAlias => {}
        }
        Ok(())
    }

    /// Check every adjustable value, e.g. after loading from TOML.
    pub fn validate(&self) -> Result<()> {
        for key in ToleranceKey::ALL.into_iter().filter(|k| k.is_adjustable()) {
            check_value(key, self.get(key))?;
        }
        Ok(())
    }
}

fn check_value(key: ToleranceKey, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!("tolerance {} must be finite and non-negative, got {}", key, value),
        ));
    }
    Ok(())
}
