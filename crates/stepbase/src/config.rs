//! Analysis tolerances and thresholds.
//!
//! Every section has defaults and can be overridden from TOML:
//!
//! ```toml
//! [interfaces]
//! critical_fastener_count = 6
//! contact_min_area = 2.5
//!
//! [compare]
//! major_threshold = 0.1
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration of a whole analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Baseline construction.
    pub builder: BuilderConfig,
    /// Interface detection.
    pub interfaces: InterfaceConfig,
    /// Baseline comparison.
    pub compare: CompareConfig,
    /// Structural validation.
    pub validation: ValidationConfig,
}

impl AnalysisConfig {
    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.builder.validate()?;
        self.interfaces.validate()?;
        self.compare.validate()?;
        self.validation.validate()
    }
}

/// Baseline construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Relative tolerance on volume and box extents when grouping
    /// identical siblings.
    pub signature_tolerance: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            signature_tolerance: 1e-6,
        }
    }
}

impl BuilderConfig {
    fn validate(&self) -> Result<()> {
        non_negative("builder.signature_tolerance", self.signature_tolerance)
    }
}

/// Interface detection tolerances. Lengths are in model units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Maximum angle between hole axes, in degrees.
    pub angular_tolerance_deg: f64,
    /// Maximum distance between hole axes as a fraction of the smaller
    /// diameter.
    pub axis_distance_factor: f64,
    /// Relative radius tolerance between matched holes.
    pub radius_tolerance: f64,
    /// Aligned hole count from which a fastening is critical.
    pub critical_fastener_count: usize,
    /// Maximum deviation from antiparallel for contacting faces, in degrees.
    pub contact_angular_tolerance_deg: f64,
    /// Maximum offset between contacting planes.
    pub contact_plane_tolerance: f64,
    /// Minimum overlap area for a contact.
    pub contact_min_area: f64,
    /// Contact area from which a contact is HIGH severity.
    pub contact_high_area: f64,
    /// Proximity threshold as a fraction of the smaller box diagonal.
    pub proximity_fraction: f64,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            angular_tolerance_deg: 2.0,
            axis_distance_factor: 0.1,
            radius_tolerance: 0.05,
            critical_fastener_count: 4,
            contact_angular_tolerance_deg: 2.0,
            contact_plane_tolerance: 0.1,
            contact_min_area: 1.0,
            contact_high_area: 500.0,
            proximity_fraction: 0.05,
        }
    }
}

impl InterfaceConfig {
    /// Hole axis tolerance in radians.
    pub fn angular_tolerance(&self) -> f64 {
        self.angular_tolerance_deg.to_radians()
    }

    /// Contact face tolerance in radians.
    pub fn contact_angular_tolerance(&self) -> f64 {
        self.contact_angular_tolerance_deg.to_radians()
    }

    fn validate(&self) -> Result<()> {
        angle("interfaces.angular_tolerance_deg", self.angular_tolerance_deg)?;
        angle(
            "interfaces.contact_angular_tolerance_deg",
            self.contact_angular_tolerance_deg,
        )?;
        positive("interfaces.axis_distance_factor", self.axis_distance_factor)?;
        fraction("interfaces.radius_tolerance", self.radius_tolerance)?;
        if self.critical_fastener_count == 0 {
            return Err(EngineError::config(
                "interfaces.critical_fastener_count must be at least 1",
            ));
        }
        positive("interfaces.contact_plane_tolerance", self.contact_plane_tolerance)?;
        non_negative("interfaces.contact_min_area", self.contact_min_area)?;
        non_negative("interfaces.contact_high_area", self.contact_high_area)?;
        fraction("interfaces.proximity_fraction", self.proximity_fraction)
    }
}

/// Comparison thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Relative volume or surface change below which nothing is reported.
    pub significance_threshold: f64,
    /// Relative change above which a geometry change is major.
    pub major_threshold: f64,
    /// Axis point distance under which a removed and an added hole are the
    /// same feature.
    pub hole_position_tolerance: f64,
    /// Relative diameter tolerance for moved holes.
    pub hole_diameter_tolerance: f64,
    /// Bounding-box extent change, per axis and in model units, above
    /// which a component's envelope counts as changed.
    pub envelope_tolerance: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            significance_threshold: 0.001,
            major_threshold: 0.05,
            hole_position_tolerance: 0.5,
            hole_diameter_tolerance: 1e-3,
            envelope_tolerance: 0.1,
        }
    }
}

impl CompareConfig {
    fn validate(&self) -> Result<()> {
        non_negative("compare.significance_threshold", self.significance_threshold)?;
        positive("compare.major_threshold", self.major_threshold)?;
        if self.major_threshold < self.significance_threshold {
            return Err(EngineError::config(
                "compare.major_threshold must not be below compare.significance_threshold",
            ));
        }
        non_negative("compare.hole_position_tolerance", self.hole_position_tolerance)?;
        fraction("compare.hole_diameter_tolerance", self.hole_diameter_tolerance)?;
        non_negative("compare.envelope_tolerance", self.envelope_tolerance)
    }
}

/// Validation report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Deepest hierarchy level accepted without a warning.
    pub max_depth: usize,
    /// Schema names accepted without a warning (prefix match).
    pub known_schemas: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            known_schemas: ["CONFIG_CONTROL_DESIGN", "AUTOMOTIVE_DESIGN", "AP203", "AP214", "AP242"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ValidationConfig {
    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(EngineError::config("validation.max_depth must be at least 1"));
        }
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!("{key} must be positive, got {value}")))
    }
}

fn non_negative(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!("{key} must not be negative, got {value}")))
    }
}

fn fraction(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!("{key} must lie in (0, 1), got {value}")))
    }
}

fn angle(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 90.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!("{key} must lie in (0, 90) degrees, got {value}")))
    }
}
