//! Control measures.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::PointId;

/// How a measure's pixel location was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasureType {
    #[default]
    Candidate,
    Manual,
    RegisteredPixel,
    RegisteredSubPixel,
}

impl MeasureType {
    pub const ALL: [MeasureType; 4] = [
        Self::Candidate,
        Self::Manual,
        Self::RegisteredPixel,
        Self::RegisteredSubPixel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Candidate => "Candidate",
            Self::Manual => "Manual",
            Self::RegisteredPixel => "RegisteredPixel",
            Self::RegisteredSubPixel => "RegisteredSubPixel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keys of the numeric registration log kept per measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeasureLogKind {
    GoodnessOfFit,
    MinimumPixelZScore,
    MaximumPixelZScore,
}

/// A pixel location of a point in one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlMeasure {
    /// Serial number of the image this measure lies in.
    pub serial: Arc<str>,
    pub measure_type: MeasureType,
    pub sample: Option<f64>,
    pub line: Option<f64>,
    pub apriori_sample: Option<f64>,
    pub apriori_line: Option<f64>,
    pub sample_sigma: Option<f64>,
    pub line_sigma: Option<f64>,
    pub sample_residual: Option<f64>,
    pub line_residual: Option<f64>,
    pub diameter: Option<f64>,
    pub edit_lock: bool,
    pub ignored: bool,
    pub jigsaw_rejected: bool,
    pub log: BTreeMap<MeasureLogKind, f64>,
    pub(crate) point: Option<PointId>,
}

impl ControlMeasure {
    /// A candidate measure in the image with serial number `serial`.
    pub fn new(serial: impl Into<Arc<str>>) -> Self {
        Self {
            serial: serial.into(),
            ..Default::default()
        }
    }

    pub fn with_coordinate(mut self, sample: f64, line: f64) -> Self {
        self.sample = Some(sample);
        self.line = Some(line);
        self
    }

    pub fn with_residuals(mut self, sample: f64, line: f64) -> Self {
        self.sample_residual = Some(sample);
        self.line_residual = Some(line);
        self
    }

    pub fn with_edit_lock(mut self, locked: bool) -> Self {
        self.edit_lock = locked;
        self
    }

    pub fn with_ignored(mut self, ignored: bool) -> Self {
        self.ignored = ignored;
        self
    }

    pub fn with_measure_type(mut self, measure_type: MeasureType) -> Self {
        self.measure_type = measure_type;
        self
    }

    pub fn with_log(mut self, kind: MeasureLogKind, value: f64) -> Self {
        self.log.insert(kind, value);
        self
    }

    /// The owning point, once the measure has been added to a network.
    pub fn parent(&self) -> Option<PointId> {
        self.point
    }

    pub fn sample_shift(&self) -> Option<f64> {
        Some(self.sample? - self.apriori_sample?)
    }

    pub fn line_shift(&self) -> Option<f64> {
        Some(self.line? - self.apriori_line?)
    }

    /// Euclidean length of the residual vector.
    pub fn residual_magnitude(&self) -> Option<f64> {
        Some(self.sample_residual?.hypot(self.line_residual?))
    }

    pub fn log_value(&self, kind: MeasureLogKind) -> Option<f64> {
        self.log.get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let mut measure = ControlMeasure::new("cube1")
            .with_coordinate(10.0, 20.0)
            .with_residuals(3.0, 4.0);
        assert_eq!(measure.residual_magnitude(), Some(5.0));
        assert_eq!(measure.sample_shift(), None);

        measure.apriori_sample = Some(8.5);
        measure.apriori_line = Some(21.0);
        assert_eq!(measure.sample_shift(), Some(1.5));
        assert_eq!(measure.line_shift(), Some(-1.0));
    }

    #[test]
    fn test_measure_type_names() {
        for t in MeasureType::ALL {
            assert_eq!(MeasureType::from_name(t.name()), Some(t));
        }
        assert_eq!(MeasureType::from_name("manual"), Some(MeasureType::Manual));
    }
}
