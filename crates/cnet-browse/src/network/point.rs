//! Control points and surface points.

use std::fmt;

use super::MeasureId;

/// Radius assigned to an a priori surface point whose radius was unset, in meters.
pub const DEFAULT_APRIORI_RADIUS: f64 = 10_000.0;

/// Sigma assigned to unset a priori sigmas, in meters.
pub const DEFAULT_APRIORI_SIGMA: f64 = 10_000.0;

/// How a point participates in an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointType {
    /// Position solved freely.
    #[default]
    Free,
    /// Position constrained by a priori sigmas.
    Constrained,
    /// Position held fixed.
    Fixed,
}

impl PointType {
    /// Every point type, in display order.
    pub const ALL: [PointType; 3] = [Self::Free, Self::Constrained, Self::Fixed];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Constrained => "Constrained",
            Self::Fixed => "Fixed",
        }
    }

    /// Parse a display name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an a priori surface point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfacePointSource {
    #[default]
    None,
    User,
    AverageOfMeasures,
    Reference,
    Basemap,
    BundleSolution,
}

impl SurfacePointSource {
    pub const ALL: [SurfacePointSource; 6] = [
        Self::None,
        Self::User,
        Self::AverageOfMeasures,
        Self::Reference,
        Self::Basemap,
        Self::BundleSolution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::User => "User",
            Self::AverageOfMeasures => "AverageOfMeasures",
            Self::Reference => "Reference",
            Self::Basemap => "Basemap",
            Self::BundleSolution => "BundleSolution",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Where an a priori radius came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RadiusSource {
    #[default]
    None,
    User,
    AverageOfMeasures,
    Ellipsoid,
    Dem,
    BundleSolution,
}

impl RadiusSource {
    pub const ALL: [RadiusSource; 6] = [
        Self::None,
        Self::User,
        Self::AverageOfMeasures,
        Self::Ellipsoid,
        Self::Dem,
        Self::BundleSolution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::User => "User",
            Self::AverageOfMeasures => "AverageOfMeasures",
            Self::Ellipsoid => "Ellipsoid",
            Self::Dem => "DEM",
            Self::BundleSolution => "BundleSolution",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// A body-fixed position with sigmas. `None` marks an unset value.
///
/// Latitude and longitude are in degrees; radius and all sigmas in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfacePoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
    pub latitude_sigma: Option<f64>,
    pub longitude_sigma: Option<f64>,
    pub radius_sigma: Option<f64>,
}

impl SurfacePoint {
    /// A point at the given coordinates with unset sigmas.
    pub fn new(latitude: f64, longitude: f64, radius: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            radius: Some(radius),
            ..Default::default()
        }
    }

    /// Set all three sigmas.
    pub fn with_sigmas(mut self, latitude: f64, longitude: f64, radius: f64) -> Self {
        self.latitude_sigma = Some(latitude);
        self.longitude_sigma = Some(longitude);
        self.radius_sigma = Some(radius);
        self
    }

    /// True if latitude, longitude and radius are all unset.
    pub fn coordinates_unset(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.radius.is_none()
    }

    /// True if all three sigmas are unset.
    pub fn sigmas_unset(&self) -> bool {
        self.latitude_sigma.is_none() && self.longitude_sigma.is_none() && self.radius_sigma.is_none()
    }
}

/// A tie point between images.
///
/// The measure list and reference designation are maintained by the
/// owning [`ControlNetwork`](super::ControlNetwork).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlPoint {
    pub id: String,
    pub point_type: PointType,
    pub chooser_name: String,
    pub date_time: String,
    pub edit_lock: bool,
    pub ignored: bool,
    pub jigsaw_rejected: bool,
    pub apriori: SurfacePoint,
    pub adjusted: SurfacePoint,
    pub apriori_surface_source: SurfacePointSource,
    pub apriori_surface_source_file: String,
    pub apriori_radius_source: RadiusSource,
    pub apriori_radius_source_file: String,
    pub(crate) measures: Vec<MeasureId>,
    pub(crate) reference: Option<MeasureId>,
}

impl ControlPoint {
    /// A free point with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_edit_lock(mut self, locked: bool) -> Self {
        self.edit_lock = locked;
        self
    }

    pub fn with_ignored(mut self, ignored: bool) -> Self {
        self.ignored = ignored;
        self
    }

    pub fn with_point_type(mut self, point_type: PointType) -> Self {
        self.point_type = point_type;
        self
    }

    pub fn with_apriori(mut self, point: SurfacePoint) -> Self {
        self.apriori = point;
        self
    }

    pub fn with_adjusted(mut self, point: SurfacePoint) -> Self {
        self.adjusted = point;
        self
    }

    /// Measures of this point, in insertion order.
    pub fn measures(&self) -> &[MeasureId] {
        &self.measures
    }

    /// The reference measure, defaulting to the first measure.
    pub fn reference(&self) -> Option<MeasureId> {
        self.reference.or_else(|| self.measures.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_names_round_trip() {
        for t in PointType::ALL {
            assert_eq!(PointType::from_name(t.name()), Some(t));
        }
        for s in SurfacePointSource::ALL {
            assert_eq!(SurfacePointSource::from_name(s.name()), Some(s));
        }
        for s in RadiusSource::ALL {
            assert_eq!(RadiusSource::from_name(s.name()), Some(s));
        }
        assert_eq!(PointType::from_name("fixed"), Some(PointType::Fixed));
        assert_eq!(RadiusSource::from_name("Bogus"), None);
    }

    #[test]
    fn test_surface_point_unset_checks() {
        let empty = SurfacePoint::default();
        assert!(empty.coordinates_unset());
        assert!(empty.sigmas_unset());

        let point = SurfacePoint::new(1.0, 2.0, 3.0).with_sigmas(4.0, 5.0, 6.0);
        assert!(!point.coordinates_unset());
        assert!(!point.sigmas_unset());
    }
}
