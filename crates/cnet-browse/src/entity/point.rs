//! Point columns and edit policy.

use crate::error::{BrowseError, Result, UserErrorKind};
use crate::network::{
    ControlNetwork, ControlPoint, DEFAULT_APRIORI_RADIUS, DEFAULT_APRIORI_SIGMA, NetworkStore,
    PointId, PointType, RadiusSource, SurfacePoint, SurfacePointSource,
};
use crate::value::{CellValue, parse_bool, parse_number};

/// Columns of the point table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointColumn {
    Id,
    PointType,
    ChooserName,
    DateTime,
    EditLock,
    Ignored,
    Reference,
    AdjustedLatitude,
    AdjustedLongitude,
    AdjustedRadius,
    AdjustedLatitudeSigma,
    AdjustedLongitudeSigma,
    AdjustedRadiusSigma,
    APrioriLatitude,
    APrioriLongitude,
    APrioriRadius,
    APrioriLatitudeSigma,
    APrioriLongitudeSigma,
    APrioriRadiusSigma,
    APrioriSurfaceSource,
    APrioriSurfaceSourceFile,
    APrioriRadiusSource,
    APrioriRadiusSourceFile,
    JigsawRejected,
    AverageResidual,
}

impl PointColumn {
    /// Every column, in table order.
    pub const ALL: [PointColumn; 25] = [
        Self::Id,
        Self::PointType,
        Self::ChooserName,
        Self::DateTime,
        Self::EditLock,
        Self::Ignored,
        Self::Reference,
        Self::AdjustedLatitude,
        Self::AdjustedLongitude,
        Self::AdjustedRadius,
        Self::AdjustedLatitudeSigma,
        Self::AdjustedLongitudeSigma,
        Self::AdjustedRadiusSigma,
        Self::APrioriLatitude,
        Self::APrioriLongitude,
        Self::APrioriRadius,
        Self::APrioriLatitudeSigma,
        Self::APrioriLongitudeSigma,
        Self::APrioriRadiusSigma,
        Self::APrioriSurfaceSource,
        Self::APrioriSurfaceSourceFile,
        Self::APrioriRadiusSource,
        Self::APrioriRadiusSourceFile,
        Self::JigsawRejected,
        Self::AverageResidual,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Id => "Point ID",
            Self::PointType => "Point Type",
            Self::ChooserName => "Chooser Name",
            Self::DateTime => "Date Time",
            Self::EditLock => "Edit Lock",
            Self::Ignored => "Ignored",
            Self::Reference => "Reference",
            Self::AdjustedLatitude => "Adjusted SP Lat",
            Self::AdjustedLongitude => "Adjusted SP Lon",
            Self::AdjustedRadius => "Adjusted SP Radius",
            Self::AdjustedLatitudeSigma => "Adjusted SP Lat Sigma",
            Self::AdjustedLongitudeSigma => "Adjusted SP Lon Sigma",
            Self::AdjustedRadiusSigma => "Adjusted SP Radius Sigma",
            Self::APrioriLatitude => "A Priori SP Lat",
            Self::APrioriLongitude => "A Priori SP Lon",
            Self::APrioriRadius => "A Priori SP Radius",
            Self::APrioriLatitudeSigma => "A Priori SP Lat Sigma",
            Self::APrioriLongitudeSigma => "A Priori SP Lon Sigma",
            Self::APrioriRadiusSigma => "A Priori SP Radius Sigma",
            Self::APrioriSurfaceSource => "A Priori SP Source",
            Self::APrioriSurfaceSourceFile => "A Priori SP Source File",
            Self::APrioriRadiusSource => "A Priori Radius Source",
            Self::APrioriRadiusSourceFile => "A Priori Radius Source File",
            Self::JigsawRejected => "Jigsaw Rejected",
            Self::AverageResidual => "Average Residual",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.title() == title)
    }

    /// Columns the table never lets users edit.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::DateTime
                | Self::AdjustedLatitude
                | Self::AdjustedLongitude
                | Self::AdjustedRadius
                | Self::AdjustedLatitudeSigma
                | Self::AdjustedLongitudeSigma
                | Self::AdjustedRadiusSigma
                | Self::JigsawRejected
                | Self::AverageResidual
        )
    }

    /// Edits to this column change which items the tree contains.
    pub fn affects_network_structure(self) -> bool {
        matches!(self, Self::Ignored)
    }

    fn is_apriori_coordinate(self) -> bool {
        matches!(
            self,
            Self::APrioriLatitude | Self::APrioriLongitude | Self::APrioriRadius
        )
    }

    fn is_apriori_sigma(self) -> bool {
        matches!(
            self,
            Self::APrioriLatitudeSigma | Self::APrioriLongitudeSigma | Self::APrioriRadiusSigma
        )
    }

    fn is_adjusted_sigma(self) -> bool {
        matches!(
            self,
            Self::AdjustedLatitudeSigma | Self::AdjustedLongitudeSigma | Self::AdjustedRadiusSigma
        )
    }

    /// Columns the adapter refuses to write regardless of locks.
    fn rejects_writes(self) -> bool {
        matches!(self, Self::DateTime | Self::JigsawRejected | Self::AverageResidual)
    }
}

pub(crate) fn value(store: &NetworkStore, id: PointId, column: PointColumn) -> CellValue {
    let Some(point) = store.point(id) else {
        return CellValue::Empty;
    };
    match column {
        PointColumn::Id => CellValue::text(&point.id),
        PointColumn::PointType => CellValue::Enum(point.point_type.name().into()),
        PointColumn::ChooserName => CellValue::text(&point.chooser_name),
        PointColumn::DateTime => CellValue::text(&point.date_time),
        PointColumn::EditLock => CellValue::Bool(point.edit_lock),
        PointColumn::Ignored => CellValue::Bool(point.ignored),
        PointColumn::Reference => point
            .reference()
            .and_then(|m| store.measure(m))
            .map_or(CellValue::Empty, |m| CellValue::text(&*m.serial)),
        PointColumn::AdjustedLatitude => CellValue::number(point.adjusted.latitude),
        PointColumn::AdjustedLongitude => CellValue::number(point.adjusted.longitude),
        PointColumn::AdjustedRadius => CellValue::number(point.adjusted.radius),
        PointColumn::AdjustedLatitudeSigma => CellValue::number(point.adjusted.latitude_sigma),
        PointColumn::AdjustedLongitudeSigma => CellValue::number(point.adjusted.longitude_sigma),
        PointColumn::AdjustedRadiusSigma => CellValue::number(point.adjusted.radius_sigma),
        PointColumn::APrioriLatitude => CellValue::number(point.apriori.latitude),
        PointColumn::APrioriLongitude => CellValue::number(point.apriori.longitude),
        PointColumn::APrioriRadius => CellValue::number(point.apriori.radius),
        PointColumn::APrioriLatitudeSigma => CellValue::number(point.apriori.latitude_sigma),
        PointColumn::APrioriLongitudeSigma => CellValue::number(point.apriori.longitude_sigma),
        PointColumn::APrioriRadiusSigma => CellValue::number(point.apriori.radius_sigma),
        PointColumn::APrioriSurfaceSource => {
            CellValue::Enum(point.apriori_surface_source.name().into())
        }
        PointColumn::APrioriSurfaceSourceFile => CellValue::text(&point.apriori_surface_source_file),
        PointColumn::APrioriRadiusSource => {
            CellValue::Enum(point.apriori_radius_source.name().into())
        }
        PointColumn::APrioriRadiusSourceFile => CellValue::text(&point.apriori_radius_source_file),
        PointColumn::JigsawRejected => CellValue::Bool(point.jigsaw_rejected),
        PointColumn::AverageResidual => CellValue::number(store.average_residual(id)),
    }
}

pub(crate) fn is_editable(store: &NetworkStore, id: PointId, column: PointColumn) -> bool {
    let Some(point) = store.point(id) else {
        return false;
    };
    if point.edit_lock {
        return column == PointColumn::EditLock;
    }
    !column.is_read_only()
}

pub(crate) fn set(network: &ControlNetwork, id: PointId, column: PointColumn, text: &str) -> Result<()> {
    let edit = {
        let store = network.read();
        let point = store
            .point(id)
            .ok_or_else(|| BrowseError::not_found("point", format!("{id:?}")))?;
        if column.is_adjusted_sigma() {
            return Err(BrowseError::programmer(format!(
                "{} is computed by the adjustment and cannot be set",
                column.title()
            )));
        }
        if column.rejects_writes() {
            return Err(UserErrorKind::ReadOnly.into());
        }
        if point.edit_lock && column != PointColumn::EditLock {
            return Err(UserErrorKind::EditLocked.into());
        }
        parse_edit(&store, point, column, text)?
    };

    match edit {
        PointEdit::Reference(measure) => network.set_reference(id, measure)?,
        edit => network.update_point(id, |point| edit.apply(point))?,
    }
    tracing::debug!(target: "cnet_browse::table", ?id, column = column.title(), "point cell set");
    Ok(())
}

/// A validated point edit, applied under the write lock.
#[derive(Debug, Clone)]
enum PointEdit {
    Id(String),
    PointType(PointType),
    ChooserName(String),
    EditLock(bool),
    Ignored(bool),
    Reference(crate::network::MeasureId),
    Adjusted(PointColumn, Option<f64>),
    APrioriCoordinate(PointColumn, Option<f64>),
    APrioriSigma(PointColumn, Option<f64>),
    SurfaceSource(SurfacePointSource),
    SurfaceSourceFile(String),
    RadiusSource(RadiusSource),
    RadiusSourceFile(String),
}

impl PointEdit {
    fn apply(&self, point: &mut ControlPoint) {
        match self {
            Self::Id(id) => point.id = id.clone(),
            Self::PointType(t) => point.point_type = *t,
            Self::ChooserName(name) => point.chooser_name = name.clone(),
            Self::EditLock(locked) => point.edit_lock = *locked,
            Self::Ignored(ignored) => point.ignored = *ignored,
            // Written through `ControlNetwork::set_reference`.
            Self::Reference(_) => {}
            Self::Adjusted(column, value) => match column {
                PointColumn::AdjustedLatitude => point.adjusted.latitude = *value,
                PointColumn::AdjustedLongitude => point.adjusted.longitude = *value,
                _ => point.adjusted.radius = *value,
            },
            Self::APrioriCoordinate(column, value) => {
                set_apriori_coordinate(&mut point.apriori, *column, *value)
            }
            Self::APrioriSigma(column, value) => {
                set_apriori_sigma(&mut point.apriori, *column, *value)
            }
            Self::SurfaceSource(source) => point.apriori_surface_source = *source,
            Self::SurfaceSourceFile(file) => point.apriori_surface_source_file = file.clone(),
            Self::RadiusSource(source) => point.apriori_radius_source = *source,
            Self::RadiusSourceFile(file) => point.apriori_radius_source_file = file.clone(),
        }
    }
}

fn parse_edit(
    store: &NetworkStore,
    point: &ControlPoint,
    column: PointColumn,
    text: &str,
) -> Result<PointEdit> {
    let invalid = || BrowseError::User(UserErrorKind::InvalidForEntity);
    let number = || parse_number(text).ok_or_else(invalid);
    let flag = || parse_bool(text).ok_or_else(invalid);

    Ok(match column {
        PointColumn::Id => {
            let id = text.trim();
            if id.is_empty() {
                return Err(invalid());
            }
            if id != point.id && store.find_point(id).is_some() {
                return Err(UserErrorKind::DuplicatePointId.into());
            }
            PointEdit::Id(id.to_string())
        }
        PointColumn::PointType => {
            PointEdit::PointType(PointType::from_name(text).ok_or_else(invalid)?)
        }
        PointColumn::ChooserName => PointEdit::ChooserName(text.to_string()),
        PointColumn::EditLock => PointEdit::EditLock(flag()?),
        PointColumn::Ignored => PointEdit::Ignored(flag()?),
        PointColumn::Reference => {
            let serial = text.trim();
            let measure = point
                .measures()
                .iter()
                .copied()
                .find(|&m| store.measure(m).is_some_and(|m| &*m.serial == serial))
                .ok_or_else(invalid)?;
            PointEdit::Reference(measure)
        }
        PointColumn::AdjustedLatitude
        | PointColumn::AdjustedLongitude
        | PointColumn::AdjustedRadius => PointEdit::Adjusted(column, number()?),
        PointColumn::APrioriLatitude
        | PointColumn::APrioriLongitude
        | PointColumn::APrioriRadius => PointEdit::APrioriCoordinate(column, number()?),
        PointColumn::APrioriLatitudeSigma
        | PointColumn::APrioriLongitudeSigma
        | PointColumn::APrioriRadiusSigma => PointEdit::APrioriSigma(column, number()?),
        PointColumn::APrioriSurfaceSource => {
            PointEdit::SurfaceSource(SurfacePointSource::from_name(text).ok_or_else(invalid)?)
        }
        PointColumn::APrioriSurfaceSourceFile => PointEdit::SurfaceSourceFile(text.to_string()),
        PointColumn::APrioriRadiusSource => {
            PointEdit::RadiusSource(RadiusSource::from_name(text).ok_or_else(invalid)?)
        }
        PointColumn::APrioriRadiusSourceFile => PointEdit::RadiusSourceFile(text.to_string()),
        PointColumn::DateTime
        | PointColumn::JigsawRejected
        | PointColumn::AverageResidual
        | PointColumn::AdjustedLatitudeSigma
        | PointColumn::AdjustedLongitudeSigma
        | PointColumn::AdjustedRadiusSigma => return Err(UserErrorKind::ReadOnly.into()),
    })
}

/// A null coordinate clears all three; otherwise unset ones take defaults.
fn set_apriori_coordinate(sp: &mut SurfacePoint, column: PointColumn, value: Option<f64>) {
    let Some(value) = value else {
        sp.latitude = None;
        sp.longitude = None;
        sp.radius = None;
        return;
    };
    match column {
        PointColumn::APrioriLatitude => sp.latitude = Some(value),
        PointColumn::APrioriLongitude => sp.longitude = Some(value),
        _ => sp.radius = Some(value),
    }
    sp.latitude.get_or_insert(0.0);
    sp.longitude.get_or_insert(0.0);
    sp.radius.get_or_insert(DEFAULT_APRIORI_RADIUS);
}

/// A null sigma clears all three; otherwise unset ones take the free default.
fn set_apriori_sigma(sp: &mut SurfacePoint, column: PointColumn, value: Option<f64>) {
    let Some(value) = value else {
        sp.latitude_sigma = None;
        sp.longitude_sigma = None;
        sp.radius_sigma = None;
        return;
    };
    match column {
        PointColumn::APrioriLatitudeSigma => sp.latitude_sigma = Some(value),
        PointColumn::APrioriLongitudeSigma => sp.longitude_sigma = Some(value),
        _ => sp.radius_sigma = Some(value),
    }
    sp.latitude_sigma.get_or_insert(DEFAULT_APRIORI_SIGMA);
    sp.longitude_sigma.get_or_insert(DEFAULT_APRIORI_SIGMA);
    sp.radius_sigma.get_or_insert(DEFAULT_APRIORI_SIGMA);
}

pub(crate) fn can_delete(store: &NetworkStore, id: PointId) -> Result<()> {
    let point = store
        .point(id)
        .ok_or_else(|| BrowseError::not_found("point", format!("{id:?}")))?;
    if point.edit_lock {
        return Err(UserErrorKind::EditLocked.into());
    }
    if store.has_locked_measures(id) {
        return Err(UserErrorKind::HasLockedMeasures.into());
    }
    Ok(())
}

pub(crate) fn warning_message(
    store: &NetworkStore,
    id: PointId,
    column: PointColumn,
    new_text: &str,
) -> String {
    let Some(point) = store.point(id) else {
        return String::new();
    };

    if column == PointColumn::EditLock {
        if point.edit_lock && parse_bool(new_text) == Some(false) {
            return "Are you sure you want to unlock this point? Unlocked points may be \
                    modified by other programs."
                .to_string();
        }
        return String::new();
    }

    let setting_value = matches!(parse_number(new_text), Some(Some(_)));
    if column.is_apriori_sigma() && setting_value && point.apriori.sigmas_unset() {
        return format!(
            "The a priori sigmas of this point are unset. The two sigmas you are not \
             setting will default to {DEFAULT_APRIORI_SIGMA} meters, which leaves them \
             effectively free."
        );
    }
    if column.is_apriori_coordinate() && setting_value && point.apriori.coordinates_unset() {
        return format!(
            "The a priori surface point of this point is unset. Unset latitude and \
             longitude will default to 0 and an unset radius to {DEFAULT_APRIORI_RADIUS} \
             meters."
        );
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ControlMeasure;

    fn network_with_point(point: ControlPoint) -> (ControlNetwork, PointId) {
        let network = ControlNetwork::new();
        let id = network.add_point(point);
        network.add_measure(id, ControlMeasure::new("cube1")).unwrap();
        network.add_measure(id, ControlMeasure::new("cube2")).unwrap();
        (network, id)
    }

    #[test]
    fn test_titles_are_unique_and_resolvable() {
        for column in PointColumn::ALL {
            assert_eq!(PointColumn::from_title(column.title()), Some(column));
        }
        assert_eq!(PointColumn::from_title("Nope"), None);
    }

    #[test]
    fn test_booleans_and_reference() {
        let (network, id) = network_with_point(ControlPoint::new("P1").with_ignored(true));
        let store = network.read();
        assert_eq!(value(&store, id, PointColumn::Ignored).formatted(), "Yes");
        assert_eq!(value(&store, id, PointColumn::EditLock).formatted(), "No");
        assert_eq!(value(&store, id, PointColumn::Reference).formatted(), "cube1");
        assert_eq!(value(&store, id, PointColumn::AdjustedLatitude), CellValue::Null);
    }

    #[test]
    fn test_set_reference_by_serial() {
        let (network, id) = network_with_point(ControlPoint::new("P1"));
        set(&network, id, PointColumn::Reference, "cube2").unwrap();
        assert_eq!(
            value(&network.read(), id, PointColumn::Reference).formatted(),
            "cube2"
        );
        let err = set(&network, id, PointColumn::Reference, "cube9").unwrap_err();
        assert_eq!(err.user_kind(), Some(UserErrorKind::InvalidForEntity));
    }

    #[test]
    fn test_id_must_be_unique() {
        let (network, id) = network_with_point(ControlPoint::new("P1"));
        network.add_point(ControlPoint::new("P2"));

        let err = set(&network, id, PointColumn::Id, " P2 ").unwrap_err();
        assert_eq!(err.user_kind(), Some(UserErrorKind::DuplicatePointId));
        assert_eq!(network.read().find_point("P1"), Some(id));

        // Rewriting the current id is not a clash.
        set(&network, id, PointColumn::Id, "P1").unwrap();
        set(&network, id, PointColumn::Id, "P3").unwrap();
        assert_eq!(network.read().find_point("P3"), Some(id));
    }

    #[test]
    fn test_apriori_coordinate_defaults_and_clear() {
        let (network, id) = network_with_point(ControlPoint::new("P1"));
        set(&network, id, PointColumn::APrioriLatitude, "12.5").unwrap();
        {
            let store = network.read();
            let sp = store.point(id).unwrap().apriori;
            assert_eq!(sp.latitude, Some(12.5));
            assert_eq!(sp.longitude, Some(0.0));
            assert_eq!(sp.radius, Some(DEFAULT_APRIORI_RADIUS));
        }

        set(&network, id, PointColumn::APrioriRadius, "NULL").unwrap();
        assert!(network.read().point(id).unwrap().apriori.coordinates_unset());
    }

    #[test]
    fn test_apriori_sigma_defaults_and_clear() {
        let (network, id) = network_with_point(ControlPoint::new("P1"));
        set(&network, id, PointColumn::APrioriLongitudeSigma, "3").unwrap();
        {
            let store = network.read();
            let sp = store.point(id).unwrap().apriori;
            assert_eq!(sp.longitude_sigma, Some(3.0));
            assert_eq!(sp.latitude_sigma, Some(DEFAULT_APRIORI_SIGMA));
            assert_eq!(sp.radius_sigma, Some(DEFAULT_APRIORI_SIGMA));
        }
        set(&network, id, PointColumn::APrioriLatitudeSigma, "null").unwrap();
        assert!(network.read().point(id).unwrap().apriori.sigmas_unset());
    }

    #[test]
    fn test_adjusted_sigma_is_programmer_error() {
        let (network, id) = network_with_point(ControlPoint::new("P1"));
        assert!(matches!(
            set(&network, id, PointColumn::AdjustedRadiusSigma, "1"),
            Err(BrowseError::Programmer(_))
        ));
        set(&network, id, PointColumn::AdjustedLatitude, "4.25").unwrap();
        assert_eq!(
            value(&network.read(), id, PointColumn::AdjustedLatitude),
            CellValue::Number(4.25)
        );
    }

    #[test]
    fn test_edit_lock_policy() {
        let (network, id) = network_with_point(ControlPoint::new("P1").with_edit_lock(true));
        {
            let store = network.read();
            assert!(is_editable(&store, id, PointColumn::EditLock));
            assert!(!is_editable(&store, id, PointColumn::ChooserName));
        }
        let err = set(&network, id, PointColumn::ChooserName, "me").unwrap_err();
        assert_eq!(err.user_kind(), Some(UserErrorKind::EditLocked));
        assert_eq!(
            can_delete(&network.read(), id).unwrap_err().user_kind(),
            Some(UserErrorKind::EditLocked)
        );

        set(&network, id, PointColumn::EditLock, "No").unwrap();
        set(&network, id, PointColumn::ChooserName, "me").unwrap();
    }

    #[test]
    fn test_read_only_columns() {
        let (network, id) = network_with_point(ControlPoint::new("P1"));
        let columns = [
            PointColumn::JigsawRejected,
            PointColumn::AverageResidual,
            PointColumn::DateTime,
        ];
        for column in columns {
            assert_eq!(
                set(&network, id, column, "1").unwrap_err().user_kind(),
                Some(UserErrorKind::ReadOnly)
            );
        }
    }

    #[test]
    fn test_warnings() {
        let (network, id) = network_with_point(ControlPoint::new("P1").with_edit_lock(true));
        let store = network.read();
        assert!(!warning_message(&store, id, PointColumn::EditLock, "No").is_empty());
        assert!(warning_message(&store, id, PointColumn::EditLock, "Yes").is_empty());
        assert!(!warning_message(&store, id, PointColumn::APrioriRadiusSigma, "5").is_empty());
        assert!(warning_message(&store, id, PointColumn::APrioriRadiusSigma, "NULL").is_empty());
        assert!(!warning_message(&store, id, PointColumn::APrioriLongitude, "5").is_empty());
        assert!(warning_message(&store, id, PointColumn::ChooserName, "x").is_empty());
    }

    #[test]
    fn test_no_warning_when_coordinates_known() {
        let point = ControlPoint::new("P1")
            .with_apriori(SurfacePoint::new(1.0, 2.0, 3.0).with_sigmas(1.0, 1.0, 1.0));
        let (network, id) = network_with_point(point);
        let store = network.read();
        assert!(warning_message(&store, id, PointColumn::APrioriLatitude, "5").is_empty());
        assert!(warning_message(&store, id, PointColumn::APrioriLatitudeSigma, "5").is_empty());
    }

    #[test]
    fn test_delete_refused_with_locked_measure() {
        let network = ControlNetwork::new();
        let id = network.add_point(ControlPoint::new("P1"));
        network
            .add_measure(id, ControlMeasure::new("cube1").with_edit_lock(true))
            .unwrap();
        assert_eq!(
            can_delete(&network.read(), id).unwrap_err().user_kind(),
            Some(UserErrorKind::HasLockedMeasures)
        );
    }
}
