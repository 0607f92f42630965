//! Measure columns and edit policy.

use crate::error::{BrowseError, Result, UserErrorKind};
use crate::network::{
    ControlMeasure, ControlNetwork, MeasureId, MeasureLogKind, MeasureType, NetworkStore,
};
use crate::value::{CellValue, parse_bool, parse_number};

/// Columns of the measure table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureColumn {
    PointId,
    ImageId,
    Sample,
    Line,
    EditLocked,
    Ignored,
    MeasureType,
    GoodnessOfFit,
    MinimumPixelZScore,
    MaximumPixelZScore,
    SampleShift,
    LineShift,
    SampleSigma,
    LineSigma,
    APrioriSample,
    APrioriLine,
    Diameter,
    JigsawRejected,
    ResidualSample,
    ResidualLine,
    ResidualMagnitude,
}

impl MeasureColumn {
    /// Every column, in table order.
    pub const ALL: [MeasureColumn; 21] = [
        Self::PointId,
        Self::ImageId,
        Self::Sample,
        Self::Line,
        Self::EditLocked,
        Self::Ignored,
        Self::MeasureType,
        Self::GoodnessOfFit,
        Self::MinimumPixelZScore,
        Self::MaximumPixelZScore,
        Self::SampleShift,
        Self::LineShift,
        Self::SampleSigma,
        Self::LineSigma,
        Self::APrioriSample,
        Self::APrioriLine,
        Self::Diameter,
        Self::JigsawRejected,
        Self::ResidualSample,
        Self::ResidualLine,
        Self::ResidualMagnitude,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::PointId => "Point ID",
            Self::ImageId => "Image ID",
            Self::Sample => "Sample",
            Self::Line => "Line",
            Self::EditLocked => "Edit Locked",
            Self::Ignored => "Ignored",
            Self::MeasureType => "Measure Type",
            Self::GoodnessOfFit => "Goodness of Fit",
            Self::MinimumPixelZScore => "Minimum Pixel Z-Score",
            Self::MaximumPixelZScore => "Maximum Pixel Z-Score",
            Self::SampleShift => "Sample Shift",
            Self::LineShift => "Line Shift",
            Self::SampleSigma => "Sample Sigma",
            Self::LineSigma => "Line Sigma",
            Self::APrioriSample => "A Priori Sample",
            Self::APrioriLine => "A Priori Line",
            Self::Diameter => "Diameter",
            Self::JigsawRejected => "Rejected by Jigsaw",
            Self::ResidualSample => "Residual Sample",
            Self::ResidualLine => "Residual Line",
            Self::ResidualMagnitude => "Residual Magnitude",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.title() == title)
    }

    /// Derived columns.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::PointId
                | Self::ImageId
                | Self::SampleShift
                | Self::LineShift
                | Self::JigsawRejected
                | Self::ResidualMagnitude
        )
    }

    pub fn affects_network_structure(self) -> bool {
        matches!(self, Self::Ignored)
    }

    fn log_kind(self) -> Option<MeasureLogKind> {
        match self {
            Self::GoodnessOfFit => Some(MeasureLogKind::GoodnessOfFit),
            Self::MinimumPixelZScore => Some(MeasureLogKind::MinimumPixelZScore),
            Self::MaximumPixelZScore => Some(MeasureLogKind::MaximumPixelZScore),
            _ => None,
        }
    }
}

pub(crate) fn value(store: &NetworkStore, id: MeasureId, column: MeasureColumn) -> CellValue {
    let Some(measure) = store.measure(id) else {
        return CellValue::Empty;
    };
    if let Some(kind) = column.log_kind() {
        return CellValue::number(measure.log_value(kind));
    }
    match column {
        MeasureColumn::PointId => measure
            .parent()
            .and_then(|p| store.point(p))
            .map_or(CellValue::Empty, |p| CellValue::text(&p.id)),
        MeasureColumn::ImageId => CellValue::text(&*measure.serial),
        MeasureColumn::Sample => CellValue::number(measure.sample),
        MeasureColumn::Line => CellValue::number(measure.line),
        MeasureColumn::EditLocked => CellValue::Bool(measure.edit_lock),
        MeasureColumn::Ignored => CellValue::Bool(measure.ignored),
        MeasureColumn::MeasureType => CellValue::Enum(measure.measure_type.name().into()),
        MeasureColumn::SampleShift => CellValue::number(measure.sample_shift()),
        MeasureColumn::LineShift => CellValue::number(measure.line_shift()),
        MeasureColumn::SampleSigma => CellValue::number(measure.sample_sigma),
        MeasureColumn::LineSigma => CellValue::number(measure.line_sigma),
        MeasureColumn::APrioriSample => CellValue::number(measure.apriori_sample),
        MeasureColumn::APrioriLine => CellValue::number(measure.apriori_line),
        MeasureColumn::Diameter => CellValue::number(measure.diameter),
        MeasureColumn::JigsawRejected => CellValue::Bool(measure.jigsaw_rejected),
        MeasureColumn::ResidualSample => CellValue::number(measure.sample_residual),
        MeasureColumn::ResidualLine => CellValue::number(measure.line_residual),
        MeasureColumn::ResidualMagnitude => CellValue::number(measure.residual_magnitude()),
        MeasureColumn::GoodnessOfFit
        | MeasureColumn::MinimumPixelZScore
        | MeasureColumn::MaximumPixelZScore => CellValue::Null,
    }
}

fn parent_locked(store: &NetworkStore, measure: &ControlMeasure) -> bool {
    measure
        .parent()
        .and_then(|p| store.point(p))
        .is_some_and(|p| p.edit_lock)
}

pub(crate) fn is_editable(store: &NetworkStore, id: MeasureId, column: MeasureColumn) -> bool {
    let Some(measure) = store.measure(id) else {
        return false;
    };
    if parent_locked(store, measure) {
        return false;
    }
    if measure.edit_lock {
        return column == MeasureColumn::EditLocked;
    }
    !column.is_read_only()
}

pub(crate) fn set(
    network: &ControlNetwork,
    id: MeasureId,
    column: MeasureColumn,
    text: &str,
) -> Result<()> {
    {
        let store = network.read();
        let measure = store
            .measure(id)
            .ok_or_else(|| BrowseError::not_found("measure", format!("{id:?}")))?;
        if parent_locked(&store, measure) {
            return Err(UserErrorKind::ParentEditLocked.into());
        }
        if measure.edit_lock && column != MeasureColumn::EditLocked {
            return Err(UserErrorKind::EditLocked.into());
        }
        if column.is_read_only() {
            return Err(UserErrorKind::ReadOnly.into());
        }
    }

    let invalid = || BrowseError::User(UserErrorKind::InvalidForEntity);
    if let Some(kind) = column.log_kind() {
        let value = parse_number(text).ok_or_else(invalid)?;
        network.update_measure(id, |m| match value {
            Some(v) => {
                m.log.insert(kind, v);
            }
            None => {
                m.log.remove(&kind);
            }
        })?;
        return Ok(());
    }

    match column {
        MeasureColumn::EditLocked | MeasureColumn::Ignored => {
            let flag = parse_bool(text).ok_or_else(invalid)?;
            network.update_measure(id, |m| {
                if column == MeasureColumn::EditLocked {
                    m.edit_lock = flag;
                } else {
                    m.ignored = flag;
                }
            })?;
        }
        MeasureColumn::MeasureType => {
            let measure_type = MeasureType::from_name(text).ok_or_else(invalid)?;
            network.update_measure(id, |m| m.measure_type = measure_type)?;
        }
        _ => {
            let value = parse_number(text).ok_or_else(invalid)?;
            network.update_measure(id, |m| {
                let field = match column {
                    MeasureColumn::Sample => &mut m.sample,
                    MeasureColumn::Line => &mut m.line,
                    MeasureColumn::SampleSigma => &mut m.sample_sigma,
                    MeasureColumn::LineSigma => &mut m.line_sigma,
                    MeasureColumn::APrioriSample => &mut m.apriori_sample,
                    MeasureColumn::APrioriLine => &mut m.apriori_line,
                    MeasureColumn::Diameter => &mut m.diameter,
                    MeasureColumn::ResidualSample => &mut m.sample_residual,
                    _ => &mut m.line_residual,
                };
                *field = value;
            })?;
        }
    }
    tracing::debug!(target: "cnet_browse::table", ?id, column = column.title(), "measure cell set");
    Ok(())
}

pub(crate) fn can_delete(store: &NetworkStore, id: MeasureId) -> Result<()> {
    let measure = store
        .measure(id)
        .ok_or_else(|| BrowseError::not_found("measure", format!("{id:?}")))?;
    if parent_locked(store, measure) {
        return Err(UserErrorKind::ParentEditLocked.into());
    }
    if measure.edit_lock {
        return Err(UserErrorKind::EditLocked.into());
    }
    Ok(())
}

pub(crate) fn warning_message(
    store: &NetworkStore,
    id: MeasureId,
    column: MeasureColumn,
    new_text: &str,
) -> String {
    let Some(measure) = store.measure(id) else {
        return String::new();
    };
    if column == MeasureColumn::EditLocked
        && measure.edit_lock
        && parse_bool(new_text) == Some(false)
    {
        return "Are you sure you want to unlock this measure? Unlocked measures may be \
                moved by registration programs."
            .to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ControlPoint, PointId};

    fn network_with_measure(
        point: ControlPoint,
        measure: ControlMeasure,
    ) -> (ControlNetwork, PointId, MeasureId) {
        let network = ControlNetwork::new();
        let p = network.add_point(point);
        let m = network.add_measure(p, measure).unwrap();
        (network, p, m)
    }

    #[test]
    fn test_titles_resolve() {
        for column in MeasureColumn::ALL {
            assert_eq!(MeasureColumn::from_title(column.title()), Some(column));
        }
    }

    #[test]
    fn test_values() {
        let measure = ControlMeasure::new("cube1")
            .with_coordinate(1.0, 2.0)
            .with_residuals(3.0, 4.0)
            .with_log(MeasureLogKind::GoodnessOfFit, 0.9);
        let (network, _, m) = network_with_measure(ControlPoint::new("P1"), measure);
        let store = network.read();
        assert_eq!(value(&store, m, MeasureColumn::PointId).formatted(), "P1");
        assert_eq!(value(&store, m, MeasureColumn::ImageId).formatted(), "cube1");
        assert_eq!(value(&store, m, MeasureColumn::ResidualMagnitude), CellValue::Number(5.0));
        assert_eq!(value(&store, m, MeasureColumn::GoodnessOfFit), CellValue::Number(0.9));
        assert_eq!(value(&store, m, MeasureColumn::MinimumPixelZScore), CellValue::Null);
        assert_eq!(value(&store, m, MeasureColumn::SampleShift), CellValue::Null);
    }

    #[test]
    fn test_set_then_read() {
        let (network, _, m) = network_with_measure(ControlPoint::new("P1"), ControlMeasure::new("c"));
        set(&network, m, MeasureColumn::Sample, "12.5").unwrap();
        set(&network, m, MeasureColumn::MeasureType, "RegisteredPixel").unwrap();
        set(&network, m, MeasureColumn::GoodnessOfFit, "0.5").unwrap();
        {
            let store = network.read();
            assert_eq!(value(&store, m, MeasureColumn::Sample).formatted(), "12.5");
            assert_eq!(
                value(&store, m, MeasureColumn::MeasureType).formatted(),
                "RegisteredPixel"
            );
            assert_eq!(value(&store, m, MeasureColumn::GoodnessOfFit).formatted(), "0.5");
        }

        set(&network, m, MeasureColumn::Sample, "NULL").unwrap();
        set(&network, m, MeasureColumn::GoodnessOfFit, "NULL").unwrap();
        let store = network.read();
        assert!(value(&store, m, MeasureColumn::Sample).is_null());
        assert!(value(&store, m, MeasureColumn::GoodnessOfFit).is_null());
    }

    #[test]
    fn test_parent_lock_blocks_everything() {
        let (network, _, m) = network_with_measure(
            ControlPoint::new("P1").with_edit_lock(true),
            ControlMeasure::new("c"),
        );
        {
            let store = network.read();
            for column in MeasureColumn::ALL {
                assert!(!is_editable(&store, m, column));
            }
            assert_eq!(
                can_delete(&store, m).unwrap_err().user_kind(),
                Some(UserErrorKind::ParentEditLocked)
            );
        }
        assert_eq!(
            set(&network, m, MeasureColumn::Sample, "1").unwrap_err().user_kind(),
            Some(UserErrorKind::ParentEditLocked)
        );
    }

    #[test]
    fn test_own_lock_leaves_lock_column() {
        let (network, _, m) = network_with_measure(
            ControlPoint::new("P1"),
            ControlMeasure::new("c").with_edit_lock(true),
        );
        {
            let store = network.read();
            assert!(is_editable(&store, m, MeasureColumn::EditLocked));
            assert!(!is_editable(&store, m, MeasureColumn::Sample));
            assert!(!warning_message(&store, m, MeasureColumn::EditLocked, "No").is_empty());
        }
        assert_eq!(
            set(&network, m, MeasureColumn::Line, "1").unwrap_err().user_kind(),
            Some(UserErrorKind::EditLocked)
        );
        set(&network, m, MeasureColumn::EditLocked, "No").unwrap();
        set(&network, m, MeasureColumn::Line, "1").unwrap();
    }

    #[test]
    fn test_read_only_and_invalid() {
        let (network, _, m) = network_with_measure(ControlPoint::new("P1"), ControlMeasure::new("c"));
        assert_eq!(
            set(&network, m, MeasureColumn::ResidualMagnitude, "1").unwrap_err().user_kind(),
            Some(UserErrorKind::ReadOnly)
        );
        assert_eq!(
            set(&network, m, MeasureColumn::Sample, "abc").unwrap_err().user_kind(),
            Some(UserErrorKind::InvalidForEntity)
        );
    }
}
