//! In-memory control network.
//!
//! [`ControlNetwork`] is a cloneable handle to a store of points, measures
//! and images. Workers read it concurrently through [`ControlNetwork::read`];
//! mutations happen on the main thread and announce removed entities through
//! [`NetworkSignals`] after the store lock has been released, so slots may
//! read the network again.
//!
//! # Example
//!
//! ```
//! use cnet_browse::network::{ControlMeasure, ControlNetwork, ControlPoint};
//!
//! let network = ControlNetwork::new();
//! let p1 = network.add_point(ControlPoint::new("P1"));
//! network.add_measure(p1, ControlMeasure::new("cube-a")).unwrap();
//! network.add_measure(p1, ControlMeasure::new("cube-b")).unwrap();
//!
//! let store = network.read();
//! assert_eq!(store.point_count(), 1);
//! assert_eq!(store.adjacent_images("cube-a").len(), 1);
//! ```

mod measure;
mod point;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cnet_browse_core::Signal;
use parking_lot::{RwLock, RwLockReadGuard};
use slotmap::{SlotMap, new_key_type};

use crate::error::{BrowseError, Result};

pub use measure::{ControlMeasure, MeasureLogKind, MeasureType};
pub use point::{
    ControlPoint, DEFAULT_APRIORI_RADIUS, DEFAULT_APRIORI_SIGMA, PointType, RadiusSource,
    SurfacePoint, SurfacePointSource,
};

new_key_type! {
    /// Handle of a point in a [`ControlNetwork`].
    pub struct PointId;

    /// Handle of a measure in a [`ControlNetwork`].
    pub struct MeasureId;
}

/// Destruction notifications, one signal per entity kind.
pub struct NetworkSignals {
    /// A point was removed. Its measures were announced first.
    pub point_destroyed: Signal<PointId>,
    /// A measure was removed.
    pub measure_destroyed: Signal<MeasureId>,
    /// An image lost its last measure and left the network.
    pub image_destroyed: Signal<Arc<str>>,
}

impl NetworkSignals {
    fn new() -> Self {
        Self {
            point_destroyed: Signal::new(),
            measure_destroyed: Signal::new(),
            image_destroyed: Signal::new(),
        }
    }
}

/// The entities of a control network.
///
/// Obtained through [`ControlNetwork::read`].
#[derive(Default)]
pub struct NetworkStore {
    points: SlotMap<PointId, ControlPoint>,
    point_order: Vec<PointId>,
    measures: SlotMap<MeasureId, ControlMeasure>,
    images: Vec<Arc<str>>,
    cube_measures: HashMap<Arc<str>, Vec<MeasureId>>,
}

impl NetworkStore {
    pub fn point(&self, id: PointId) -> Option<&ControlPoint> {
        self.points.get(id)
    }

    pub fn measure(&self, id: MeasureId) -> Option<&ControlMeasure> {
        self.measures.get(id)
    }

    /// Points in insertion order.
    pub fn point_ids(&self) -> &[PointId] {
        &self.point_order
    }

    pub fn point_count(&self) -> usize {
        self.point_order.len()
    }

    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    /// Image serial numbers in the order their first measure was added.
    pub fn image_serials(&self) -> &[Arc<str>] {
        &self.images
    }

    pub fn contains_image(&self, serial: &str) -> bool {
        self.cube_measures.contains_key(serial)
    }

    /// Measures lying in the image `serial`, in insertion order.
    pub fn measures_in_cube(&self, serial: &str) -> &[MeasureId] {
        self.cube_measures
            .get(serial)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Images sharing at least one point with `serial`, in image order.
    pub fn adjacent_images(&self, serial: &str) -> Vec<Arc<str>> {
        let mut adjacent: HashSet<&str> = HashSet::new();
        for &measure_id in self.measures_in_cube(serial) {
            let Some(point) = self
                .measures
                .get(measure_id)
                .and_then(|m| m.point)
                .and_then(|p| self.points.get(p))
            else {
                continue;
            };
            for &other in &point.measures {
                if let Some(other) = self.measures.get(other) {
                    adjacent.insert(other.serial.as_ref());
                }
            }
        }
        adjacent.remove(serial);

        self.images
            .iter()
            .filter(|image| adjacent.contains(image.as_ref()))
            .cloned()
            .collect()
    }

    /// Find a point by its identifier string.
    pub fn find_point(&self, id: &str) -> Option<PointId> {
        self.point_order
            .iter()
            .copied()
            .find(|&p| self.points.get(p).is_some_and(|point| point.id == id))
    }

    /// Find the measure of point `point_id` lying in image `serial`.
    pub fn find_measure(&self, point_id: &str, serial: &str) -> Option<MeasureId> {
        let point = self.points.get(self.find_point(point_id)?)?;
        point
            .measures
            .iter()
            .copied()
            .find(|&m| self.measures.get(m).is_some_and(|measure| &*measure.serial == serial))
    }

    /// Mean residual magnitude over the point's measures that have one.
    pub fn average_residual(&self, id: PointId) -> Option<f64> {
        let point = self.points.get(id)?;
        let magnitudes: Vec<f64> = point
            .measures
            .iter()
            .filter_map(|&m| self.measures.get(m)?.residual_magnitude())
            .collect();
        if magnitudes.is_empty() {
            None
        } else {
            Some(magnitudes.iter().sum::<f64>() / magnitudes.len() as f64)
        }
    }

    /// True if any measure of the point is edit-locked.
    pub fn has_locked_measures(&self, id: PointId) -> bool {
        self.points.get(id).is_some_and(|point| {
            point
                .measures
                .iter()
                .any(|&m| self.measures.get(m).is_some_and(|measure| measure.edit_lock))
        })
    }

    /// Remove a measure. Returns whether its image became empty.
    fn remove_measure(&mut self, id: MeasureId) -> Option<(ControlMeasure, bool)> {
        let measure = self.measures.remove(id)?;
        if let Some(point) = measure.point.and_then(|p| self.points.get_mut(p)) {
            point.measures.retain(|&m| m != id);
            if point.reference == Some(id) {
                point.reference = None;
            }
        }

        let mut image_emptied = false;
        if let Some(cube) = self.cube_measures.get_mut(&measure.serial) {
            cube.retain(|&m| m != id);
            if cube.is_empty() {
                self.cube_measures.remove(&measure.serial);
                self.images.retain(|image| image != &measure.serial);
                image_emptied = true;
            }
        }
        Some((measure, image_emptied))
    }
}

/// Shared handle to a control network.
#[derive(Clone)]
pub struct ControlNetwork {
    store: Arc<RwLock<NetworkStore>>,
    signals: Arc<NetworkSignals>,
}

impl Default for ControlNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(NetworkStore::default())),
            signals: Arc::new(NetworkSignals::new()),
        }
    }

    /// Lock the store for reading.
    ///
    /// Do not call mutators while holding the guard.
    pub fn read(&self) -> RwLockReadGuard<'_, NetworkStore> {
        self.store.read()
    }

    /// Destruction signals.
    pub fn signals(&self) -> &NetworkSignals {
        &self.signals
    }

    /// Whether two handles refer to the same network.
    pub fn same_as(&self, other: &ControlNetwork) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Append a point. Any measure bookkeeping on `point` is discarded.
    pub fn add_point(&self, mut point: ControlPoint) -> PointId {
        point.measures.clear();
        point.reference = None;
        let mut store = self.store.write();
        let id = store.points.insert(point);
        store.point_order.push(id);
        tracing::trace!(target: "cnet_browse::network", ?id, "point added");
        id
    }

    /// Append a measure to `point`, registering its image if it is new.
    pub fn add_measure(&self, point: PointId, mut measure: ControlMeasure) -> Result<MeasureId> {
        let mut store = self.store.write();
        if !store.points.contains_key(point) {
            return Err(BrowseError::not_found("point", format!("{point:?}")));
        }
        measure.point = Some(point);
        let serial = measure.serial.clone();
        let id = store.measures.insert(measure);
        if let Some(parent) = store.points.get_mut(point) {
            parent.measures.push(id);
        }
        if !store.cube_measures.contains_key(&serial) {
            store.images.push(serial.clone());
        }
        store.cube_measures.entry(serial).or_default().push(id);
        tracing::trace!(target: "cnet_browse::network", ?id, ?point, "measure added");
        Ok(id)
    }

    /// Designate the reference measure of a point.
    pub fn set_reference(&self, point: PointId, measure: MeasureId) -> Result<()> {
        let mut store = self.store.write();
        let parent = store.points.get_mut(point).ok_or_else(|| {
            BrowseError::not_found("point", format!("{point:?}"))
        })?;
        if !parent.measures.contains(&measure) {
            return Err(BrowseError::programmer(
                "reference measure must belong to the point",
            ));
        }
        parent.reference = Some(measure);
        Ok(())
    }

    /// Mutate a point in place.
    pub fn update_point<R>(&self, id: PointId, f: impl FnOnce(&mut ControlPoint) -> R) -> Result<R> {
        let mut store = self.store.write();
        let point = store
            .points
            .get_mut(id)
            .ok_or_else(|| BrowseError::not_found("point", format!("{id:?}")))?;
        Ok(f(point))
    }

    /// Mutate a measure in place. The image serial and parent are restored afterwards.
    pub fn update_measure<R>(
        &self,
        id: MeasureId,
        f: impl FnOnce(&mut ControlMeasure) -> R,
    ) -> Result<R> {
        let mut store = self.store.write();
        let measure = store
            .measures
            .get_mut(id)
            .ok_or_else(|| BrowseError::not_found("measure", format!("{id:?}")))?;
        let serial = measure.serial.clone();
        let point = measure.point;
        let result = f(measure);
        measure.serial = serial;
        measure.point = point;
        Ok(result)
    }

    /// Remove a point and its measures.
    ///
    /// Emits `measure_destroyed` per measure, `image_destroyed` per emptied
    /// image, then `point_destroyed`.
    #[tracing::instrument(skip(self), target = "cnet_browse::network", level = "debug")]
    pub fn delete_point(&self, id: PointId) -> Result<()> {
        let (measures, emptied) = {
            let mut store = self.store.write();
            let measure_ids = store
                .points
                .get(id)
                .ok_or_else(|| BrowseError::not_found("point", format!("{id:?}")))?
                .measures
                .clone();

            let mut emptied = Vec::new();
            for &measure_id in &measure_ids {
                if let Some((measure, true)) = store.remove_measure(measure_id) {
                    emptied.push(measure.serial);
                }
            }
            store.points.remove(id);
            store.point_order.retain(|&p| p != id);
            (measure_ids, emptied)
        };

        for measure in measures {
            self.signals.measure_destroyed.emit(measure);
        }
        for serial in emptied {
            self.signals.image_destroyed.emit(serial);
        }
        self.signals.point_destroyed.emit(id);
        Ok(())
    }

    /// Remove a single measure.
    #[tracing::instrument(skip(self), target = "cnet_browse::network", level = "debug")]
    pub fn delete_measure(&self, id: MeasureId) -> Result<()> {
        let (measure, emptied) = self
            .store
            .write()
            .remove_measure(id)
            .ok_or_else(|| BrowseError::not_found("measure", format!("{id:?}")))?;

        self.signals.measure_destroyed.emit(id);
        if emptied {
            self.signals.image_destroyed.emit(measure.serial);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ControlNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.read();
        f.debug_struct("ControlNetwork")
            .field("points", &store.point_count())
            .field("measures", &store.measure_count())
            .field("images", &store.images.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ControlNetwork: Send, Sync);
