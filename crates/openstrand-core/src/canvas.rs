//! The canvas: strand arena, layer order, flags and derived state.

use crate::error::{StrandError, StrandResult};
use crate::events::{CanvasEvent, EventBus};
use crate::geometry::{GeoRegionOps, RegionOps};
use crate::group::Group;
use crate::layer_state::LayerState;
use crate::paint::PaintSettings;
use crate::settings::UserSettings;
use crate::strand::{End, Rgba, Strand, StrandId, parse_layer_name, parse_masked_layer_name, validate_layer_name};
use kurbo::{Point, Rect};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Colors handed out to new sets, cycling.
const SET_PALETTE: [Rgba; 6] = [
    Rgba::new(128, 0, 128, 255),
    Rgba::new(200, 170, 0, 255),
    Rgba::new(0, 120, 200, 255),
    Rgba::new(200, 60, 60, 255),
    Rgba::new(40, 160, 80, 255),
    Rgba::new(230, 120, 20, 255),
];

/// Set number encoded in a layer name; the first component's for masks.
fn name_set_number(strand: &Strand) -> Option<i32> {
    let name = if strand.is_masked() {
        parse_masked_layer_name(strand.layer_name())?.0
    } else {
        strand.layer_name().to_string()
    };
    parse_layer_name(&name).map(|(set, _)| set)
}

/// Flags raised while a snapshot is being applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Suppression {
    pub attachment_updates: bool,
    pub repaint: bool,
    pub layer_panel_refresh: bool,
}

impl Suppression {
    pub fn any(&self) -> bool {
        self.attachment_updates || self.repaint || self.layer_panel_refresh
    }
}

/// Strands, groups and UI flags.
#[derive(Debug)]
pub struct Canvas {
    strands: HashMap<StrandId, Strand>,
    /// Layer order (back to front).
    order: Vec<StrandId>,
    pub(crate) groups: BTreeMap<String, Group>,
    selected: Option<StrandId>,
    newest: Option<StrandId>,
    pub locked_layers: BTreeSet<usize>,
    pub lock_mode: bool,
    pub shadow_enabled: bool,
    pub show_control_points: bool,
    pub paint: PaintSettings,
    /// Strand being rubber-banded by a mode; not part of the layers.
    pub in_progress: Option<Strand>,
    theme: String,
    language: String,
    layer_state: LayerState,
    pub(crate) events: EventBus,
    suppression: Suppression,
    repaint_requested: bool,
    layer_panel_dirty: bool,
    region_ops: Box<dyn RegionOps>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Create an empty canvas using `geo` for mask booleans.
    pub fn new() -> Self {
        Self::with_region_ops(Box::new(GeoRegionOps::new()))
    }

    /// Create an empty canvas with a custom region backend.
    pub fn with_region_ops(region_ops: Box<dyn RegionOps>) -> Self {
        let defaults = UserSettings::default();
        Self {
            strands: HashMap::new(),
            order: Vec::new(),
            groups: BTreeMap::new(),
            selected: None,
            newest: None,
            locked_layers: BTreeSet::new(),
            lock_mode: false,
            shadow_enabled: true,
            show_control_points: false,
            paint: PaintSettings::from(&defaults),
            in_progress: None,
            theme: defaults.theme,
            language: defaults.language,
            layer_state: LayerState::default(),
            events: EventBus::new(),
            suppression: Suppression::default(),
            repaint_requested: false,
            layer_panel_dirty: false,
            region_ops,
        }
    }

    pub fn region_ops(&self) -> &dyn RegionOps {
        self.region_ops.as_ref()
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn layer_state(&self) -> &LayerState {
        &self.layer_state
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: StrandId) -> Option<&Strand> {
        self.strands.get(&id)
    }

    pub fn get_mut(&mut self, id: StrandId) -> Option<&mut Strand> {
        self.strands.get_mut(&id)
    }

    /// Look a strand up by layer name.
    pub fn by_name(&self, name: &str) -> Option<&Strand> {
        self.strands.values().find(|s| s.layer_name() == name)
    }

    pub fn id_of(&self, name: &str) -> Option<StrandId> {
        self.by_name(name).map(Strand::id)
    }

    /// Layer index of a strand.
    pub fn index_of(&self, id: StrandId) -> Option<usize> {
        self.order.iter().position(|&i| i == id)
    }

    /// Ids in layer order.
    pub fn strand_ids(&self) -> &[StrandId] {
        &self.order
    }

    /// Strands in layer order (back to front).
    pub fn strands(&self) -> impl Iterator<Item = &Strand> {
        self.order.iter().filter_map(|id| self.strands.get(id))
    }

    /// Masked strands built over `id`.
    pub fn masks_of(&self, id: StrandId) -> Vec<StrandId> {
        self.strands()
            .filter(|s| s.mask_components().map(|(a, b)| a == id || b == id).unwrap_or(false))
            .map(Strand::id)
            .collect()
    }

    /// Whether a mask over the two strands exists, in either order.
    pub fn has_mask(&self, a: StrandId, b: StrandId) -> bool {
        self.strands().any(|s| {
            s.mask_components()
                .map(|(x, y)| (x == a && y == b) || (x == b && y == a))
                .unwrap_or(false)
        })
    }

    /// Add a strand on top of the layer stack.
    ///
    /// Attached strands are registered with their parent.
    pub fn add_strand(&mut self, strand: Strand) -> StrandResult<StrandId> {
        validate_layer_name(strand.layer_name(), strand.is_masked())?;
        if name_set_number(&strand) != Some(strand.set_number()) {
            return Err(StrandError::InvalidLayerName(strand.layer_name().to_string()));
        }
        if self.by_name(strand.layer_name()).is_some() {
            return Err(StrandError::DuplicateLayerName(strand.layer_name().to_string()));
        }
        let id = strand.id();
        if let Some((parent, side)) = strand.parent() {
            if let Some(parent) = self.strands.get_mut(&parent) {
                if !parent.core.attached_strands.contains(&id) {
                    parent.core.attached_strands.push(id);
                }
                parent.core.has_circles[side.index()] = true;
            }
        }
        self.events.emit(CanvasEvent::StrandCreated {
            id,
            layer_name: strand.layer_name().to_string(),
        });
        self.order.push(id);
        self.strands.insert(id, strand);
        self.newest = Some(id);
        Ok(id)
    }

    /// Create the main strand of a set.
    ///
    /// Uses the next free set number when `set_number` is `None`. The color
    /// comes from the set registry.
    pub fn create_new_strand(&mut self, set_number: Option<i32>, start: Point, end: Point) -> StrandResult<StrandId> {
        let set = set_number.unwrap_or_else(|| self.layer_state.next_set_number());
        let mut strand = Strand::straight(format!("{set}_1"), set, start, end);
        let color = self.set_color(set);
        strand.set_color(color);
        strand.core.shadow_color = self.paint.shadow_color;
        let id = self.add_strand(strand)?;
        self.selected = Some(id);
        self.finish_mutation();
        Ok(id)
    }

    /// Color registered for a set, or a palette color for a new one.
    pub fn set_color(&self, set_number: i32) -> Rgba {
        self.layer_state.set_color(set_number).unwrap_or_else(|| {
            let slot = (set_number.max(1) - 1) as usize % SET_PALETTE.len();
            SET_PALETTE[slot]
        })
    }

    /// Next unused index within a set.
    pub fn next_index_in_set(&self, set_number: i32) -> u32 {
        self.strands()
            .filter(|s| !s.is_masked() && s.set_number() == set_number)
            .filter_map(|s| crate::strand::parse_layer_name(s.layer_name()))
            .map(|(_, k)| k)
            .max()
            .map(|k| k + 1)
            .unwrap_or(1)
    }

    /// All strands transitively attached to `id`, depth first.
    pub fn descendants(&self, id: StrandId) -> Vec<StrandId> {
        let mut result = Vec::new();
        let mut stack: Vec<StrandId> = self
            .get(id)
            .map(|s| s.core.attached_strands.iter().rev().copied().collect())
            .unwrap_or_default();
        let mut seen = HashSet::from([id]);
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            result.push(next);
            if let Some(strand) = self.get(next) {
                stack.extend(strand.core.attached_strands.iter().rev().copied());
            }
        }
        result
    }

    /// Delete a strand together with its descendants and every mask
    /// containing any of them. Returns the removed ids.
    pub fn delete_strand(&mut self, id: StrandId) -> StrandResult<Vec<StrandId>> {
        let Some(strand) = self.get(id) else {
            return Err(StrandError::InvalidLayerName(id.to_string()));
        };
        log::info!("Deleting strand {}", strand.layer_name());

        let mut doomed: Vec<StrandId> = vec![id];
        doomed.extend(self.descendants(id));
        let mut masks = Vec::new();
        for &d in &doomed {
            for m in self.masks_of(d) {
                if !doomed.contains(&m) && !masks.contains(&m) {
                    masks.push(m);
                }
            }
        }
        doomed.extend(masks);

        // Remove from the back so reported indices stay valid one by one.
        let mut indexed: Vec<(usize, StrandId)> =
            doomed.iter().filter_map(|&d| self.index_of(d).map(|i| (i, d))).collect();
        indexed.sort_by(|a, b| b.0.cmp(&a.0));

        let mut removed_names = HashSet::new();
        for (index, d) in &indexed {
            self.order.remove(*index);
            if let Some(strand) = self.strands.remove(d) {
                removed_names.insert(strand.core.layer_name);
            }
            self.events.emit(CanvasEvent::StrandDeleted { index: *index });
        }

        let removed: HashSet<StrandId> = indexed.iter().map(|(_, d)| *d).collect();
        for strand in self.strands.values_mut() {
            strand.core.attached_strands.retain(|c| !removed.contains(c));
        }
        self.prune_groups(&removed_names);

        if self.selected.map(|s| removed.contains(&s)).unwrap_or(false) {
            self.selected = None;
            self.events.emit(CanvasEvent::DeselectAll);
        }
        if self.newest.map(|s| removed.contains(&s)).unwrap_or(false) {
            self.newest = self.order.last().copied();
        }
        self.finish_mutation();
        Ok(indexed.into_iter().map(|(_, d)| d).collect())
    }

    /// Move a layer to a new position in the stack.
    pub fn move_layer(&mut self, from: usize, to: usize) -> bool {
        if from >= self.order.len() || to >= self.order.len() || from == to {
            return false;
        }
        let id = self.order.remove(from);
        self.order.insert(to, id);
        self.finish_mutation();
        true
    }

    /// Remove everything: strands, groups and the selection.
    pub fn clear(&mut self) {
        self.strands.clear();
        self.order.clear();
        self.groups.clear();
        self.selected = None;
        self.newest = None;
        self.in_progress = None;
    }

    pub fn selected(&self) -> Option<StrandId> {
        self.selected
    }

    pub fn selected_strand(&self) -> Option<&Strand> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Select a strand, or clear the selection with `None`.
    pub fn select(&mut self, id: Option<StrandId>) {
        if id.is_none() && self.selected.is_some() {
            self.events.emit(CanvasEvent::DeselectAll);
        }
        self.selected = id.filter(|id| self.strands.contains_key(id));
        self.request_repaint();
    }

    pub fn newest(&self) -> Option<StrandId> {
        self.newest
    }

    pub fn set_shadow_enabled(&mut self, enabled: bool) {
        self.shadow_enabled = enabled;
        self.request_repaint();
    }

    pub fn set_show_control_points(&mut self, show: bool) {
        self.show_control_points = show;
        self.request_repaint();
    }

    pub fn set_lock_mode(&mut self, lock_mode: bool) {
        self.lock_mode = lock_mode;
        self.request_repaint();
    }

    /// Lock or unlock the layer at `index`.
    pub fn toggle_locked_layer(&mut self, index: usize) {
        if !self.locked_layers.remove(&index) {
            self.locked_layers.insert(index);
        }
    }

    /// Whether the strand may be edited under the current lock settings.
    pub fn is_editable(&self, id: StrandId) -> bool {
        if !self.lock_mode {
            return true;
        }
        self.index_of(id).map(|i| !self.locked_layers.contains(&i)).unwrap_or(false)
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Apply user settings, emitting theme/language changes.
    pub fn apply_settings(&mut self, settings: &UserSettings) {
        self.paint = PaintSettings::from(settings);
        if settings.theme != self.theme {
            self.theme = settings.theme.clone();
            self.events.emit(CanvasEvent::ThemeChanged(self.theme.clone()));
        }
        if settings.language != self.language {
            self.language = settings.language.clone();
            self.events.emit(CanvasEvent::LanguageChanged(self.language.clone()));
        }
        self.flush_events();
        self.request_repaint();
    }

    /// Strands whose body contains `point`, front to back.
    pub fn strands_at_point(&self, point: Point) -> Vec<StrandId> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.strands.get(id))
            .filter(|s| !s.core.visibility.is_hidden && s.body_contains(point))
            .map(Strand::id)
            .collect()
    }

    /// Bounding box of all strands.
    pub fn bounds(&self) -> Option<Rect> {
        self.strands().map(Strand::bounds).reduce(|a, b| a.union(b))
    }

    pub fn request_repaint(&mut self) {
        if !self.suppression.repaint {
            self.repaint_requested = true;
        }
    }

    /// Take the pending repaint request.
    pub fn take_repaint_request(&mut self) -> bool {
        std::mem::take(&mut self.repaint_requested)
    }

    /// Take the pending layer panel refresh.
    pub fn take_layer_panel_refresh(&mut self) -> bool {
        std::mem::take(&mut self.layer_panel_dirty)
    }

    pub fn suppression(&self) -> Suppression {
        self.suppression
    }

    /// Raise all suppression flags before applying a snapshot.
    pub fn begin_bulk_update(&mut self) {
        self.suppression.attachment_updates = true;
        self.suppression.repaint = true;
        self.suppression.layer_panel_refresh = true;
    }

    /// Clear the flags in reverse order and issue one refresh.
    pub fn end_bulk_update(&mut self) {
        self.suppression.layer_panel_refresh = false;
        self.suppression.repaint = false;
        self.suppression.attachment_updates = false;
        self.finish_mutation();
    }

    /// Recompute every masked strand from its components.
    pub fn refresh_masks(&mut self) {
        let mask_ids: Vec<StrandId> = self.strands().filter(|s| s.is_masked()).map(Strand::id).collect();
        for id in mask_ids {
            let Some(mut masked) = self.strands.remove(&id) else {
                continue;
            };
            if let Some((a, b)) = masked.mask_components() {
                if let (Some(first), Some(second)) = (self.strands.get(&a), self.strands.get(&b)) {
                    let spine = first.core.spine;
                    if let Some(mask) = masked.mask_mut() {
                        mask.recompute(first, second, self.region_ops.as_ref());
                    }
                    masked.core.spine = spine;
                    masked.core.sync_polar();
                    masked.update_shape();
                }
            }
            self.strands.insert(id, masked);
        }
    }

    /// Run `f` on the mask data of a masked strand with the region backend.
    pub(crate) fn with_mask_data<R>(
        &mut self,
        id: StrandId,
        f: impl FnOnce(&mut crate::mask::MaskData, &dyn RegionOps) -> R,
    ) -> Option<R> {
        let ops = self.region_ops.as_ref();
        self.strands.get_mut(&id)?.mask_mut().map(|data| f(data, ops))
    }

    /// Names of masked strands whose components no longer overlap.
    pub fn masks_without_intersection(&self) -> Vec<String> {
        self.strands()
            .filter_map(|s| s.mask().map(|m| (s, m)))
            .filter(|(_, m)| !m.has_intersection(self.region_ops()))
            .map(|(s, _)| s.layer_name().to_string())
            .collect()
    }

    /// Refresh derived state after a batch of changes and deliver events.
    ///
    /// While attachment updates are suppressed only the repaint request is
    /// recorded; [`Canvas::end_bulk_update`] runs the full refresh.
    pub fn finish_mutation(&mut self) {
        if self.suppression.attachment_updates {
            return;
        }
        self.refresh_masks();
        self.refresh_layer_state();
        self.flush_events();
        if !self.suppression.layer_panel_refresh {
            self.layer_panel_dirty = true;
        }
        self.request_repaint();
    }

    /// Rebuild the layer state and reconcile endpoint discs.
    pub fn refresh_layer_state(&mut self) {
        let selected = self.selected_strand().map(|s| s.layer_name().to_string());
        let newest = self.newest.and_then(|id| self.get(id)).map(|s| s.layer_name().to_string());
        let state = LayerState::compute(self.strands(), selected.as_deref(), newest.as_deref());
        for strand in self.strands.values_mut() {
            state.reconcile_circles(strand);
        }
        self.layer_state = state;
    }

    /// Deliver queued events to listeners.
    pub fn flush_events(&mut self) {
        self.events.flush();
    }

    /// Endpoint of a strand.
    pub fn endpoint(&self, id: StrandId, end: End) -> Option<Point> {
        self.get(id).map(|s| s.endpoint(end))
    }

    /// Replace every strand at once without per-strand events (used when
    /// loading). Child lists are rebuilt from the parent links.
    pub(crate) fn replace_strands(&mut self, strands: Vec<Strand>) {
        self.strands.clear();
        self.order.clear();
        self.in_progress = None;
        self.selected = None;
        for strand in strands {
            self.order.push(strand.id());
            self.strands.insert(strand.id(), strand);
        }
        let links: Vec<(StrandId, StrandId)> =
            self.strands().filter_map(|s| s.parent().map(|(p, _)| (p, s.id()))).collect();
        for strand in self.strands.values_mut() {
            strand.core.attached_strands.clear();
        }
        for (parent, child) in links {
            if let Some(parent) = self.strands.get_mut(&parent) {
                parent.core.attached_strands.push(child);
            }
        }
        self.newest = self.order.last().copied();
    }

    /// Mark a strand as the newest one (used when loading).
    pub(crate) fn set_newest(&mut self, id: Option<StrandId>) {
        self.newest = id;
    }

    /// Select without emitting events (used when loading).
    pub(crate) fn set_selected_silently(&mut self, id: Option<StrandId>) {
        self.selected = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn line(name: &str, set: i32, y: f64) -> Strand {
        Strand::straight(name, set, Point::new(0.0, y), Point::new(100.0, y))
    }

    #[test]
    fn test_add_rejects_invalid_and_duplicate_names() {
        let mut canvas = Canvas::new();
        assert!(canvas.add_strand(line("1_1", 1, 0.0)).is_ok());
        assert!(matches!(
            canvas.add_strand(line("1_1", 1, 50.0)),
            Err(StrandError::DuplicateLayerName(_))
        ));
        assert!(matches!(
            canvas.add_strand(line("oops", 1, 50.0)),
            Err(StrandError::InvalidLayerName(_))
        ));
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_add_rejects_name_from_another_set() {
        let mut canvas = Canvas::new();
        let main = canvas.add_strand(line("1_1", 1, 0.0)).unwrap();
        let parent = canvas.get(main).unwrap().clone();
        assert!(matches!(
            canvas.add_strand(Strand::attached_to("2_2", &parent, End::End)),
            Err(StrandError::InvalidLayerName(_))
        ));
        assert!(canvas.add_strand(Strand::attached_to("1_2", &parent, End::End)).is_ok());
        assert_eq!(canvas.len(), 2);
        assert_eq!(canvas.get(main).unwrap().core.attached_strands.len(), 1);
    }

    #[test]
    fn test_create_new_strand_picks_next_set() {
        let mut canvas = Canvas::new();
        let first = canvas.create_new_strand(None, Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let second = canvas.create_new_strand(None, Point::new(0.0, 200.0), Point::new(100.0, 200.0)).unwrap();
        assert_eq!(canvas.get(first).unwrap().layer_name(), "1_1");
        assert_eq!(canvas.get(second).unwrap().layer_name(), "2_1");
        assert_eq!(canvas.selected(), Some(second));
        assert_ne!(canvas.get(first).unwrap().core.color, canvas.get(second).unwrap().core.color);
    }

    #[test]
    fn test_delete_cascades_to_descendants_and_masks() {
        let mut canvas = Canvas::new();
        let main = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let child = canvas.attach_child(main, End::End).unwrap();
        canvas.get_mut(child).unwrap().update(Point::new(200.0, 0.0), true);
        let other = canvas.create_new_strand(Some(2), Point::new(150.0, -50.0), Point::new(150.0, 50.0)).unwrap();
        canvas.create_mask(child, other).unwrap();
        assert_eq!(canvas.len(), 4);

        let deleted = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&deleted);
        canvas.events().subscribe(move |e| {
            if let CanvasEvent::StrandDeleted { index } = e {
                sink.borrow_mut().push(*index);
            }
        });

        let removed = canvas.delete_strand(main).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(canvas.len(), 1);
        assert_eq!(canvas.strand_ids(), &[other]);
        assert_eq!(*deleted.borrow(), vec![3, 1, 0]);
    }

    #[test]
    fn test_move_layer() {
        let mut canvas = Canvas::new();
        let a = canvas.add_strand(line("1_1", 1, 0.0)).unwrap();
        let b = canvas.add_strand(line("2_1", 2, 50.0)).unwrap();
        assert!(canvas.move_layer(1, 0));
        assert_eq!(canvas.strand_ids(), &[b, a]);
        assert!(!canvas.move_layer(0, 5));
    }

    #[test]
    fn test_strands_at_point_front_to_back() {
        let mut canvas = Canvas::new();
        let a = canvas.add_strand(line("1_1", 1, 0.0)).unwrap();
        let b = canvas.add_strand(line("2_1", 2, 10.0)).unwrap();
        assert_eq!(canvas.strands_at_point(Point::new(50.0, 5.0)), vec![b, a]);
        assert!(canvas.strands_at_point(Point::new(50.0, 200.0)).is_empty());
    }

    #[test]
    fn test_apply_settings_emits_theme_and_language() {
        let mut canvas = Canvas::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        canvas.events().subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let mut settings = UserSettings::default();
        settings.theme = "dark".to_string();
        settings.language = "fr".to_string();
        canvas.apply_settings(&settings);
        canvas.apply_settings(&settings);

        assert_eq!(
            *seen.borrow(),
            vec![
                CanvasEvent::ThemeChanged("dark".to_string()),
                CanvasEvent::LanguageChanged("fr".to_string()),
            ]
        );
    }

    #[test]
    fn test_bulk_update_defers_refresh() {
        let mut canvas = Canvas::new();
        canvas.take_repaint_request();
        canvas.begin_bulk_update();
        canvas.add_strand(line("1_1", 1, 0.0)).unwrap();
        canvas.finish_mutation();
        assert!(!canvas.take_repaint_request());
        assert!(canvas.layer_state().order.is_empty());
        canvas.end_bulk_update();
        assert!(canvas.take_repaint_request());
        assert_eq!(canvas.layer_state().order, vec!["1_1"]);
    }

    #[test]
    fn test_lock_mode_filters_editable() {
        let mut canvas = Canvas::new();
        let a = canvas.add_strand(line("1_1", 1, 0.0)).unwrap();
        canvas.toggle_locked_layer(0);
        assert!(canvas.is_editable(a));
        canvas.set_lock_mode(true);
        assert!(!canvas.is_editable(a));
        canvas.toggle_locked_layer(0);
        assert!(canvas.is_editable(a));
    }
}
