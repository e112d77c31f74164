// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Geometry model: paths, marks, selection and their visuals.
//!
//! Each surface owns one [`GeometryModel`]. Paths and marks live in registries
//! keyed by their collection key; visuals are created through the surface's
//! [`Renderer`] and mapped back to tags through a handle table, so hit tests
//! and renderer callbacks only ever deal in tags.
//!
//! Public mutating operations are guarded by the surface's [`EditMask`]. A
//! disallowed or degenerate operation is a silent no-op, never an error.

mod mark;
mod path;

pub use mark::Mark;
pub use path::Path;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use log::{debug, info};

use crate::config::EditorConfig;
use crate::geo::{east_of, haversine_m, GeoBounds, Location, Projection, ScreenPos};
use crate::handles::{place_handle, HandleSide};
use crate::render::{Layer, Renderer, VisualKind};
use crate::tag::{Tag, TagKind};
use path::{side_index, EditHandle};

/// Number of distinct path colors.
pub const PALETTE_SIZE: usize = 8;

/// Smallest ring a handle drag can shrink a ring to.
const MIN_RING_RADIUS_M: f64 = 1.0;

const METERS_PER_DEGREE_LAT: f64 = 111_195.0;

/// The set of kinds a surface's user may mutate.
///
/// Edit handles are never listed: a handle is editable when its owning path or
/// mark is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditMask {
    kinds: HashSet<TagKind>,
}

impl EditMask {
    /// Every path and mark kind.
    #[must_use]
    pub fn all() -> Self {
        Self::only(
            TagKind::ALL
                .into_iter()
                .filter(|k| k.is_mark() || *k == TagKind::NavPoint),
        )
    }

    /// Nothing is editable.
    #[must_use]
    pub fn read_only() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn only<I: IntoIterator<Item = TagKind>>(kinds: I) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn allows(&self, kind: TagKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Result of [`GeometryModel::move_point`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Nothing changed (unknown tag, not editable, or missing target).
    Ignored,
    /// The addressed element was relocated.
    Moved(Tag),
    /// A path edit handle was dragged and a new point inserted; the tag is the
    /// new point, which is now selected.
    Inserted(Tag),
}

/// Full state of a path, as carried by structural path verbs.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSnapshot {
    pub kind: TagKind,
    pub locations: Vec<Location>,
    pub color_index: usize,
}

/// Full state of a mark, as carried by mark verbs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkSnapshot {
    pub kind: TagKind,
    pub location: Location,
    pub ring_radius_m: f64,
}

#[derive(Debug, Clone, Copy)]
struct PendingReveal {
    serial: u64,
    due: Instant,
}

/// Authoritative geometry for one surface.
pub struct GeometryModel<R: Renderer> {
    renderer: R,
    mask: EditMask,
    config: EditorConfig,
    paths: HashMap<String, Path<R::Handle>>,
    marks: HashMap<String, Mark<R::Handle>>,
    tags: HashMap<R::Handle, Tag>,
    selection: Option<Tag>,
    selection_visual: R::Handle,
    viewport_boundary: Option<R::Handle>,
    pending_reveal: Option<PendingReveal>,
    reveal_serial: u64,
    next_color: usize,
}

impl<R: Renderer> std::fmt::Debug for GeometryModel<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryModel")
            .field("paths", &self.paths.len())
            .field("marks", &self.marks.len())
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> GeometryModel<R> {
    #[must_use]
    pub fn new(mut renderer: R, mask: EditMask, config: EditorConfig) -> Self {
        let selection_visual = renderer.create_visual(VisualKind::Selection);
        renderer.set_z_order(selection_visual, Layer::Selection);
        renderer.set_visibility(selection_visual, false);

        Self {
            renderer,
            mask,
            config,
            paths: HashMap::new(),
            marks: HashMap::new(),
            tags: HashMap::new(),
            selection: None,
            selection_visual,
            viewport_boundary: None,
            pending_reveal: None,
            reveal_serial: 0,
            next_color: 0,
        }
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub fn mask(&self) -> &EditMask {
        &self.mask
    }

    pub fn set_mask(&mut self, mask: EditMask) {
        self.mask = mask;
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn selection(&self) -> Option<&Tag> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn path(&self, key: &str) -> Option<&Path<R::Handle>> {
        self.paths.get(key)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path<R::Handle>> {
        self.paths.values()
    }

    #[must_use]
    pub fn mark(&self, key: &str) -> Option<&Mark<R::Handle>> {
        self.marks.get(key)
    }

    pub fn marks(&self) -> impl Iterator<Item = &Mark<R::Handle>> {
        self.marks.values()
    }

    /// Tag attached to a renderer handle; Unknown for anything not interactive.
    #[must_use]
    pub fn tag_for(&self, handle: R::Handle) -> Tag {
        self.tags.get(&handle).cloned().unwrap_or_default()
    }

    /// Tags of a path's rendered points, in list order.
    #[must_use]
    pub fn point_tags(&self, key: &str) -> Vec<Tag> {
        self.paths
            .get(key)
            .map(|path| path.points.iter().map(|h| self.tag_for(*h)).collect())
            .unwrap_or_default()
    }

    /// Current location of the element a tag addresses.
    #[must_use]
    pub fn location_of(&self, tag: &Tag) -> Option<Location> {
        let key = tag.key()?;
        match tag.kind() {
            TagKind::NavPoint => {
                let path = self.paths.get(key)?;
                path.locations.get(tag.index()?).copied()
            }
            TagKind::PathEditHandle => {
                let path = self.paths.get(key)?;
                path.handles
                    .iter()
                    .filter(|h| h.visible)
                    .find(|h| self.tags.get(&h.visual) == Some(tag))
                    .and_then(|h| h.location)
            }
            TagKind::RingEditHandle => self.marks.get(key)?.handle.as_ref()?.location,
            kind if kind.is_mark() => self
                .marks
                .get(key)
                .filter(|m| m.kind == kind)
                .map(|m| m.location),
            _ => None,
        }
    }

    #[must_use]
    pub fn path_snapshot(&self, key: &str) -> Option<PathSnapshot> {
        self.paths.get(key).map(|path| PathSnapshot {
            kind: path.kind,
            locations: path.locations.clone(),
            color_index: path.color_index,
        })
    }

    #[must_use]
    pub fn mark_snapshot(&self, key: &str) -> Option<MarkSnapshot> {
        self.marks.get(key).map(|mark| MarkSnapshot {
            kind: mark.kind,
            location: mark.location,
            ring_radius_m: mark.ring_radius_m,
        })
    }

    fn create(&mut self, kind: VisualKind) -> R::Handle {
        let handle = self.renderer.create_visual(kind);
        self.renderer.set_z_order(handle, Layer::for_visual(kind));
        handle
    }

    fn create_hidden(&mut self, kind: VisualKind) -> R::Handle {
        let handle = self.create(kind);
        self.renderer.set_visibility(handle, false);
        handle
    }

    fn discard(&mut self, handle: R::Handle) {
        self.tags.remove(&handle);
        self.renderer.remove_visual(handle);
    }

    /// Kind whose editability governs the tag: the owner's kind for handles.
    fn owner_kind(&self, tag: &Tag) -> Option<TagKind> {
        let key = tag.key()?;
        match tag.kind() {
            TagKind::PathEditHandle => self.paths.get(key).map(|p| p.kind),
            TagKind::RingEditHandle => self.marks.get(key).map(|m| m.kind),
            TagKind::Unknown => None,
            kind => Some(kind),
        }
    }

    /// Whether this surface's user may mutate the tagged element.
    #[must_use]
    pub fn is_editable(&self, tag: &Tag) -> bool {
        self.owner_kind(tag).is_some_and(|kind| self.mask.allows(kind))
    }

    fn guard(&self, tag: &Tag, op: &str) -> bool {
        let editable = self.is_editable(tag);
        if !editable && tag.is_known() {
            debug!("Ignoring {op} of {tag}: not editable on this surface");
        }
        editable
    }

    // ----------------------------------------------------------------------
    // Paths
    // ----------------------------------------------------------------------

    /// Create a path with one point per location, numbered `1..=N`.
    ///
    /// Re-adding an existing key replaces its points and keeps its color.
    pub fn add_path(&mut self, kind: TagKind, key: &str, locations: &[Location]) -> bool {
        if kind != TagKind::NavPoint || !self.guard(&Tag::path(key), "add") {
            return false;
        }
        let snapshot = PathSnapshot {
            kind,
            locations: locations.to_vec(),
            color_index: self.next_color % PALETTE_SIZE,
        };
        self.put_path(key, &snapshot);
        true
    }

    /// Create or overwrite a path from a snapshot, bypassing the mask.
    pub(crate) fn put_path(&mut self, key: &str, snapshot: &PathSnapshot) {
        if !self.paths.contains_key(key) {
            let color_index = snapshot.color_index % PALETTE_SIZE;
            self.next_color += 1;

            let line = self.create(VisualKind::PathLine { color_index });
            let negative = self.create_hidden(VisualKind::PathEditHandle);
            let positive = self.create_hidden(VisualKind::PathEditHandle);
            self.paths.insert(
                key.to_string(),
                Path {
                    key: key.to_string(),
                    kind: snapshot.kind,
                    color_index,
                    locations: Vec::new(),
                    points: Vec::new(),
                    line,
                    handles: [EditHandle::new(negative), EditHandle::new(positive)],
                },
            );
            info!(
                "Added path {key} with {} points (color {color_index})",
                snapshot.locations.len()
            );
        } else {
            self.recolor_path(key, snapshot.color_index % PALETTE_SIZE);
        }
        self.sync_path(key, &snapshot.locations);
    }

    /// Adopt a mirrored color. Line and point visuals are recreated; the
    /// caller's `sync_path` rebuilds the points.
    fn recolor_path(&mut self, key: &str, color_index: usize) {
        let Some(path) = self.paths.get_mut(key) else {
            return;
        };
        if path.color_index == color_index {
            return;
        }
        path.color_index = color_index;
        let old_line = path.line;
        let old_points = std::mem::take(&mut path.points);

        let line = self.create(VisualKind::PathLine { color_index });
        if let Some(path) = self.paths.get_mut(key) {
            path.line = line;
        }
        self.discard(old_line);
        for handle in old_points {
            self.discard(handle);
        }
        debug!("Path {key} now uses color {color_index}");
    }

    /// Make a path's points match `locations`, renumbering every point.
    pub(crate) fn sync_path(&mut self, key: &str, locations: &[Location]) {
        let Some(path) = self.paths.get_mut(key) else {
            return;
        };
        let point_kind = VisualKind::PathPoint {
            kind: path.kind,
            color_index: path.color_index,
        };

        while path.points.len() > locations.len() {
            if let Some(handle) = path.points.pop() {
                self.tags.remove(&handle);
                self.renderer.remove_visual(handle);
            }
        }
        while path.points.len() < locations.len() {
            let handle = self.renderer.create_visual(point_kind);
            self.renderer.set_z_order(handle, Layer::for_visual(point_kind));
            path.points.push(handle);
        }

        path.locations = locations.to_vec();
        for (i, (handle, location)) in path.points.iter().zip(&path.locations).enumerate() {
            self.tags.insert(*handle, Tag::nav_point(key, i + 1));
            self.renderer.set_location(*handle, *location);
        }
        self.renderer.set_polyline(path.line, &path.locations);

        self.hide_path_handles(key);
        self.update_selection_visual();
    }

    /// Insert a point at a 1-based position (`1..=len + 1`).
    pub fn insert_point(&mut self, key: &str, position: usize, location: Location) -> Option<Tag> {
        if !self.guard(&Tag::path(key), "insert") {
            return None;
        }
        self.insert_point_unchecked(key, position, location)
    }

    fn insert_point_unchecked(&mut self, key: &str, position: usize, location: Location) -> Option<Tag> {
        let path = self.paths.get_mut(key)?;
        if position == 0 || position > path.locations.len() + 1 {
            debug!("Ignoring insert into {key} at position {position}: out of range");
            return None;
        }
        let index = position - 1;
        let point_kind = VisualKind::PathPoint {
            kind: path.kind,
            color_index: path.color_index,
        };

        let handle = self.renderer.create_visual(point_kind);
        self.renderer.set_z_order(handle, Layer::for_visual(point_kind));
        self.renderer.set_location(handle, location);
        path.locations.insert(index, location);
        path.points.insert(index, handle);

        for (i, handle) in path.points.iter().enumerate().skip(index) {
            self.tags.insert(*handle, Tag::nav_point(key, i + 1));
        }
        self.renderer.set_polyline(path.line, &path.locations);

        if let Some(selected) = self.selected_point(key) {
            if selected >= position {
                self.selection = Some(Tag::nav_point(key, selected + 1));
            }
        }
        self.hide_path_handles(key);
        self.update_selection_visual();

        Some(Tag::nav_point(key, position))
    }

    fn remove_point(&mut self, key: &str, position: usize) -> bool {
        let Some(path) = self.paths.get_mut(key) else {
            return false;
        };
        if position == 0 || position > path.locations.len() {
            return false;
        }
        let index = position - 1;

        path.locations.remove(index);
        let handle = path.points.remove(index);
        self.tags.remove(&handle);
        self.renderer.remove_visual(handle);

        for (i, handle) in path.points.iter().enumerate().skip(index) {
            self.tags.insert(*handle, Tag::nav_point(key, i + 1));
        }
        self.renderer.set_polyline(path.line, &path.locations);

        if let Some(selected) = self.selected_point(key) {
            if selected == position {
                self.clear_selection();
            } else if selected > position {
                self.selection = Some(Tag::nav_point(key, selected - 1));
            }
        }
        self.hide_path_handles(key);
        self.update_selection_visual();
        true
    }

    /// Delete one point of a path; absent points are ignored.
    pub fn delete_point(&mut self, tag: &Tag) -> bool {
        if tag.kind() != TagKind::NavPoint || !self.guard(tag, "delete") {
            return false;
        }
        match (tag.key(), tag.position()) {
            (Some(key), Some(position)) => self.remove_point(key, position),
            _ => false,
        }
    }

    /// Delete a whole path.
    pub fn delete_path(&mut self, key: &str) -> bool {
        self.guard(&Tag::path(key), "delete") && self.remove_path(key)
    }

    pub(crate) fn remove_path(&mut self, key: &str) -> bool {
        if self.selected_point(key).is_some() {
            self.clear_selection();
        }
        let Some(path) = self.paths.remove(key) else {
            return false;
        };
        for handle in path.points {
            self.discard(handle);
        }
        self.discard(path.line);
        for handle in path.handles {
            self.discard(handle.visual);
        }
        info!("Removed path {key}");
        true
    }

    pub(crate) fn relocate_point(&mut self, key: &str, position: usize, location: Location) -> bool {
        let Some(path) = self.paths.get_mut(key) else {
            return false;
        };
        let Some(index) = position.checked_sub(1).filter(|i| *i < path.locations.len()) else {
            return false;
        };
        path.locations[index] = location;
        self.renderer.set_location(path.points[index], location);
        self.renderer.set_polyline(path.line, &path.locations);

        self.hide_path_handles(key);
        self.update_selection_visual();
        true
    }

    fn selected_point(&self, key: &str) -> Option<usize> {
        let selected = self.selection.as_ref()?;
        (selected.kind() == TagKind::NavPoint && selected.key() == Some(key))
            .then(|| selected.position())
            .flatten()
    }

    fn hide_path_handles(&mut self, key: &str) {
        let Some(path) = self.paths.get_mut(key) else {
            return;
        };
        for handle in &mut path.handles {
            if handle.visible {
                handle.visible = false;
                self.renderer.set_visibility(handle.visual, false);
            }
        }
        if self.selected_point(key).is_some() {
            self.cancel_reveal();
        }
    }

    // ----------------------------------------------------------------------
    // Marks
    // ----------------------------------------------------------------------

    /// Create a mark; a positive `ring_radius_m` adds a ring (and, for editable
    /// kinds, a hidden ring edit handle).
    pub fn add_mark(
        &mut self,
        kind: TagKind,
        key: &str,
        location: Location,
        ring_radius_m: f64,
    ) -> bool {
        if !kind.is_mark() || !self.guard(&Tag::mark(kind, key), "add") {
            return false;
        }
        self.put_mark(
            key,
            &MarkSnapshot {
                kind,
                location,
                ring_radius_m,
            },
        );
        true
    }

    /// Create or overwrite a mark from a snapshot, bypassing the mask.
    pub(crate) fn put_mark(&mut self, key: &str, snapshot: &MarkSnapshot) {
        if self.marks.get(key).is_some_and(|m| m.kind != snapshot.kind) {
            self.remove_mark(key);
        }
        if !self.marks.contains_key(key) {
            let visual = self.create(VisualKind::Marker(snapshot.kind));
            self.tags.insert(visual, Tag::mark(snapshot.kind, key));
            self.marks.insert(
                key.to_string(),
                Mark {
                    key: key.to_string(),
                    kind: snapshot.kind,
                    location: snapshot.location,
                    ring_radius_m: 0.0,
                    visual,
                    ring: None,
                    handle: None,
                },
            );
            debug!("Added {} mark {key}", snapshot.kind);
        }
        self.relocate_mark(key, snapshot.location);
        self.set_ring_radius(key, snapshot.ring_radius_m);
    }

    /// Delete a mark; absent marks are ignored.
    pub fn delete_mark(&mut self, tag: &Tag) -> bool {
        if !tag.kind().is_mark() || !self.guard(tag, "delete") {
            return false;
        }
        match tag.key() {
            Some(key) if self.marks.get(key).is_some_and(|m| m.kind == tag.kind()) => {
                self.remove_mark(key)
            }
            _ => false,
        }
    }

    pub(crate) fn remove_mark(&mut self, key: &str) -> bool {
        if self.selection.as_ref().is_some_and(|s| s.kind().is_mark() && s.key() == Some(key)) {
            self.clear_selection();
        }
        let Some(mark) = self.marks.remove(key) else {
            return false;
        };
        self.discard(mark.visual);
        if let Some(ring) = mark.ring {
            self.discard(ring);
        }
        if let Some(handle) = mark.handle {
            self.discard(handle.visual);
        }
        debug!("Removed mark {key}");
        true
    }

    pub(crate) fn relocate_mark(&mut self, key: &str, location: Location) -> bool {
        let Some(mark) = self.marks.get_mut(key) else {
            return false;
        };
        mark.location = location;
        self.renderer.set_location(mark.visual, location);
        if let Some(ring) = mark.ring {
            self.renderer.set_location(ring, location);
        }
        if let Some(handle) = mark.handle.as_mut() {
            let edge = east_of(location, mark.ring_radius_m);
            handle.location = Some(edge);
            handle.visible = false;
            self.renderer.set_location(handle.visual, edge);
            self.renderer.set_visibility(handle.visual, false);
        }
        if self.selection.as_ref().is_some_and(|s| s.key() == Some(key) && s.kind().is_mark()) {
            self.cancel_reveal();
        }
        self.update_selection_visual();
        true
    }

    /// Set a ring radius, creating or removing the ring and its handle.
    pub(crate) fn set_ring_radius(&mut self, key: &str, radius_m: f64) {
        let Some(kind) = self.marks.get(key).map(|m| m.kind) else {
            return;
        };
        let editable = self.mask.allows(kind);
        let radius_m = if radius_m.is_finite() { radius_m.max(0.0) } else { 0.0 };

        if radius_m > 0.0 {
            let needs_ring = self.marks.get(key).is_some_and(|m| m.ring.is_none());
            if needs_ring {
                let ring = self.create(VisualKind::Ring);
                if let Some(mark) = self.marks.get_mut(key) {
                    mark.ring = Some(ring);
                }
            }
            let needs_handle = editable && self.marks.get(key).is_some_and(|m| m.handle.is_none());
            if needs_handle {
                let visual = self.create_hidden(VisualKind::RingEditHandle);
                self.tags.insert(visual, Tag::ring_handle(key));
                if let Some(mark) = self.marks.get_mut(key) {
                    mark.handle = Some(EditHandle::new(visual));
                }
            }
        } else if let Some(mark) = self.marks.get_mut(key) {
            let ring = mark.ring.take();
            let handle = mark.handle.take();
            if let Some(ring) = ring {
                self.discard(ring);
            }
            if let Some(handle) = handle {
                self.discard(handle.visual);
            }
        }

        let Some(mark) = self.marks.get_mut(key) else {
            return;
        };
        mark.ring_radius_m = radius_m;
        if let Some(ring) = mark.ring {
            self.renderer.set_location(ring, mark.location);
            self.renderer.set_radius(ring, radius_m);
        }
        if let Some(handle) = mark.handle.as_mut() {
            let edge = east_of(mark.location, radius_m);
            handle.location = Some(edge);
            self.renderer.set_location(handle.visual, edge);
        }
    }

    /// Resize a ring so it passes through `location`; the handle follows.
    fn drag_ring_handle(&mut self, key: &str, location: Location) -> bool {
        let Some(center) = self.marks.get(key).map(|m| m.location) else {
            return false;
        };
        self.set_ring_radius(key, haversine_m(center, location).max(MIN_RING_RADIUS_M));
        if let Some(handle) = self.marks.get_mut(key).and_then(|m| m.handle.as_mut()) {
            handle.location = Some(location);
            self.renderer.set_location(handle.visual, location);
        }
        true
    }

    // ----------------------------------------------------------------------
    // Editing
    // ----------------------------------------------------------------------

    /// Move the element addressed by `tag`.
    ///
    /// Route points move in place and hide their path's edit handles. Dragging
    /// a path edit handle inserts a new point at the handle's position instead
    /// and selects it. Dragging a ring handle resizes the ring. Marks move with
    /// their ring.
    pub fn move_point(&mut self, tag: &Tag, location: Location) -> MoveOutcome {
        if !self.guard(tag, "move") {
            return MoveOutcome::Ignored;
        }
        let Some(key) = tag.key() else {
            return MoveOutcome::Ignored;
        };

        let moved = match tag.kind() {
            TagKind::NavPoint => tag
                .position()
                .is_some_and(|p| self.relocate_point(key, p, location)),
            TagKind::PathEditHandle => {
                let Some(position) = tag.position() else {
                    return MoveOutcome::Ignored;
                };
                return match self.insert_point_unchecked(key, position, location) {
                    Some(point) => {
                        self.selection = Some(point.clone());
                        self.cancel_reveal();
                        self.update_selection_visual();
                        MoveOutcome::Inserted(point)
                    }
                    None => MoveOutcome::Ignored,
                };
            }
            TagKind::RingEditHandle => self.drag_ring_handle(key, location),
            kind if kind.is_mark() => {
                self.marks.get(key).is_some_and(|m| m.kind == kind)
                    && self.relocate_mark(key, location)
            }
            _ => false,
        };

        if moved {
            MoveOutcome::Moved(tag.clone())
        } else {
            MoveOutcome::Ignored
        }
    }

    /// Delete whatever `tag` addresses: a point, a whole path, or a mark.
    pub fn delete(&mut self, tag: &Tag) -> bool {
        match tag.kind() {
            TagKind::NavPoint if tag.position().is_some() => self.delete_point(tag),
            TagKind::NavPoint => tag.key().is_some_and(|key| self.delete_path(key)),
            kind if kind.is_mark() => self.delete_mark(tag),
            _ => false,
        }
    }

    /// Remove every path. Returns the removed keys.
    pub fn clear_paths(&mut self) -> Vec<String> {
        self.clear_selection();
        if !self.mask.allows(TagKind::NavPoint) {
            return Vec::new();
        }
        let keys: Vec<String> = self.paths.keys().cloned().collect();
        for key in &keys {
            self.remove_path(key);
        }
        keys
    }

    /// Remove every editable mark whose kind passes `filter`. Returns their tags.
    pub fn clear_marks<F>(&mut self, filter: F) -> Vec<Tag>
    where
        F: Fn(TagKind) -> bool,
    {
        self.clear_selection();
        let doomed: Vec<Tag> = self
            .marks
            .values()
            .filter(|m| filter(m.kind) && self.mask.allows(m.kind))
            .map(|m| Tag::mark(m.kind, &m.key))
            .collect();
        for tag in &doomed {
            if let Some(key) = tag.key() {
                self.remove_mark(key);
            }
        }
        doomed
    }

    // ----------------------------------------------------------------------
    // Selection and edit handles
    // ----------------------------------------------------------------------

    /// Select the element addressed by `tag`; Unknown deselects.
    ///
    /// Edit handles are not selectable. Returns whether the selection changed.
    pub fn select(&mut self, tag: &Tag, now: Instant) -> bool {
        if tag.kind().is_edit_handle() {
            return false;
        }
        let next = Some(tag.clone()).filter(|t| self.location_of(t).is_some());
        if next == self.selection {
            return false;
        }

        self.hide_selection_handles();
        self.selection = next;
        self.update_selection_visual();
        if self.selection.is_some() {
            self.schedule_reveal(now);
        } else {
            self.cancel_reveal();
        }
        true
    }

    /// Drop the selection. Returns whether anything was selected.
    pub fn clear_selection(&mut self) -> bool {
        if self.selection.is_none() {
            return false;
        }
        self.hide_selection_handles();
        self.selection = None;
        self.cancel_reveal();
        self.update_selection_visual();
        true
    }

    /// Re-arm the delayed handle reveal for the current selection.
    pub fn refresh_handles(&mut self, now: Instant) {
        if self.selection.is_some() {
            self.schedule_reveal(now);
        }
    }

    /// Run the delayed handle reveal if it is due. Returns whether handles
    /// were revealed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(pending) = self.pending_reveal else {
            return false;
        };
        if now < pending.due {
            return false;
        }
        self.pending_reveal = None;
        if pending.serial != self.reveal_serial {
            return false;
        }
        self.reveal_handles();
        true
    }

    /// When the pending handle reveal comes due, if one is still current.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_reveal
            .filter(|p| p.serial == self.reveal_serial)
            .map(|p| p.due)
    }

    fn schedule_reveal(&mut self, now: Instant) {
        self.reveal_serial += 1;
        self.pending_reveal = Some(PendingReveal {
            serial: self.reveal_serial,
            due: now + self.config.handle_reveal_delay(),
        });
    }

    fn cancel_reveal(&mut self) {
        self.reveal_serial += 1;
    }

    fn hide_selection_handles(&mut self) {
        let Some(selected) = self.selection.clone() else {
            return;
        };
        let Some(key) = selected.key() else {
            return;
        };
        if selected.kind() == TagKind::NavPoint {
            self.hide_path_handles(key);
        } else if let Some(handle) = self.marks.get_mut(key).and_then(|m| m.handle.as_mut()) {
            handle.visible = false;
            self.renderer.set_visibility(handle.visual, false);
        }
    }

    fn reveal_handles(&mut self) {
        let Some(selected) = self.selection.clone() else {
            return;
        };
        let Some(key) = selected.key() else {
            return;
        };

        match selected.kind() {
            TagKind::NavPoint => {
                let Some(index) = selected.index() else {
                    return;
                };
                let delta = self.config.handle_delta_deg;
                let Some(path) = self.paths.get_mut(key) else {
                    return;
                };
                if !self.mask.allows(path.kind) {
                    return;
                }
                for side in [HandleSide::Negative, HandleSide::Positive] {
                    let Some(location) = place_handle(&path.locations, index, side, delta) else {
                        continue;
                    };
                    let handle = &mut path.handles[side_index(side)];
                    handle.visible = true;
                    handle.location = Some(location);
                    self.tags
                        .insert(handle.visual, Tag::path_handle(key, side.insert_position(index)));
                    self.renderer.set_location(handle.visual, location);
                    self.renderer.set_visibility(handle.visual, true);
                }
            }
            kind if kind.is_mark() => {
                let Some(mark) = self.marks.get_mut(key) else {
                    return;
                };
                let edge = east_of(mark.location, mark.ring_radius_m);
                if let Some(handle) = mark.handle.as_mut() {
                    handle.visible = true;
                    handle.location = Some(edge);
                    self.renderer.set_location(handle.visual, edge);
                    self.renderer.set_visibility(handle.visual, true);
                }
            }
            _ => {}
        }
    }

    /// Keep the selection overlay on the selected element, dropping the
    /// selection if its element is gone.
    fn update_selection_visual(&mut self) {
        let location = self.selection.as_ref().and_then(|t| self.location_of(t));
        match location {
            Some(location) => {
                self.renderer.set_location(self.selection_visual, location);
                self.renderer.set_visibility(self.selection_visual, true);
            }
            None => {
                if let Some(stale) = self.selection.take() {
                    debug!("Selection {stale} no longer exists");
                }
                self.renderer.set_visibility(self.selection_visual, false);
            }
        }
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    /// Topmost visible interactive element within `radius_px` of `pos`.
    #[must_use]
    pub fn hit_test(&self, pos: ScreenPos, projection: &dyn Projection, radius_px: f64) -> Tag {
        let radius_sq = radius_px * radius_px;
        let mut best: Option<(Layer, f64, Tag)> = None;
        let mut consider = |layer: Layer, location: Location, tag: Tag| {
            let d = projection.project_to_screen(location).distance_sq(pos);
            if d > radius_sq {
                return;
            }
            let better = match &best {
                None => true,
                Some((l, bd, _)) => layer > *l || (layer == *l && d < *bd),
            };
            if better {
                best = Some((layer, d, tag));
            }
        };

        for path in self.paths.values() {
            for (i, location) in path.locations.iter().enumerate() {
                consider(Layer::PathPoint(path.kind), *location, Tag::nav_point(&path.key, i + 1));
            }
            for handle in path.handles.iter().filter(|h| h.visible) {
                if let (Some(location), Some(tag)) = (handle.location, self.tags.get(&handle.visual)) {
                    consider(Layer::PathEditHandle, location, tag.clone());
                }
            }
        }
        for mark in self.marks.values() {
            consider(Layer::Marker(mark.kind), mark.location, Tag::mark(mark.kind, &mark.key));
            if let Some(handle) = mark.handle.as_ref().filter(|h| h.visible) {
                if let Some(location) = handle.location {
                    consider(Layer::RingEditHandle, location, Tag::ring_handle(&mark.key));
                }
            }
        }

        best.map(|(_, _, tag)| tag).unwrap_or_default()
    }

    /// Bounding box of every point, mark and ring.
    #[must_use]
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut locations: Vec<Location> = self
            .paths
            .values()
            .flat_map(|p| p.locations.iter().copied())
            .collect();
        for mark in self.marks.values() {
            locations.push(mark.location);
            if mark.ring_radius_m > 0.0 {
                let d_lon = east_of(mark.location, mark.ring_radius_m).lon - mark.location.lon;
                let d_lat = mark.ring_radius_m / METERS_PER_DEGREE_LAT;
                locations.push(Location::new(mark.location.lat - d_lat, mark.location.lon - d_lon));
                locations.push(Location::new(mark.location.lat + d_lat, mark.location.lon + d_lon));
            }
        }
        GeoBounds::from_locations(locations)
    }

    /// Show (or hide, with `None`) the outline of another view's viewport.
    pub fn set_viewport_boundary(&mut self, corners: Option<[Location; 4]>) {
        match corners {
            Some(corners) => {
                let handle = match self.viewport_boundary {
                    Some(handle) => handle,
                    None => {
                        let handle = self.create(VisualKind::ViewportBoundary);
                        self.viewport_boundary = Some(handle);
                        handle
                    }
                };
                let mut outline = corners.to_vec();
                outline.push(corners[0]);
                self.renderer.set_polyline(handle, &outline);
                self.renderer.set_visibility(handle, true);
            }
            None => {
                if let Some(handle) = self.viewport_boundary {
                    self.renderer.set_visibility(handle, false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geo::WebMercatorView;
    use crate::render::Scene;

    fn model() -> GeometryModel<Scene> {
        GeometryModel::new(Scene::new(), EditMask::all(), EditorConfig::default())
    }

    fn route(model: &mut GeometryModel<Scene>) {
        assert!(model.add_path(
            TagKind::NavPoint,
            "R1",
            &[Location::new(10.0, 20.0), Location::new(10.0, 21.0)],
        ));
    }

    fn positions(model: &GeometryModel<Scene>, key: &str) -> Vec<usize> {
        model
            .point_tags(key)
            .iter()
            .map(|t| t.position().unwrap())
            .collect()
    }

    fn after_reveal(config: &EditorConfig, t0: Instant) -> Instant {
        t0 + config.handle_reveal_delay() + Duration::from_millis(1)
    }

    #[test]
    fn test_add_path_numbers_points() {
        let mut model = model();
        route(&mut model);
        assert_eq!(positions(&model, "R1"), vec![1, 2]);
        assert_eq!(model.path("R1").unwrap().len(), 2);
        assert_eq!(
            model
                .renderer()
                .count_visible(VisualKind::PathPoint { kind: TagKind::NavPoint, color_index: 0 }),
            2
        );
    }

    #[test]
    fn test_add_path_rejects_non_route_kind() {
        let mut model = model();
        assert!(!model.add_path(TagKind::UnitEnemy, "X", &[Location::new(1.0, 1.0)]));
        assert!(model.path("X").is_none());
    }

    #[test]
    fn test_renumbering_after_inserts_and_deletes() {
        let mut model = model();
        route(&mut model);
        model.insert_point("R1", 1, Location::new(9.0, 19.0));
        model.insert_point("R1", 3, Location::new(9.5, 20.5));
        model.insert_point("R1", 5, Location::new(11.0, 22.0));
        assert_eq!(positions(&model, "R1"), vec![1, 2, 3, 4, 5]);

        assert!(model.delete_point(&Tag::nav_point("R1", 2)));
        assert!(model.delete_point(&Tag::nav_point("R1", 4)));
        assert_eq!(positions(&model, "R1"), vec![1, 2, 3]);
        assert_eq!(
            model.path("R1").unwrap().locations(),
            &[
                Location::new(9.0, 19.0),
                Location::new(9.5, 20.5),
                Location::new(10.0, 21.0),
            ]
        );
    }

    #[test]
    fn test_insert_out_of_range_is_noop() {
        let mut model = model();
        route(&mut model);
        assert!(model.insert_point("R1", 0, Location::new(0.0, 0.0)).is_none());
        assert!(model.insert_point("R1", 4, Location::new(0.0, 0.0)).is_none());
        assert!(model.insert_point("nope", 1, Location::new(0.0, 0.0)).is_none());
        assert_eq!(model.path("R1").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut model = model();
        route(&mut model);
        model.add_mark(TagKind::UnitEnemy, "SA-2", Location::new(11.0, 21.0), 40_000.0);

        let mark = Tag::mark(TagKind::UnitEnemy, "SA-2");
        assert!(model.delete_mark(&mark));
        let visuals = model.renderer().len();
        assert!(!model.delete_mark(&mark));
        assert_eq!(model.renderer().len(), visuals);

        let last = Tag::nav_point("R1", 2);
        assert!(model.delete_point(&last));
        assert!(!model.delete_point(&last));
        assert_eq!(model.path("R1").unwrap().len(), 1);

        assert!(model.delete(&Tag::path("R1")));
        assert!(!model.delete(&Tag::path("R1")));
        assert!(model.path("R1").is_none());
    }

    #[test]
    fn test_handle_drag_inserts_point() {
        let mut model = model();
        route(&mut model);
        let outcome = model.move_point(&Tag::path_handle("R1", 2), Location::new(10.0, 20.5));

        assert_eq!(outcome, MoveOutcome::Inserted(Tag::nav_point("R1", 2)));
        assert_eq!(
            model.path("R1").unwrap().locations(),
            &[
                Location::new(10.0, 20.0),
                Location::new(10.0, 20.5),
                Location::new(10.0, 21.0),
            ]
        );
        assert_eq!(model.selection(), Some(&Tag::nav_point("R1", 2)));
        assert_eq!(positions(&model, "R1"), vec![1, 2, 3]);
    }

    #[test]
    fn test_move_nav_point_in_place() {
        let mut model = model();
        route(&mut model);
        let tag = Tag::nav_point("R1", 1);
        assert_eq!(
            model.move_point(&tag, Location::new(9.0, 20.0)),
            MoveOutcome::Moved(tag.clone())
        );
        assert_eq!(model.location_of(&tag), Some(Location::new(9.0, 20.0)));
        assert_eq!(model.path("R1").unwrap().len(), 2);
    }

    #[test]
    fn test_read_only_mask_makes_everything_noop() {
        let mut model = GeometryModel::new(Scene::new(), EditMask::read_only(), EditorConfig::default());
        assert!(!model.add_path(TagKind::NavPoint, "R1", &[Location::new(1.0, 1.0)]));
        assert!(!model.add_mark(TagKind::PoiUser, "P", Location::new(1.0, 1.0), 0.0));

        model.put_path(
            "R1",
            &PathSnapshot {
                kind: TagKind::NavPoint,
                locations: vec![Location::new(1.0, 1.0)],
                color_index: 3,
            },
        );
        let tag = Tag::nav_point("R1", 1);
        assert_eq!(model.move_point(&tag, Location::new(2.0, 2.0)), MoveOutcome::Ignored);
        assert!(!model.delete(&tag));
        assert!(model.clear_paths().is_empty());
        assert_eq!(model.path("R1").unwrap().color_index(), 3);
    }

    #[test]
    fn test_ring_handle_requires_editable_kind() {
        let mut editable = model();
        editable.add_mark(TagKind::UnitEnemy, "SA-6", Location::new(42.0, 41.0), 25_000.0);
        let mark = editable.mark("SA-6").unwrap();
        assert!(mark.has_ring());
        assert!(mark.has_handle());
        assert!(!mark.handle_visible());

        editable.add_mark(TagKind::PoiUser, "WP", Location::new(42.0, 41.0), 0.0);
        assert!(!editable.mark("WP").unwrap().has_handle());

        let mut viewer = GeometryModel::new(
            Scene::new(),
            EditMask::only([TagKind::NavPoint]),
            EditorConfig::default(),
        );
        viewer.put_mark(
            "SA-6",
            &MarkSnapshot {
                kind: TagKind::UnitEnemy,
                location: Location::new(42.0, 41.0),
                ring_radius_m: 25_000.0,
            },
        );
        let mark = viewer.mark("SA-6").unwrap();
        assert!(mark.has_ring());
        assert!(!mark.has_handle());
    }

    #[test]
    fn test_ring_handle_drag_resizes_ring() {
        let mut model = model();
        let center = Location::new(42.0, 41.0);
        model.add_mark(TagKind::UnitEnemy, "SA-6", center, 25_000.0);
        let target = east_of(center, 30_000.0);

        let tag = Tag::ring_handle("SA-6");
        assert_eq!(model.move_point(&tag, target), MoveOutcome::Moved(tag.clone()));
        let radius = model.mark("SA-6").unwrap().ring_radius_m();
        assert!((radius - 30_000.0).abs() < 50.0);

        model.put_mark(
            "SA-6",
            &MarkSnapshot {
                kind: TagKind::UnitEnemy,
                location: center,
                ring_radius_m: 0.0,
            },
        );
        let mark = model.mark("SA-6").unwrap();
        assert!(!mark.has_ring());
        assert!(!mark.has_handle());
    }

    #[test]
    fn test_handles_reveal_after_delay() {
        let mut model = model();
        route(&mut model);
        let t0 = Instant::now();

        assert!(model.select(&Tag::nav_point("R1", 2), t0));
        assert!(!model.path("R1").unwrap().handles_visible());
        assert!(!model.tick(t0));

        let t1 = after_reveal(model.config(), t0);
        assert!(model.tick(t1));
        let path = model.path("R1").unwrap();
        assert_eq!(
            path.handle_location(HandleSide::Negative),
            Some(Location::new(10.0, 20.5))
        );
        let delta = model.config().handle_delta_deg;
        assert_eq!(
            path.handle_location(HandleSide::Positive),
            Some(Location::new(10.0, 21.0 + delta))
        );
        assert_eq!(
            model
                .renderer()
                .count_visible(VisualKind::PathEditHandle),
            2
        );
    }

    #[test]
    fn test_stale_reveal_is_dropped() {
        let mut model = model();
        route(&mut model);
        let t0 = Instant::now();
        model.select(&Tag::nav_point("R1", 1), t0);
        model.move_point(&Tag::nav_point("R1", 1), Location::new(10.5, 20.0));
        assert!(!model.tick(after_reveal(model.config(), t0)));
        assert!(!model.path("R1").unwrap().handles_visible());
    }

    #[test]
    fn test_move_hides_handles() {
        let mut model = model();
        route(&mut model);
        let t0 = Instant::now();
        model.select(&Tag::nav_point("R1", 1), t0);
        model.tick(after_reveal(model.config(), t0));
        assert!(model.path("R1").unwrap().handles_visible());

        model.move_point(&Tag::nav_point("R1", 1), Location::new(10.5, 20.0));
        assert!(!model.path("R1").unwrap().handles_visible());
    }

    #[test]
    fn test_edit_handles_are_not_selectable() {
        let mut model = model();
        route(&mut model);
        let now = Instant::now();
        model.select(&Tag::nav_point("R1", 1), now);
        assert!(!model.select(&Tag::path_handle("R1", 1), now));
        assert_eq!(model.selection(), Some(&Tag::nav_point("R1", 1)));
    }

    #[test]
    fn test_selection_follows_renumbering() {
        let mut model = model();
        route(&mut model);
        let now = Instant::now();
        model.select(&Tag::nav_point("R1", 2), now);
        model.insert_point("R1", 1, Location::new(9.0, 19.0));
        assert_eq!(model.selection(), Some(&Tag::nav_point("R1", 3)));

        model.delete_point(&Tag::nav_point("R1", 3));
        assert_eq!(model.selection(), None);
        assert_eq!(model.renderer().count_visible(VisualKind::Selection), 0);
    }

    #[test]
    fn test_clear_paths_clears_selection() {
        let mut model = model();
        route(&mut model);
        model.add_mark(TagKind::Bullseye, "BE", Location::new(11.0, 22.0), 0.0);
        model.select(&Tag::mark(TagKind::Bullseye, "BE"), Instant::now());

        assert_eq!(model.clear_paths(), vec!["R1".to_string()]);
        assert!(model.selection().is_none());
        assert!(model.mark("BE").is_some());

        let removed = model.clear_marks(|kind| kind == TagKind::Bullseye);
        assert_eq!(removed, vec![Tag::mark(TagKind::Bullseye, "BE")]);
        // Only the hidden selection overlay remains
        assert_eq!(model.renderer().len(), 1);
    }

    #[test]
    fn test_hit_test_prefers_topmost_layer() {
        let mut model = model();
        let spot = Location::new(41.6, 41.6);
        model.add_path(TagKind::NavPoint, "R1", &[spot]);
        model.add_mark(TagKind::PoiUser, "P", spot, 0.0);

        let mut view = WebMercatorView::new(spot, 10.0);
        view.resize(800.0, 600.0);
        let center = ScreenPos::new(400.0, 300.0);

        assert_eq!(model.hit_test(center, &view, 10.0), Tag::nav_point("R1", 1));
        assert_eq!(
            model.hit_test(ScreenPos::new(430.0, 300.0), &view, 10.0),
            Tag::unknown()
        );
    }

    #[test]
    fn test_bounds_cover_rings() {
        let mut model = model();
        assert!(model.bounds().is_none());
        route(&mut model);
        model.add_mark(TagKind::UnitEnemy, "SA-10", Location::new(10.0, 25.0), 111_195.0);
        let bounds = model.bounds().unwrap();
        assert!((bounds.max_lat - 11.0).abs() < 1e-9);
        assert!(bounds.max_lon > 26.0);
        assert_eq!(bounds.min_lon, 20.0);
    }
}
