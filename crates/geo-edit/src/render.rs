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

//! Rendering substrate abstraction.
//!
//! The model drives visuals only through the [`Renderer`] trait and keeps its
//! own handle tables; renderers never see tags or model entries. [`Scene`] is
//! the in-memory renderer the desktop app paints from.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::geo::Location;
use crate::tag::TagKind;

/// What a visual depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualKind {
    /// Outline of another surface's viewport.
    ViewportBoundary,
    /// Engagement ring around a mark.
    Ring,
    /// Polyline through all points of a path.
    PathLine { color_index: usize },
    /// One point of a path.
    PathPoint { kind: TagKind, color_index: usize },
    PathEditHandle,
    RingEditHandle,
    /// A standalone marker.
    Marker(TagKind),
    /// Highlight drawn over the current selection.
    Selection,
}

/// Z-order layers, lowest first. Derived ordering is the paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    ViewportBoundary,
    RingHighlight,
    PathLine,
    PathEditHandle,
    RingEditHandle,
    Marker(TagKind),
    PathPoint(TagKind),
    Selection,
}

impl Layer {
    /// Default layer for a freshly created visual.
    #[must_use]
    pub fn for_visual(kind: VisualKind) -> Self {
        match kind {
            VisualKind::ViewportBoundary => Self::ViewportBoundary,
            VisualKind::Ring => Self::RingHighlight,
            VisualKind::PathLine { .. } => Self::PathLine,
            VisualKind::PathPoint { kind, .. } => Self::PathPoint(kind),
            VisualKind::PathEditHandle => Self::PathEditHandle,
            VisualKind::RingEditHandle => Self::RingEditHandle,
            VisualKind::Marker(kind) => Self::Marker(kind),
            VisualKind::Selection => Self::Selection,
        }
    }
}

/// The rendering collaborator driven by the geometry model.
pub trait Renderer {
    type Handle: Copy + Eq + Hash + fmt::Debug;

    fn create_visual(&mut self, kind: VisualKind) -> Self::Handle;
    fn set_location(&mut self, handle: Self::Handle, location: Location);
    fn set_polyline(&mut self, handle: Self::Handle, locations: &[Location]);
    fn set_radius(&mut self, handle: Self::Handle, radius_m: f64);
    fn set_visibility(&mut self, handle: Self::Handle, visible: bool);
    fn set_z_order(&mut self, handle: Self::Handle, layer: Layer);
    fn remove_visual(&mut self, handle: Self::Handle);
}

/// Handle of a visual in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisualId(u64);

/// Retained state of one visual.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub kind: VisualKind,
    pub location: Option<Location>,
    pub polyline: Vec<Location>,
    pub radius_m: f64,
    pub visible: bool,
    pub layer: Layer,
}

/// In-memory retained-mode renderer.
#[derive(Debug, Default)]
pub struct Scene {
    visuals: HashMap<VisualId, Visual>,
    next_id: u64,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: VisualId) -> Option<&Visual> {
        self.visuals.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }

    /// All visuals in paint order (layer, then creation order).
    #[must_use]
    pub fn visuals(&self) -> Vec<(VisualId, &Visual)> {
        let mut visuals: Vec<_> = self.visuals.iter().map(|(id, v)| (*id, v)).collect();
        visuals.sort_by_key(|(id, v)| (v.layer, *id));
        visuals
    }

    /// Number of visible visuals of the given kind.
    #[must_use]
    pub fn count_visible(&self, kind: VisualKind) -> usize {
        self.visuals
            .values()
            .filter(|v| v.visible && v.kind == kind)
            .count()
    }

    fn with_visual(&mut self, id: VisualId, f: impl FnOnce(&mut Visual)) {
        if let Some(visual) = self.visuals.get_mut(&id) {
            f(visual);
        }
    }
}

impl Renderer for Scene {
    type Handle = VisualId;

    fn create_visual(&mut self, kind: VisualKind) -> VisualId {
        self.next_id += 1;
        let id = VisualId(self.next_id);
        self.visuals.insert(
            id,
            Visual {
                kind,
                location: None,
                polyline: Vec::new(),
                radius_m: 0.0,
                visible: true,
                layer: Layer::for_visual(kind),
            },
        );
        id
    }

    fn set_location(&mut self, handle: VisualId, location: Location) {
        self.with_visual(handle, |v| v.location = Some(location));
    }

    fn set_polyline(&mut self, handle: VisualId, locations: &[Location]) {
        self.with_visual(handle, |v| v.polyline = locations.to_vec());
    }

    fn set_radius(&mut self, handle: VisualId, radius_m: f64) {
        self.with_visual(handle, |v| v.radius_m = radius_m);
    }

    fn set_visibility(&mut self, handle: VisualId, visible: bool) {
        self.with_visual(handle, |v| v.visible = visible);
    }

    fn set_z_order(&mut self, handle: VisualId, layer: Layer) {
        self.with_visual(handle, |v| v.layer = layer);
    }

    fn remove_visual(&mut self, handle: VisualId) {
        self.visuals.remove(&handle);
    }
}
