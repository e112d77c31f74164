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

use crate::geo::Location;
use crate::handles::HandleSide;
use crate::tag::TagKind;

/// A synthetic, normally hidden handle owned by a path or a mark.
#[derive(Debug, Clone)]
pub(crate) struct EditHandle<H> {
    pub(crate) visual: H,
    pub(crate) visible: bool,
    pub(crate) location: Option<Location>,
}

impl<H> EditHandle<H> {
    pub(crate) fn new(visual: H) -> Self {
        Self {
            visual,
            visible: false,
            location: None,
        }
    }
}

/// An ordered, editable sequence of route points.
///
/// `points[i]` is the visual of `locations[i]`; both vectors always have the
/// same length.
#[derive(Debug, Clone)]
pub struct Path<H> {
    pub(crate) key: String,
    pub(crate) kind: TagKind,
    pub(crate) color_index: usize,
    pub(crate) locations: Vec<Location>,
    pub(crate) points: Vec<H>,
    pub(crate) line: H,
    /// Negative and positive handles, in that order.
    pub(crate) handles: [EditHandle<H>; 2],
}

impl<H> Path<H> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn kind(&self) -> TagKind {
        self.kind
    }

    #[must_use]
    pub fn color_index(&self) -> usize {
        self.color_index
    }

    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether either edit handle is currently shown.
    #[must_use]
    pub fn handles_visible(&self) -> bool {
        self.handles.iter().any(|h| h.visible)
    }

    /// Location of a shown edit handle.
    #[must_use]
    pub fn handle_location(&self, side: HandleSide) -> Option<Location> {
        let handle = &self.handles[side_index(side)];
        handle.visible.then_some(handle.location).flatten()
    }
}

pub(crate) fn side_index(side: HandleSide) -> usize {
    match side {
        HandleSide::Negative => 0,
        HandleSide::Positive => 1,
    }
}
