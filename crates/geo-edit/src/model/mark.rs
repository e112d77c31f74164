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

use super::path::EditHandle;
use crate::geo::Location;
use crate::tag::TagKind;

/// A standalone marker, optionally surrounded by an engagement ring.
///
/// `ring` exists while `ring_radius_m > 0`; `handle` additionally requires the
/// mark's kind to be editable on the owning surface.
#[derive(Debug, Clone)]
pub struct Mark<H> {
    pub(crate) key: String,
    pub(crate) kind: TagKind,
    pub(crate) location: Location,
    pub(crate) ring_radius_m: f64,
    pub(crate) visual: H,
    pub(crate) ring: Option<H>,
    pub(crate) handle: Option<EditHandle<H>>,
}

impl<H> Mark<H> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn kind(&self) -> TagKind {
        self.kind
    }

    #[must_use]
    pub fn location(&self) -> Location {
        self.location
    }

    /// Ring radius in meters; zero means no ring.
    #[must_use]
    pub fn ring_radius_m(&self) -> f64 {
        self.ring_radius_m
    }

    #[must_use]
    pub fn has_ring(&self) -> bool {
        self.ring.is_some()
    }

    #[must_use]
    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn handle_visible(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.visible)
    }
}
