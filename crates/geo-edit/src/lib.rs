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

//! Interactive editing core for routes, markers and threat rings on a map.
//!
//! The crate has no GUI dependency. A host supplies a [`Renderer`] (the
//! in-memory [`Scene`] works for most hosts) and a [`Projection`], feeds
//! pointer input into a [`Surface`], and paints whatever the renderer holds.
//! It is organized in layers that can be used on their own:
//!
//! - **Addressing**: [`Tag`] values identify interactive elements by kind, key
//!   and 1-based position
//! - **Model**: [`GeometryModel`] owns paths, marks, selection and edit handles,
//!   guarded by an [`EditMask`]
//! - **Interaction**: [`Interaction`] turns pointer input into edits and view
//!   commands
//! - **Mirroring**: [`VerbMirror`] fans edits out between surfaces that each
//!   keep their own model
//! - **Geometry**: Web Mercator projection, handle placement and the
//!   [`clip_ring`] clipper for rings too large to draw natively
//!
//! # Quick Start
//!
//! Two surfaces sharing edits through a mirror:
//!
//! ```
//! use std::time::Instant;
//! use geo_edit::{EditMask, EditorConfig, Location, Scene, Surface, Tag, TagKind, VerbMirror};
//!
//! let mirror = VerbMirror::new(256);
//! let mut editor = Surface::new("editor", Scene::new(), EditMask::all(), EditorConfig::default(), &mirror);
//! let mut viewer = Surface::new("viewer", Scene::new(), EditMask::read_only(), EditorConfig::default(), &mirror);
//!
//! editor.add_path("R1", &[Location::new(10.0, 20.0), Location::new(10.0, 21.0)]);
//! editor.add_mark(TagKind::UnitEnemy, "SA-2", Location::new(11.0, 21.0), 40_000.0);
//!
//! viewer.sync(Instant::now());
//! assert_eq!(viewer.model().path("R1").map(|p| p.len()), Some(2));
//! assert!(!viewer.delete(&Tag::nav_point("R1", 1)));
//! ```
//!
//! # Using the Model Directly
//!
//! ```
//! use geo_edit::{EditMask, EditorConfig, GeometryModel, Location, MoveOutcome, Scene, Tag, TagKind};
//!
//! let mut model = GeometryModel::new(Scene::new(), EditMask::all(), EditorConfig::default());
//! model.add_path(TagKind::NavPoint, "R1", &[Location::new(10.0, 20.0), Location::new(10.0, 21.0)]);
//!
//! // Dragging the handle for insertion position 2 grows the path.
//! let outcome = model.move_point(&Tag::path_handle("R1", 2), Location::new(10.0, 20.5));
//! assert_eq!(outcome, MoveOutcome::Inserted(Tag::nav_point("R1", 2)));
//! assert_eq!(model.path("R1").map(|p| p.len()), Some(3));
//! ```

pub mod config;
pub mod geo;
pub mod handles;
pub mod hover;
pub mod interaction;
pub mod mirror;
pub mod model;
pub mod render;
pub mod ring;
pub mod surface;
pub mod tag;

pub use config::EditorConfig;
pub use geo::{east_of, haversine_m, GeoBounds, Location, Projection, ScreenPos, WebMercatorView};
pub use handles::{place_handle, HandleSide};
pub use hover::HoverPreview;
pub use interaction::{
    DragState, Interaction, Modifiers, PointerInput, Reaction, ViewCommand, WheelSource,
};
pub use mirror::{DragPhase, Edit, Payload, Subscription, SurfaceId, Verb, VerbEvent, VerbMirror};
pub use model::{
    EditMask, GeometryModel, Mark, MarkSnapshot, MoveOutcome, Path, PathSnapshot, PALETTE_SIZE,
};
pub use render::{Layer, Renderer, Scene, Visual, VisualId, VisualKind};
pub use ring::{clip_ring, BoundarySegment, RingBoundary};
pub use surface::Surface;
pub use tag::{Tag, TagKind, TagParseError};
