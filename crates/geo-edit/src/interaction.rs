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

//! Pointer state machine turning raw input into model edits and view changes.
//!
//! ```text
//! Idle ──down on element──▶ ReadyMarker ──travel > threshold──▶ ActiveMarker
//!   │                            │                                  │
//!   └──down on map──▶ ReadyMap ──move──▶ ActiveMap                  │
//!                        │  (modifier: back to Idle)                │
//!                        └──────────── up ─────────────▶ Idle ◀─────┘
//! ```
//!
//! The machine applies edits to the model directly and returns them in a
//! [`Reaction`] so the caller can mirror them. View changes are returned as
//! [`ViewCommand`]s for the host to apply to its projection.

use std::time::Instant;

use log::debug;

use crate::geo::{GeoBounds, Location, Projection, ScreenPos};
use crate::mirror::{DragPhase, Edit, Payload};
use crate::model::{GeometryModel, MoveOutcome};
use crate::render::Renderer;
use crate::tag::{Tag, TagKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// Pressed on an element; not yet past the drag threshold.
    ReadyMarker,
    /// Dragging an element.
    ActiveMarker,
    /// Pressed on empty map.
    ReadyMap,
    /// Panning the map.
    ActiveMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub command: bool,
}

impl Modifiers {
    #[must_use]
    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt || self.command
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pos: ScreenPos,
    /// Whether the primary button is held.
    pub primary: bool,
    pub modifiers: Modifiers,
}

impl PointerInput {
    #[must_use]
    pub fn primary(pos: ScreenPos) -> Self {
        Self {
            pos,
            primary: true,
            modifiers: Modifiers::default(),
        }
    }
}

/// Where a scroll came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelSource {
    /// Discrete mouse wheel notches.
    Notched,
    /// High-resolution trackpad scrolling, in pixels.
    Smooth,
}

/// A change the host should apply to its view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewCommand {
    /// Move the map content by this many pixels.
    Pan { dx: f64, dy: f64 },
    Recenter(Location),
    FitBounds(GeoBounds),
    /// Change zoom by `levels`, keeping `anchor` fixed.
    Zoom { levels: f64, anchor: ScreenPos },
}

/// What a single input event produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    /// Edits already applied to the local model, in order, for mirroring.
    pub edits: Vec<Edit>,
    pub view: Option<ViewCommand>,
}

impl Reaction {
    fn view(command: ViewCommand) -> Self {
        Self {
            edits: Vec::new(),
            view: Some(command),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interaction {
    state: DragState,
    /// Element pressed or, once dragging, the element being moved.
    target: Option<Tag>,
    press_pos: ScreenPos,
    last_pos: ScreenPos,
    started: bool,
    creates_point: bool,
}

impl Interaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pointer pressed; `hit` is the element under the pointer.
    pub fn pointer_down<R: Renderer>(
        &mut self,
        model: &mut GeometryModel<R>,
        input: PointerInput,
        hit: Tag,
        now: Instant,
    ) -> Reaction {
        self.reset();
        if !input.primary {
            return Reaction::default();
        }
        self.press_pos = input.pos;
        self.last_pos = input.pos;

        if !hit.is_known() {
            self.state = DragState::ReadyMap;
            return Reaction::default();
        }

        let mut reaction = Reaction::default();
        if !hit.kind().is_edit_handle()
            && model.selection() != Some(&hit)
            && model.select(&hit, now)
        {
            reaction.edits.push(Edit::selected(hit.clone()));
        }
        self.state = DragState::ReadyMarker;
        self.target = Some(hit);
        reaction
    }

    /// Pointer moved.
    pub fn pointer_move<R: Renderer>(
        &mut self,
        model: &mut GeometryModel<R>,
        input: PointerInput,
        projection: &dyn Projection,
    ) -> Reaction {
        let reaction = match self.state {
            DragState::Idle => Reaction::default(),
            DragState::ReadyMarker => {
                let travel = self.press_pos.distance_sq(input.pos);
                let editable = self.target.as_ref().is_some_and(|t| model.is_editable(t));
                if travel > model.config().drag_threshold_sq() && editable {
                    self.state = DragState::ActiveMarker;
                    self.creates_point = self
                        .target
                        .as_ref()
                        .is_some_and(|t| t.kind() == TagKind::PathEditHandle);
                    self.drag_to(model, projection.screen_to_geo(input.pos), false)
                } else {
                    Reaction::default()
                }
            }
            DragState::ActiveMarker => self.drag_to(model, projection.screen_to_geo(input.pos), false),
            DragState::ReadyMap if input.modifiers.any() => {
                debug!("Modifier held on map press; cancelling pan");
                self.reset();
                return Reaction::default();
            }
            DragState::ReadyMap | DragState::ActiveMap => {
                self.state = DragState::ActiveMap;
                Reaction::view(ViewCommand::Pan {
                    dx: input.pos.x - self.last_pos.x,
                    dy: input.pos.y - self.last_pos.y,
                })
            }
        };
        self.last_pos = input.pos;
        reaction
    }

    /// Pointer released.
    pub fn pointer_up<R: Renderer>(
        &mut self,
        model: &mut GeometryModel<R>,
        input: PointerInput,
        projection: &dyn Projection,
        now: Instant,
    ) -> Reaction {
        let mut reaction = Reaction::default();
        match self.state {
            DragState::ActiveMarker => {
                reaction = self.drag_to(model, projection.screen_to_geo(input.pos), true);
                if self.creates_point {
                    if let Some(point) = self.target.clone() {
                        reaction.edits.push(Edit::selected(point));
                    }
                }
                model.refresh_handles(now);
            }
            DragState::ReadyMap | DragState::ActiveMap => {
                if model.clear_selection() {
                    reaction.edits.push(Edit::selected(Tag::unknown()));
                }
            }
            DragState::Idle | DragState::ReadyMarker => {}
        }
        self.reset();
        reaction
    }

    fn drag_to<R: Renderer>(
        &mut self,
        model: &mut GeometryModel<R>,
        location: Location,
        release: bool,
    ) -> Reaction {
        let mut reaction = Reaction::default();
        let Some(target) = self.target.clone() else {
            return reaction;
        };
        let phase = match (release, self.started) {
            (true, _) => DragPhase::DragEnd,
            (false, false) => DragPhase::DragStart,
            (false, true) => DragPhase::DragUpdate,
        };

        match model.move_point(&target, location) {
            MoveOutcome::Inserted(point) => {
                let snapshot = model.payload_for(&Tag::path(point.key().unwrap_or_default()));
                reaction.edits.push(Edit::added(point.clone(), snapshot));
                reaction.edits.push(Edit::moved(
                    point.clone(),
                    DragPhase::DragStart,
                    Payload::Location(location),
                ));
                self.target = Some(point);
                self.started = true;
            }
            MoveOutcome::Moved(tag) => {
                let payload = model.payload_for(&tag);
                reaction.edits.push(Edit::moved(tag, phase, payload));
                self.started = true;
            }
            MoveOutcome::Ignored if release && self.started => {
                let payload = model.payload_for(&target);
                reaction.edits.push(Edit::moved(target, DragPhase::DragEnd, payload));
            }
            MoveOutcome::Ignored => {}
        }
        reaction
    }

    /// Double tap: opens an element, otherwise recenters (or, with a
    /// modifier, fits everything into view).
    pub fn double_tap<R: Renderer>(
        &mut self,
        model: &GeometryModel<R>,
        input: PointerInput,
        hit: Tag,
        projection: &dyn Projection,
    ) -> Reaction {
        if hit.is_known() {
            return Reaction {
                edits: vec![Edit::opened(hit)],
                view: None,
            };
        }
        if input.modifiers.any() {
            return model.bounds().map_or_else(Reaction::default, |bounds| {
                Reaction::view(ViewCommand::FitBounds(bounds.padded(model.config().fit_margin_deg)))
            });
        }
        Reaction::view(ViewCommand::Recenter(projection.screen_to_geo(input.pos)))
    }

    /// Scroll input. Ignored while an element is being dragged.
    ///
    /// Notched input zooms in fixed steps of at least one notch; smooth input
    /// zooms proportionally to the scrolled distance.
    pub fn wheel<R: Renderer>(
        &self,
        model: &GeometryModel<R>,
        delta: f64,
        source: WheelSource,
        anchor: ScreenPos,
    ) -> Reaction {
        if self.state == DragState::ActiveMarker || delta == 0.0 || !delta.is_finite() {
            return Reaction::default();
        }
        let config = model.config();
        let levels = match source {
            WheelSource::Notched => delta.signum() * delta.abs().round().max(1.0) * config.zoom_notch_step,
            WheelSource::Smooth => delta * config.smooth_zoom_rate,
        };
        Reaction::view(ViewCommand::Zoom { levels, anchor })
    }
}
