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

//! Verb mirror: best-effort fan-out of edits between surfaces.
//!
//! Every surface keeps its own [`GeometryModel`]. After applying a change
//! locally, a surface publishes it as an [`Edit`] through its
//! [`Subscription`]; every other registered surface picks it up with
//! [`Subscription::drain`] and replays it with [`GeometryModel::apply`].
//!
//! Delivery is synchronous and in-process, with no ordering guarantee,
//! acknowledgement or retry. Replay is idempotent: structural path changes
//! carry the whole path, so duplicated or reordered delivery converges.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use crate::geo::Location;
use crate::model::{GeometryModel, MarkSnapshot, PathSnapshot};
use crate::render::Renderer;
use crate::tag::{Tag, TagKind};

/// Identity of a registered surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Interactive phase carried by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    /// A programmatic, non-interactive move.
    None,
    DragStart,
    DragUpdate,
    /// The committed final value of a drag.
    DragEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Selected,
    Opened,
    Moved(DragPhase),
    Added,
    Deleted,
}

/// State carried alongside a verb.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Location(Location),
    Path(PathSnapshot),
    Mark(MarkSnapshot),
}

/// One mirrored change.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub verb: Verb,
    pub tag: Tag,
    pub payload: Payload,
}

impl Edit {
    #[must_use]
    pub fn selected(tag: Tag) -> Self {
        Self {
            verb: Verb::Selected,
            tag,
            payload: Payload::None,
        }
    }

    #[must_use]
    pub fn opened(tag: Tag) -> Self {
        Self {
            verb: Verb::Opened,
            tag,
            payload: Payload::None,
        }
    }

    #[must_use]
    pub fn moved(tag: Tag, phase: DragPhase, payload: Payload) -> Self {
        Self {
            verb: Verb::Moved(phase),
            tag,
            payload,
        }
    }

    #[must_use]
    pub fn added(tag: Tag, payload: Payload) -> Self {
        Self {
            verb: Verb::Added,
            tag,
            payload,
        }
    }

    #[must_use]
    pub fn deleted(tag: Tag, payload: Payload) -> Self {
        Self {
            verb: Verb::Deleted,
            tag,
            payload,
        }
    }
}

/// An edit stamped with the surface that originated it.
#[derive(Debug, Clone, PartialEq)]
pub struct VerbEvent {
    pub sender: SurfaceId,
    pub edit: Edit,
}

/// The shared channel surfaces register with.
#[derive(Debug)]
pub struct VerbMirror {
    tx: broadcast::Sender<VerbEvent>,
    next_id: AtomicU64,
}

impl VerbMirror {
    /// Create a mirror buffering up to `capacity` undrained events per
    /// observer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new observer. It only sees events mirrored after this call.
    pub fn register(&self) -> Subscription {
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!("Registered {id} with the verb mirror");
        Subscription {
            id,
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
            lagged: false,
        }
    }

    /// Deliver `edit` to every observer except `sender`.
    pub fn mirror(&self, sender: SurfaceId, edit: Edit) {
        send(&self.tx, VerbEvent { sender, edit });
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

fn send(tx: &broadcast::Sender<VerbEvent>, event: VerbEvent) {
    debug!("{} mirrors {:?} {}", event.sender, event.edit.verb, event.edit.tag);
    if tx.send(event).is_err() {
        debug!("No observers registered; verb dropped");
    }
}

/// A surface's registration with a [`VerbMirror`].
#[derive(Debug)]
pub struct Subscription {
    id: SurfaceId,
    tx: broadcast::Sender<VerbEvent>,
    rx: broadcast::Receiver<VerbEvent>,
    lagged: bool,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Publish an edit this surface has already applied locally.
    pub fn mirror(&self, edit: Edit) {
        send(
            &self.tx,
            VerbEvent {
                sender: self.id,
                edit,
            },
        );
    }

    /// Take every pending edit from other surfaces, oldest first.
    ///
    /// If this observer fell more than the channel capacity behind, the
    /// oldest edits are lost and [`take_lagged`](Self::take_lagged) reports it.
    pub fn drain(&mut self) -> Vec<Edit> {
        let mut edits = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.sender == self.id => {}
                Ok(event) => edits.push(event.edit),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("{} lagged behind the verb mirror; {skipped} verbs lost", self.id);
                    self.lagged = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        edits
    }

    /// Whether verbs were lost since the last call. Clears the flag.
    pub fn take_lagged(&mut self) -> bool {
        std::mem::take(&mut self.lagged)
    }

    /// Stop receiving verbs.
    pub fn unregister(self) {
        info!("Unregistered {} from the verb mirror", self.id);
    }
}

impl<R: Renderer> GeometryModel<R> {
    /// Payload describing the current state of the element `tag` addresses.
    ///
    /// Route points carry their location, whole paths their snapshot and
    /// marks (or their ring handles) the mark snapshot.
    #[must_use]
    pub fn payload_for(&self, tag: &Tag) -> Payload {
        let Some(key) = tag.key() else {
            return Payload::None;
        };
        match tag.kind() {
            TagKind::NavPoint => match tag.position() {
                Some(_) => self.location_of(tag).map_or(Payload::None, Payload::Location),
                None => self.path_snapshot(key).map_or(Payload::None, Payload::Path),
            },
            TagKind::PathEditHandle => self.path_snapshot(key).map_or(Payload::None, Payload::Path),
            TagKind::RingEditHandle => self.mark_snapshot(key).map_or(Payload::None, Payload::Mark),
            kind if kind.is_mark() => self.mark_snapshot(key).map_or(Payload::None, Payload::Mark),
            _ => Payload::None,
        }
    }

    /// Replay an edit mirrored from another surface.
    ///
    /// Replay bypasses this surface's edit mask: the originating surface has
    /// already checked its own. Unknown tags and mismatched payloads are
    /// ignored.
    pub fn apply(&mut self, edit: &Edit, now: Instant) {
        let Some(key) = edit.tag.key() else {
            if edit.verb == Verb::Selected {
                self.clear_selection();
            }
            return;
        };

        match edit.verb {
            Verb::Selected => {
                self.select(&edit.tag, now);
            }
            Verb::Opened => debug!("Ignoring replayed open of {}", edit.tag),
            Verb::Moved(_) | Verb::Added | Verb::Deleted => match &edit.payload {
                Payload::Path(snapshot) => self.put_path(key, snapshot),
                Payload::Mark(snapshot) => self.put_mark(key, snapshot),
                Payload::Location(location) => match (edit.tag.kind(), edit.tag.position()) {
                    (TagKind::NavPoint, Some(position)) => {
                        self.relocate_point(key, position, *location);
                    }
                    (kind, _) if kind.is_mark() => {
                        if self.mark(key).is_some_and(|m| m.kind() == kind) {
                            self.relocate_mark(key, *location);
                        }
                    }
                    _ => debug!("Ignoring {:?} of {} with a location", edit.verb, edit.tag),
                },
                Payload::None if edit.verb == Verb::Deleted => match edit.tag.kind() {
                    TagKind::NavPoint if edit.tag.position().is_none() => {
                        self.remove_path(key);
                    }
                    kind if kind.is_mark() => {
                        if self.mark(key).is_some_and(|m| m.kind() == kind) {
                            self.remove_mark(key);
                        }
                    }
                    _ => debug!("Ignoring delete of {} without a snapshot", edit.tag),
                },
                Payload::None => debug!("Ignoring {:?} of {} without a payload", edit.verb, edit.tag),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::model::EditMask;
    use crate::render::{Scene, VisualKind};

    fn model(mask: EditMask) -> GeometryModel<Scene> {
        GeometryModel::new(Scene::new(), mask, EditorConfig::default())
    }

    fn r1() -> Vec<Location> {
        vec![Location::new(10.0, 20.0), Location::new(10.0, 21.0)]
    }

    #[test]
    fn test_mirror_excludes_sender() {
        let mirror = VerbMirror::new(16);
        let mut a = mirror.register();
        let mut b = mirror.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(mirror.observer_count(), 2);

        let edit = Edit::selected(Tag::nav_point("R1", 1));
        a.mirror(edit.clone());

        assert_eq!(b.drain(), vec![edit]);
        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());
    }

    #[test]
    fn test_unregistered_surface_stops_receiving() {
        let mirror = VerbMirror::new(16);
        let a = mirror.register();
        let b = mirror.register();
        b.unregister();
        assert_eq!(mirror.observer_count(), 1);

        a.mirror(Edit::opened(Tag::path("R1")));
        let mut late = mirror.register();
        assert!(late.drain().is_empty());
    }

    #[test]
    fn test_lagging_observer_keeps_newest() {
        let mirror = VerbMirror::new(2);
        let a = mirror.register();
        let mut b = mirror.register();
        for position in 1..=5 {
            a.mirror(Edit::selected(Tag::nav_point("R1", position)));
        }
        let tags: Vec<Tag> = b.drain().into_iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![Tag::nav_point("R1", 4), Tag::nav_point("R1", 5)]);
        assert!(b.take_lagged());
        assert!(!b.take_lagged());
    }

    #[test]
    fn test_mirror_on_behalf_of_sender() {
        let mirror = VerbMirror::new(16);
        let mut a = mirror.register();
        let mut b = mirror.register();
        let mut c = mirror.register();

        let edit = Edit::opened(Tag::mark(TagKind::UnitEnemy, "SA-2"));
        mirror.mirror(a.id(), edit.clone());

        assert!(a.drain().is_empty());
        assert_eq!(b.drain(), vec![edit.clone()]);
        assert_eq!(c.drain(), vec![edit]);
        assert!(!b.take_lagged());
    }

    #[test]
    fn test_duplicate_delivery_is_idempotent() {
        let now = Instant::now();
        let mut origin = model(EditMask::all());
        origin.add_path(TagKind::NavPoint, "R1", &r1());
        origin.insert_point("R1", 2, Location::new(10.0, 20.5));
        let added = Edit::added(Tag::path("R1"), origin.payload_for(&Tag::path("R1")));

        origin.delete_point(&Tag::nav_point("R1", 1));
        let deleted = Edit::deleted(
            Tag::nav_point("R1", 1),
            origin.payload_for(&Tag::path("R1")),
        );

        let mut replica = model(EditMask::read_only());
        for edit in [&added, &added, &deleted, &deleted] {
            replica.apply(edit, now);
        }
        assert_eq!(replica.path_snapshot("R1"), origin.path_snapshot("R1"));
        assert_eq!(replica.point_tags("R1"), origin.point_tags("R1"));
    }

    #[test]
    fn test_reordered_moves_converge_on_last_applied() {
        let now = Instant::now();
        let mut replica = model(EditMask::all());
        replica.add_path(TagKind::NavPoint, "R1", &r1());

        let tag = Tag::nav_point("R1", 1);
        let first = Edit::moved(tag.clone(), DragPhase::DragUpdate, Payload::Location(Location::new(9.0, 20.0)));
        let last = Edit::moved(tag.clone(), DragPhase::DragEnd, Payload::Location(Location::new(8.0, 20.0)));
        replica.apply(&first, now);
        replica.apply(&last, now);
        replica.apply(&last, now);
        assert_eq!(replica.location_of(&tag), Some(Location::new(8.0, 20.0)));
    }

    #[test]
    fn test_replayed_path_adopts_sender_color() {
        let now = Instant::now();
        let mut origin = model(EditMask::all());
        origin.add_path(TagKind::NavPoint, "R0", &r1());
        origin.add_path(TagKind::NavPoint, "R1", &r1());
        let mut replica = model(EditMask::all());
        replica.add_path(TagKind::NavPoint, "R1", &r1());
        assert_eq!(replica.path("R1").unwrap().color_index(), 0);

        let tag = Tag::path("R1");
        replica.apply(&Edit::added(tag.clone(), origin.payload_for(&tag)), now);

        assert_eq!(replica.path_snapshot("R1"), origin.path_snapshot("R1"));
        assert_eq!(replica.point_tags("R1"), vec![Tag::nav_point("R1", 1), Tag::nav_point("R1", 2)]);
        let visuals = replica.renderer().visuals();
        let count = |want: fn(&VisualKind) -> bool| visuals.iter().filter(|(_, v)| want(&v.kind)).count();
        assert_eq!(count(|k| matches!(k, VisualKind::PathLine { color_index: 1 })), 1);
        assert_eq!(count(|k| matches!(k, VisualKind::PathPoint { color_index: 1, .. })), 2);
        assert_eq!(
            count(|k| matches!(
                k,
                VisualKind::PathLine { color_index: 0 } | VisualKind::PathPoint { color_index: 0, .. }
            )),
            0
        );
    }

    #[test]
    fn test_mark_replay_and_delete() {
        let now = Instant::now();
        let mut origin = model(EditMask::all());
        origin.add_mark(TagKind::UnitEnemy, "SA-6", Location::new(42.0, 41.0), 25_000.0);
        let tag = Tag::mark(TagKind::UnitEnemy, "SA-6");

        let mut replica = model(EditMask::read_only());
        replica.apply(&Edit::added(tag.clone(), origin.payload_for(&tag)), now);
        let mark = replica.mark("SA-6").unwrap();
        assert!(mark.has_ring());
        assert!(!mark.has_handle());
        assert_eq!(mark.ring_radius_m(), 25_000.0);

        let delete = Edit::deleted(tag, Payload::None);
        replica.apply(&delete, now);
        replica.apply(&delete, now);
        assert!(replica.mark("SA-6").is_none());
    }

    #[test]
    fn test_replayed_selection_and_deselection() {
        let now = Instant::now();
        let mut replica = model(EditMask::read_only());
        replica.apply(
            &Edit::added(
                Tag::path("R1"),
                Payload::Path(PathSnapshot {
                    kind: TagKind::NavPoint,
                    locations: r1(),
                    color_index: 5,
                }),
            ),
            now,
        );
        assert_eq!(replica.path("R1").unwrap().color_index(), 5);

        replica.apply(&Edit::selected(Tag::nav_point("R1", 2)), now);
        assert_eq!(replica.selection(), Some(&Tag::nav_point("R1", 2)));

        replica.apply(&Edit::selected(Tag::unknown()), now);
        assert!(replica.selection().is_none());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let now = Instant::now();
        let mut replica = model(EditMask::all());
        replica.add_path(TagKind::NavPoint, "R1", &r1());
        let before = replica.path_snapshot("R1");

        replica.apply(&Edit::moved(Tag::decode(Some("bogus")), DragPhase::None, Payload::None), now);
        replica.apply(&Edit::moved(Tag::nav_point("R1", 9), DragPhase::None, Payload::Location(Location::new(0.0, 0.0))), now);
        replica.apply(&Edit::deleted(Tag::nav_point("R1", 1), Payload::None), now);
        assert_eq!(replica.path_snapshot("R1"), before);
    }
}
