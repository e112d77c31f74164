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

//! A map surface: one model, its input machine and its mirror registration.

use std::time::Instant;

use log::debug;

use crate::config::EditorConfig;
use crate::geo::{Location, Projection, ScreenPos};
use crate::hover::HoverPreview;
use crate::interaction::{Interaction, PointerInput, Reaction, WheelSource};
use crate::mirror::{Edit, Payload, Subscription, SurfaceId, VerbMirror};
use crate::model::{EditMask, GeometryModel};
use crate::render::Renderer;
use crate::tag::{Tag, TagKind};

/// One independently rendered view of the shared geometry.
///
/// Surfaces never reference each other. Everything they share travels
/// through the [`VerbMirror`] they registered with.
#[derive(Debug)]
pub struct Surface<R: Renderer> {
    name: String,
    model: GeometryModel<R>,
    interaction: Interaction,
    hover: HoverPreview,
    subscription: Subscription,
}

impl<R: Renderer> Surface<R> {
    pub fn new(
        name: impl Into<String>,
        renderer: R,
        mask: EditMask,
        config: EditorConfig,
        mirror: &VerbMirror,
    ) -> Self {
        let hover = HoverPreview::new(config.hover_delay());
        Self {
            name: name.into(),
            model: GeometryModel::new(renderer, mask, config),
            interaction: Interaction::new(),
            hover,
            subscription: mirror.register(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.subscription.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn model(&self) -> &GeometryModel<R> {
        &self.model
    }

    /// Direct access for host-side state such as the viewport overlay.
    /// Edits made through this are not mirrored.
    pub fn model_mut(&mut self) -> &mut GeometryModel<R> {
        &mut self.model
    }

    #[must_use]
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    fn publish(&self, edits: &[Edit]) {
        for edit in edits {
            self.subscription.mirror(edit.clone());
        }
    }

    fn publish_reaction(&self, reaction: Reaction) -> Reaction {
        self.publish(&reaction.edits);
        reaction
    }

    fn pick(&self, pos: ScreenPos, projection: &dyn Projection) -> Tag {
        self.model
            .hit_test(pos, projection, self.model.config().pick_radius_px)
    }

    /// Replay every edit other surfaces mirrored since the last call.
    /// Returns them so the host can react (e.g. to `Opened`).
    pub fn sync(&mut self, now: Instant) -> Vec<Edit> {
        let edits = self.subscription.drain();
        if !edits.is_empty() {
            debug!("{} replaying {} mirrored edits", self.name, edits.len());
        }
        for edit in &edits {
            self.model.apply(edit, now);
        }
        edits
    }

    /// Whether mirrored edits were lost since the last call, meaning this
    /// surface needs [`resync_from`](Self::resync_from). Clears the flag.
    pub fn take_lagged(&mut self) -> bool {
        self.subscription.take_lagged()
    }

    /// Make this surface's paths and marks match `source` without mirroring
    /// anything. Seeds a surface registered after edits were mirrored, or
    /// repairs one that lagged behind the mirror.
    pub fn resync_from<S: Renderer>(&mut self, source: &GeometryModel<S>, now: Instant) {
        let stale_paths: Vec<String> = self
            .model
            .paths()
            .map(|path| path.key().to_string())
            .filter(|key| source.path(key).is_none())
            .collect();
        for key in &stale_paths {
            self.model.remove_path(key);
        }
        let stale_marks: Vec<String> = self
            .model
            .marks()
            .map(|mark| mark.key().to_string())
            .filter(|key| source.mark(key).is_none())
            .collect();
        for key in &stale_marks {
            self.model.remove_mark(key);
        }

        for path in source.paths() {
            let tag = Tag::path(path.key());
            self.model.apply(&Edit::added(tag.clone(), source.payload_for(&tag)), now);
        }
        for mark in source.marks() {
            let tag = Tag::mark(mark.kind(), mark.key());
            self.model.apply(&Edit::added(tag.clone(), source.payload_for(&tag)), now);
        }
        debug!(
            "{} resynced: {} paths, {} marks",
            self.name,
            source.paths().count(),
            source.marks().count()
        );
    }

    /// Run deferred work: handle reveal and hover preview. Returns the element
    /// whose hover preview should now be shown.
    pub fn tick(&mut self, now: Instant) -> Option<Tag> {
        self.model.tick(now);
        let current = self.hover.hovered().cloned()?;
        self.hover.poll(&current, now)
    }

    /// Earliest time `tick` has pending work, for scheduling repaints.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.hover.next_due(), self.model.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    #[must_use]
    pub fn hovered(&self) -> Option<&Tag> {
        self.hover.hovered()
    }

    pub fn pointer_down(&mut self, input: PointerInput, projection: &dyn Projection, now: Instant) -> Reaction {
        let hit = self.pick(input.pos, projection);
        let reaction = self.interaction.pointer_down(&mut self.model, input, hit, now);
        self.publish_reaction(reaction)
    }

    pub fn pointer_move(&mut self, input: PointerInput, projection: &dyn Projection) -> Reaction {
        let reaction = self.interaction.pointer_move(&mut self.model, input, projection);
        self.publish_reaction(reaction)
    }

    pub fn pointer_up(&mut self, input: PointerInput, projection: &dyn Projection, now: Instant) -> Reaction {
        let reaction = self
            .interaction
            .pointer_up(&mut self.model, input, projection, now);
        self.publish_reaction(reaction)
    }

    pub fn double_tap(&mut self, input: PointerInput, projection: &dyn Projection) -> Reaction {
        let hit = self.pick(input.pos, projection);
        let reaction = self
            .interaction
            .double_tap(&self.model, input, hit, projection);
        self.publish_reaction(reaction)
    }

    #[must_use]
    pub fn wheel(&self, delta: f64, source: WheelSource, anchor: ScreenPos) -> Reaction {
        self.interaction.wheel(&self.model, delta, source, anchor)
    }

    /// Track the hovered element. Edit handles do not preview.
    pub fn hover(&mut self, pos: Option<ScreenPos>, projection: &dyn Projection, now: Instant) {
        let hit = pos.map_or_else(Tag::unknown, |pos| self.pick(pos, projection));
        if hit.is_known() && !hit.kind().is_edit_handle() {
            self.hover.enter(hit, now);
        } else {
            self.hover.leave();
        }
    }

    /// Add a path and mirror it.
    pub fn add_path(&mut self, key: &str, locations: &[Location]) -> bool {
        if !self.model.add_path(TagKind::NavPoint, key, locations) {
            return false;
        }
        let tag = Tag::path(key);
        let payload = self.model.payload_for(&tag);
        self.publish(&[Edit::added(tag, payload)]);
        true
    }

    /// Add a mark and mirror it.
    pub fn add_mark(&mut self, kind: TagKind, key: &str, location: Location, ring_radius_m: f64) -> bool {
        if !self.model.add_mark(kind, key, location, ring_radius_m) {
            return false;
        }
        let tag = Tag::mark(kind, key);
        let payload = self.model.payload_for(&tag);
        self.publish(&[Edit::added(tag, payload)]);
        true
    }

    /// Append a point to a path and mirror the result.
    pub fn append_point(&mut self, key: &str, location: Location) -> Option<Tag> {
        let position = self.model.path(key)?.len() + 1;
        let point = self.model.insert_point(key, position, location)?;
        let payload = self.model.payload_for(&Tag::path(key));
        self.publish(&[Edit::added(point.clone(), payload)]);
        Some(point)
    }

    /// Delete a point, path or mark and mirror it.
    pub fn delete(&mut self, tag: &Tag) -> bool {
        if !self.model.delete(tag) {
            return false;
        }
        let payload = match (tag.kind(), tag.key()) {
            (TagKind::NavPoint, Some(key)) if tag.position().is_some() => self.model.payload_for(&Tag::path(key)),
            _ => Payload::None,
        };
        self.publish(&[Edit::deleted(tag.clone(), payload)]);
        true
    }

    pub fn clear_paths(&mut self) -> Vec<String> {
        let had_selection = self.model.selection().is_some();
        let removed = self.model.clear_paths();
        let mut edits = Vec::with_capacity(removed.len() + 1);
        if had_selection {
            edits.push(Edit::selected(Tag::unknown()));
        }
        edits.extend(removed.iter().map(|key| Edit::deleted(Tag::path(key), Payload::None)));
        self.publish(&edits);
        removed
    }

    pub fn clear_marks<F>(&mut self, filter: F) -> Vec<Tag>
    where
        F: Fn(TagKind) -> bool,
    {
        let had_selection = self.model.selection().is_some();
        let removed = self.model.clear_marks(filter);
        let mut edits = Vec::with_capacity(removed.len() + 1);
        if had_selection {
            edits.push(Edit::selected(Tag::unknown()));
        }
        edits.extend(removed.iter().cloned().map(|tag| Edit::deleted(tag, Payload::None)));
        self.publish(&edits);
        removed
    }

    /// Unregister from the mirror, handing back the model.
    pub fn close(self) -> GeometryModel<R> {
        debug!("Closing surface {}", self.name);
        self.subscription.unregister();
        self.model
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geo::WebMercatorView;
    use crate::mirror::{DragPhase, Verb};
    use crate::render::{Scene, VisualKind};

    fn pair(popout_mask: EditMask) -> (VerbMirror, Surface<Scene>, Surface<Scene>) {
        let mirror = VerbMirror::new(64);
        let editor = Surface::new("editor", Scene::new(), EditMask::all(), EditorConfig::default(), &mirror);
        let popout = Surface::new("popout", Scene::new(), popout_mask, EditorConfig::default(), &mirror);
        (mirror, editor, popout)
    }

    fn view() -> WebMercatorView {
        let mut view = WebMercatorView::new(Location::new(10.0, 20.5), 8.0);
        view.resize(800.0, 600.0);
        view
    }

    fn r1() -> [Location; 2] {
        [Location::new(10.0, 20.0), Location::new(10.0, 21.0)]
    }

    #[test]
    fn test_programmatic_edits_reach_other_surface() {
        let now = Instant::now();
        let (_mirror, mut editor, mut popout) = pair(EditMask::read_only());

        assert!(editor.add_path("R1", &r1()));
        assert!(editor.add_mark(TagKind::UnitEnemy, "SA-2", Location::new(11.0, 21.0), 40_000.0));
        assert_eq!(editor.append_point("R1", Location::new(10.5, 21.5)), Some(Tag::nav_point("R1", 3)));

        let edits = popout.sync(now);
        assert_eq!(edits.len(), 3);
        assert_eq!(popout.model().path_snapshot("R1"), editor.model().path_snapshot("R1"));
        assert!(popout.model().mark("SA-2").unwrap().has_ring());
        assert!(!popout.model().mark("SA-2").unwrap().has_handle());
        assert!(editor.sync(now).is_empty());
    }

    #[test]
    fn test_read_only_surface_cannot_edit() {
        let now = Instant::now();
        let (_mirror, mut editor, mut popout) = pair(EditMask::read_only());
        editor.add_path("R1", &r1());
        popout.sync(now);

        assert!(!popout.add_path("R2", &r1()));
        assert!(!popout.delete(&Tag::nav_point("R1", 1)));
        assert!(popout.clear_paths().is_empty());
        assert!(editor.sync(now).is_empty());
        assert_eq!(editor.model().path("R1").unwrap().len(), 2);
    }

    #[test]
    fn test_handle_drag_scenario_mirrors_verbs() {
        let t0 = Instant::now();
        let (mirror, mut editor, mut popout) = pair(EditMask::read_only());
        let mut observer = mirror.register();
        let view = view();
        editor.add_path("R1", &r1());

        let point = view.project_to_screen(Location::new(10.0, 21.0));
        editor.pointer_down(PointerInput::primary(point), &view, t0);
        editor.pointer_up(PointerInput::primary(point), &view, t0);
        let t1 = t0 + editor.model().config().handle_reveal_delay();
        editor.tick(t1);

        let handle = view.project_to_screen(Location::new(10.0, 20.5));
        editor.pointer_down(PointerInput::primary(handle), &view, t1);
        let drop = ScreenPos::new(handle.x, handle.y + 8.0);
        editor.pointer_move(PointerInput::primary(drop), &view);
        editor.pointer_up(PointerInput::primary(drop), &view, t1);

        let verbs: Vec<Verb> = observer.drain().into_iter().map(|e| e.verb).collect();
        assert_eq!(
            verbs,
            vec![
                Verb::Added,
                Verb::Selected,
                Verb::Added,
                Verb::Moved(DragPhase::DragStart),
                Verb::Moved(DragPhase::DragEnd),
                Verb::Selected,
            ]
        );

        popout.sync(t1);
        assert_eq!(popout.model().path_snapshot("R1"), editor.model().path_snapshot("R1"));
        assert_eq!(popout.model().path("R1").unwrap().len(), 3);
        assert_eq!(popout.model().selection(), Some(&Tag::nav_point("R1", 2)));
    }

    #[test]
    fn test_deselect_is_mirrored() {
        let now = Instant::now();
        let (_mirror, mut editor, mut popout) = pair(EditMask::all());
        let view = view();
        editor.add_path("R1", &r1());

        let point = view.project_to_screen(Location::new(10.0, 20.0));
        editor.pointer_down(PointerInput::primary(point), &view, now);
        editor.pointer_up(PointerInput::primary(point), &view, now);
        popout.sync(now);
        assert_eq!(popout.model().selection(), Some(&Tag::nav_point("R1", 1)));

        let empty = ScreenPos::new(400.0, 550.0);
        editor.pointer_down(PointerInput::primary(empty), &view, now);
        editor.pointer_up(PointerInput::primary(empty), &view, now);
        popout.sync(now);
        assert!(popout.model().selection().is_none());
        assert_eq!(popout.model().renderer().count_visible(VisualKind::Selection), 0);
    }

    #[test]
    fn test_edits_flow_both_ways() {
        let now = Instant::now();
        let (_mirror, mut editor, mut popout) = pair(EditMask::all());
        editor.add_path("R1", &r1());
        popout.sync(now);

        assert!(popout.delete(&Tag::nav_point("R1", 1)));
        editor.sync(now);
        assert_eq!(editor.model().path("R1").unwrap().locations(), &[Location::new(10.0, 21.0)]);

        assert!(editor.delete(&Tag::path("R1")));
        popout.sync(now);
        assert!(popout.model().path("R1").is_none());
    }

    #[test]
    fn test_clear_marks_mirrors_each_removal() {
        let now = Instant::now();
        let (_mirror, mut editor, mut popout) = pair(EditMask::read_only());
        editor.add_mark(TagKind::UnitEnemy, "SA-2", Location::new(11.0, 21.0), 0.0);
        editor.add_mark(TagKind::PoiUser, "IP", Location::new(11.0, 22.0), 0.0);
        popout.sync(now);

        let removed = editor.clear_marks(|kind| kind == TagKind::UnitEnemy);
        assert_eq!(removed, vec![Tag::mark(TagKind::UnitEnemy, "SA-2")]);
        popout.sync(now);
        assert!(popout.model().mark("SA-2").is_none());
        assert!(popout.model().mark("IP").is_some());
    }

    #[test]
    fn test_hover_preview_through_surface() {
        let t0 = Instant::now();
        let (_mirror, mut editor, _popout) = pair(EditMask::read_only());
        let view = view();
        editor.add_path("R1", &r1());

        let point = view.project_to_screen(Location::new(10.0, 20.0));
        editor.hover(Some(point), &view, t0);
        assert_eq!(editor.tick(t0), None);
        let due = t0 + editor.model().config().hover_delay();
        assert_eq!(editor.next_deadline(), Some(due));
        assert_eq!(editor.tick(due), Some(Tag::nav_point("R1", 1)));

        editor.hover(Some(point), &view, due);
        editor.hover(None, &view, due + Duration::from_millis(10));
        assert_eq!(editor.tick(due + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_hover_left_early_schedules_nothing() {
        let t0 = Instant::now();
        let (_mirror, mut editor, _popout) = pair(EditMask::read_only());
        let view = view();
        editor.add_path("R1", &r1());

        let point = view.project_to_screen(Location::new(10.0, 20.0));
        editor.hover(Some(point), &view, t0);
        editor.hover(None, &view, t0 + Duration::from_millis(50));

        for secs in 1..=3 {
            assert_eq!(editor.tick(t0 + Duration::from_secs(secs)), None);
            assert_eq!(editor.next_deadline(), None);
        }
    }

    #[test]
    fn test_lagged_surface_recovers_by_resync() {
        let now = Instant::now();
        let config = EditorConfig::default();
        let mirror = VerbMirror::new(config.mirror_capacity);
        let mut editor = Surface::new("editor", Scene::new(), EditMask::all(), config.clone(), &mirror);
        let mut popout = Surface::new("popout", Scene::new(), EditMask::read_only(), config.clone(), &mirror);

        let total = config.mirror_capacity + 44;
        for i in 0..total {
            let location = Location::new(10.0 + i as f64 * 0.01, 20.0);
            assert!(editor.add_mark(TagKind::UnitEnemy, &format!("SAM-{i}"), location, 0.0));
        }
        popout.sync(now);
        assert_eq!(popout.model().marks().count(), config.mirror_capacity);
        assert!(popout.take_lagged());

        popout.resync_from(editor.model(), now);
        assert_eq!(popout.model().marks().count(), total);
        assert_eq!(popout.model().mark_snapshot("SAM-0"), editor.model().mark_snapshot("SAM-0"));
        assert!(!popout.take_lagged());
    }

    #[test]
    fn test_resync_drops_elements_missing_from_source() {
        let now = Instant::now();
        let (_mirror, mut editor, mut popout) = pair(EditMask::read_only());
        editor.add_path("R1", &r1());
        editor.add_mark(TagKind::UnitEnemy, "SA-2", Location::new(11.0, 21.0), 0.0);
        popout.sync(now);

        let mut reference = GeometryModel::new(Scene::new(), EditMask::all(), EditorConfig::default());
        reference.add_path(TagKind::NavPoint, "R2", &r1());
        popout.resync_from(&reference, now);

        assert!(popout.model().path("R1").is_none());
        assert!(popout.model().mark("SA-2").is_none());
        assert_eq!(popout.model().path_snapshot("R2"), reference.path_snapshot("R2"));
    }

    #[test]
    fn test_closed_surface_stops_receiving() {
        let (mirror, mut editor, popout) = pair(EditMask::read_only());
        assert_eq!(mirror.observer_count(), 2);
        let model = popout.close();
        assert!(model.path("R1").is_none());
        assert_eq!(mirror.observer_count(), 1);
        editor.add_path("R1", &r1());
        assert!(editor.sync(Instant::now()).is_empty());
    }
}
