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

use std::time::{Duration, Instant};

use geo_edit::{Edit, EditMask, Location, Scene, Surface, Tag, TagKind, Verb, VerbMirror};
use log::{info, warn};

use crate::config::AppConfig;
use crate::map_view::MapPane;
use crate::mission::Mission;

/// Repaint interval when nothing is scheduled
const IDLE_REPAINT: Duration = Duration::from_millis(500);

struct Popout {
    surface: Surface<Scene>,
    pane: MapPane,
}

pub struct KneeboardApp {
    config: AppConfig,
    mission_name: String,
    mirror: VerbMirror,
    editor: Surface<Scene>,
    editor_pane: MapPane,
    popout: Option<Popout>,
    details: Option<Tag>,
}

impl KneeboardApp {
    pub fn new(config: AppConfig, mission: &Mission) -> Self {
        let mirror = VerbMirror::new(config.editor.mirror_capacity);
        let editor = Surface::new(
            "editor",
            Scene::new(),
            EditMask::all(),
            config.editor.clone(),
            &mirror,
        );
        let editor_pane = MapPane::new(
            Location::new(config.center_lat, config.center_lon),
            config.default_zoom,
        );

        let mut app = Self {
            mission_name: mission.name.clone(),
            mirror,
            editor,
            editor_pane,
            popout: None,
            details: None,
            config,
        };

        // Load before the pop-out registers, so a mission larger than the
        // mirror's buffer reaches it through snapshots instead.
        mission.populate(&mut app.editor);
        if let Some(bounds) = app.editor.model().bounds() {
            app.editor_pane
                .fit_when_sized(bounds.padded(app.config.editor.fit_margin_deg));
        }
        if app.config.show_popout {
            app.open_popout();
        }
        app
    }

    fn popout_mask(&self) -> EditMask {
        if self.config.popout_editable {
            EditMask::all()
        } else {
            EditMask::read_only()
        }
    }

    fn open_popout(&mut self) {
        if self.popout.is_some() {
            return;
        }
        let mut surface = Surface::new(
            "popout",
            Scene::new(),
            self.popout_mask(),
            self.config.editor.clone(),
            &self.mirror,
        );
        // A fresh surface only sees verbs mirrored from now on.
        surface.resync_from(self.editor.model(), Instant::now());

        let mut pane = MapPane::new(self.editor_pane.view().center, self.editor_pane.view().zoom - 1.0);
        if let Some(bounds) = surface.model().bounds() {
            pane.fit_when_sized(bounds.padded(self.config.editor.fit_margin_deg));
        }
        info!("Opened pop-out map");
        self.popout = Some(Popout { surface, pane });
    }

    fn close_popout(&mut self) {
        if let Some(popout) = self.popout.take() {
            popout.surface.close();
            info!("Closed pop-out map");
        }
    }

    fn note_opened(&mut self, edits: &[Edit]) {
        if let Some(edit) = edits.iter().rev().find(|e| e.verb == Verb::Opened) {
            self.details = Some(edit.tag.clone());
        }
    }

    fn show_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong(&self.mission_name);
                ui.separator();

                if ui.button("Fit all").clicked() {
                    if let Some(bounds) = self.editor.model().bounds() {
                        self.editor_pane.fit_when_sized(bounds.padded(self.config.editor.fit_margin_deg));
                    }
                }
                if ui.button("Clear routes").clicked() {
                    self.editor.clear_paths();
                }
                if ui.button("Clear threats").clicked() {
                    self.editor.clear_marks(|kind| kind == TagKind::UnitEnemy);
                }
                if let Some(selected) = self.editor.model().selection().cloned() {
                    if ui.button("Delete selected").clicked() {
                        self.editor.delete(&selected);
                    }
                }
                ui.separator();

                let mut show_popout = self.popout.is_some();
                if ui.checkbox(&mut show_popout, "Pop-out map").changed() {
                    if show_popout {
                        self.open_popout();
                    } else {
                        self.close_popout();
                    }
                }
                ui.checkbox(&mut self.config.show_viewport_boundary, "Show editor view");

                ui.separator();
                let selection = self
                    .editor
                    .model()
                    .selection()
                    .map_or_else(|| "nothing selected".to_string(), ToString::to_string);
                ui.label(egui::RichText::new(selection).monospace());
            });
        });
    }

    fn show_details(&mut self, ctx: &egui::Context) {
        let Some(tag) = self.details.clone() else { return };
        let model = self.editor.model();
        let mut open = true;
        egui::Window::new("Details")
            .open(&mut open)
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(tag.to_string()).monospace());
                match model.location_of(&tag) {
                    Some(location) => {
                        ui.label(format!("{:.5}, {:.5}", location.lat, location.lon));
                    }
                    None => {
                        ui.label("No longer exists");
                    }
                }
                if let Some(path) = tag.key().and_then(|key| model.path(key)) {
                    if tag.kind() == TagKind::NavPoint {
                        ui.label(format!("Route {} with {} points", path.key(), path.len()));
                    }
                }
                if let Some(mark) = tag.key().and_then(|key| model.mark(key)) {
                    if mark.ring_radius_m() > 0.0 {
                        ui.label(format!("Ring radius {:.1} km", mark.ring_radius_m() / 1000.0));
                    }
                }
            });
        if !open {
            self.details = None;
        }
    }

    fn show_popout(&mut self, ctx: &egui::Context, now: Instant) {
        let boundary = self
            .config
            .show_viewport_boundary
            .then(|| self.editor_pane.view().corners());
        let Some(popout) = self.popout.as_mut() else { return };

        let replayed = popout.surface.sync(now);
        if popout.surface.take_lagged() {
            warn!("Pop-out fell behind the editor; resyncing");
            popout.surface.resync_from(self.editor.model(), now);
        }
        if !replayed.is_empty() {
            ctx.request_repaint();
        }
        popout.surface.model_mut().set_viewport_boundary(boundary);

        let mut close = false;
        let mut opened = Vec::new();
        ctx.show_viewport_immediate(
            egui::ViewportId::from_hash_of("kneeboard_popout"),
            egui::ViewportBuilder::default()
                .with_title("Kneeboard Map")
                .with_inner_size([640.0, 640.0]),
            |ctx, _class| {
                egui::CentralPanel::default()
                    .frame(egui::Frame::NONE)
                    .show(ctx, |ui| {
                        opened = popout.pane.show(ui, &mut popout.surface, now);
                    });
                if ctx.input(|i| i.viewport().close_requested()) {
                    close = true;
                }
            },
        );

        self.note_opened(&opened);
        if close {
            self.close_popout();
        }
    }

    fn next_repaint(&self, now: Instant) -> Duration {
        let popout = self.popout.as_ref().and_then(|p| p.surface.next_deadline());
        [self.editor.next_deadline(), popout]
            .into_iter()
            .flatten()
            .min()
            .map_or(IDLE_REPAINT, |due| due.saturating_duration_since(now).min(IDLE_REPAINT))
    }
}

impl eframe::App for KneeboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        let replayed = self.editor.sync(now);
        // The editor is authoritative: when it misses verbs the pop-out is
        // brought back in line with it.
        if self.editor.take_lagged() {
            if let Some(popout) = self.popout.as_mut() {
                warn!("Editor lost mirrored edits; resyncing the pop-out from it");
                popout.surface.resync_from(self.editor.model(), now);
            }
        }
        if !replayed.is_empty() {
            self.note_opened(&replayed);
        }

        self.show_toolbar(ctx);

        let mut opened = Vec::new();
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                opened = self.editor_pane.show(ui, &mut self.editor, now);
            });
        self.note_opened(&opened);

        self.show_details(ctx);
        self.show_popout(ctx, now);

        ctx.request_repaint_after(self.next_repaint(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::MarkDef;

    fn large_mission(count: usize) -> Mission {
        Mission {
            name: "Large".to_string(),
            routes: Vec::new(),
            marks: (0..count)
                .map(|i| MarkDef {
                    kind: TagKind::UnitEnemy,
                    key: Some(format!("SAM-{i}")),
                    location: Location::new(40.0 + i as f64 * 0.01, 42.0),
                    ring_radius_m: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_popout_receives_mission_larger_than_mirror() {
        let config = AppConfig::default();
        let total = config.editor.mirror_capacity + 44;
        let mut app = KneeboardApp::new(config, &large_mission(total));

        let popout = app.popout.as_mut().unwrap();
        assert!(popout.surface.sync(Instant::now()).is_empty());
        assert!(!popout.surface.take_lagged());
        assert_eq!(popout.surface.model().marks().count(), total);
        assert_eq!(app.editor.model().marks().count(), total);
    }

    #[test]
    fn test_popout_mask_follows_config() {
        let config = AppConfig {
            popout_editable: false,
            ..AppConfig::default()
        };
        let app = KneeboardApp::new(config, &Mission::demo());
        let popout = app.popout.as_ref().unwrap();
        assert!(!popout.surface.model().mask().allows(TagKind::NavPoint));
        assert_eq!(popout.surface.model().paths().count(), 2);
    }

    #[test]
    fn test_no_popout_when_disabled() {
        let config = AppConfig {
            show_popout: false,
            ..AppConfig::default()
        };
        let app = KneeboardApp::new(config, &Mission::demo());
        assert!(app.popout.is_none());
        assert_eq!(app.mirror.observer_count(), 1);
    }
}
