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

//! Map pane: feeds egui input into a surface and paints its scene.

use std::time::Instant;

use geo_edit::{
    clip_ring, east_of, Edit, GeoBounds, Location, Modifiers, PointerInput, Projection, Reaction,
    RingBoundary, Scene, ScreenPos, Surface, Tag, TagKind, ViewCommand, VisualKind,
    WebMercatorView, WheelSource,
};

/// Route line colors, indexed by a path's color index.
const ROUTE_PALETTE: [egui::Color32; geo_edit::PALETTE_SIZE] = [
    egui::Color32::from_rgb(0, 200, 200),
    egui::Color32::from_rgb(255, 150, 0),
    egui::Color32::from_rgb(150, 200, 0),
    egui::Color32::from_rgb(255, 50, 150),
    egui::Color32::from_rgb(150, 50, 255),
    egui::Color32::from_rgb(50, 150, 200),
    egui::Color32::from_rgb(230, 230, 80),
    egui::Color32::from_rgb(240, 240, 240),
];

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(28, 34, 40);
const GRID: egui::Color32 = egui::Color32::from_rgb(48, 56, 64);
const SELECTION: egui::Color32 = egui::Color32::from_rgb(255, 220, 0);
const HANDLE: egui::Color32 = egui::Color32::WHITE;

/// Points per arc when a clipped ring boundary is flattened for painting.
const RING_ARC_STEPS: usize = 48;

/// One interactive map view over a [`Surface`].
#[derive(Debug)]
pub struct MapPane {
    view: WebMercatorView,
    pending_fit: Option<GeoBounds>,
    pressed: bool,
    last_pointer: Option<ScreenPos>,
    preview: Option<Tag>,
}

impl MapPane {
    pub fn new(center: Location, zoom: f64) -> Self {
        Self {
            view: WebMercatorView::new(center, zoom),
            pending_fit: None,
            pressed: false,
            last_pointer: None,
            preview: None,
        }
    }

    /// Fit `bounds` into view as soon as the pane knows its size.
    pub fn fit_when_sized(&mut self, bounds: GeoBounds) {
        self.pending_fit = Some(bounds);
    }

    pub fn view(&self) -> &WebMercatorView {
        &self.view
    }

    /// Handle input and paint. Returns the edits this pane originated, which
    /// have already been applied and mirrored.
    pub fn show(&mut self, ui: &mut egui::Ui, surface: &mut Surface<Scene>, now: Instant) -> Vec<Edit> {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        self.view.resize(f64::from(rect.width()), f64::from(rect.height()));
        if let Some(bounds) = self.pending_fit.take() {
            self.view.fit(bounds);
        }

        let origin = rect.min;
        let to_local = |p: egui::Pos2| ScreenPos::new(f64::from(p.x - origin.x), f64::from(p.y - origin.y));

        let mut edits = Vec::new();
        let mut apply = |pane: &mut Self, reaction: Reaction| {
            if let Some(command) = reaction.view {
                pane.apply_view(command);
            }
            edits.extend(reaction.edits);
        };

        let (primary_pressed, primary_released, primary_down, pointer, egui_modifiers, zoom_delta, wheel) =
            ui.input(|i| {
                let wheel: Vec<(f64, WheelSource)> = i
                    .events
                    .iter()
                    .filter_map(|event| match event {
                        egui::Event::MouseWheel { unit, delta, .. } => {
                            let source = match unit {
                                egui::MouseWheelUnit::Point => WheelSource::Smooth,
                                egui::MouseWheelUnit::Line | egui::MouseWheelUnit::Page => WheelSource::Notched,
                            };
                            Some((f64::from(delta.y), source))
                        }
                        _ => None,
                    })
                    .collect();
                (
                    i.pointer.primary_pressed(),
                    i.pointer.primary_released(),
                    i.pointer.primary_down(),
                    i.pointer.interact_pos(),
                    i.modifiers,
                    i.zoom_delta(),
                    wheel,
                )
            });
        let modifiers = Modifiers {
            shift: egui_modifiers.shift,
            ctrl: egui_modifiers.ctrl,
            alt: egui_modifiers.alt,
            command: egui_modifiers.command,
        };
        let input_at = |pos: ScreenPos| PointerInput {
            pos,
            primary: primary_down || primary_pressed,
            modifiers,
        };

        if let Some(pos) = pointer.map(to_local) {
            if primary_pressed && response.hovered() {
                self.pressed = true;
                let reaction = surface.pointer_down(input_at(pos), &self.view, now);
                apply(self, reaction);
            } else if self.pressed && self.last_pointer != Some(pos) {
                let reaction = surface.pointer_move(input_at(pos), &self.view);
                apply(self, reaction);
            }
            if primary_released && self.pressed {
                self.pressed = false;
                let reaction = surface.pointer_up(input_at(pos), &self.view, now);
                apply(self, reaction);
            }
            self.last_pointer = Some(pos);
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos().map(to_local) {
                let reaction = surface.double_tap(input_at(pos), &self.view);
                apply(self, reaction);
            }
        }

        if response.hovered() {
            let anchor = response
                .hover_pos()
                .map_or_else(|| ScreenPos::new(self.view.width / 2.0, self.view.height / 2.0), to_local);
            for (delta, source) in wheel {
                let reaction = surface.wheel(delta, source, anchor);
                apply(self, reaction);
            }
            if (zoom_delta - 1.0).abs() > 0.001 {
                self.view.zoom_at(f64::from(zoom_delta.log2()), anchor);
            }
        }

        surface.hover(response.hover_pos().map(to_local), &self.view, now);
        if let Some(tag) = surface.tick(now) {
            self.preview = Some(tag);
        }
        if self.preview.as_ref() != surface.hovered() {
            self.preview = None;
        }

        self.paint(&painter, rect, surface);
        edits
    }

    fn apply_view(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Pan { dx, dy } => self.view.pan(dx, dy),
            ViewCommand::Recenter(location) => self.view.center = location,
            ViewCommand::FitBounds(bounds) => self.view.fit(bounds),
            ViewCommand::Zoom { levels, anchor } => self.view.zoom_at(levels, anchor),
        }
    }

    fn to_screen(&self, rect: egui::Rect, location: Location) -> egui::Pos2 {
        let p = self.view.project_to_screen(location);
        egui::pos2(rect.min.x + p.x as f32, rect.min.y + p.y as f32)
    }

    fn paint(&self, painter: &egui::Painter, rect: egui::Rect, surface: &Surface<Scene>) {
        painter.rect_filled(rect, 0.0, BACKGROUND);
        self.paint_graticule(painter, rect);

        let model = surface.model();
        for (id, visual) in model.renderer().visuals() {
            if !visual.visible {
                continue;
            }
            match visual.kind {
                VisualKind::ViewportBoundary => {
                    let points: Vec<egui::Pos2> = visual.polyline.iter().map(|l| self.to_screen(rect, *l)).collect();
                    painter.add(egui::Shape::line(points, egui::Stroke::new(1.5, egui::Color32::LIGHT_BLUE)));
                }
                VisualKind::Ring => {
                    if let Some(center) = visual.location {
                        self.paint_ring(painter, rect, center, visual.radius_m);
                    }
                }
                VisualKind::PathLine { color_index } => {
                    let points: Vec<egui::Pos2> = visual.polyline.iter().map(|l| self.to_screen(rect, *l)).collect();
                    let color = ROUTE_PALETTE[color_index % ROUTE_PALETTE.len()];
                    painter.add(egui::Shape::line(points, egui::Stroke::new(2.0, color)));
                }
                VisualKind::PathPoint { color_index, .. } => {
                    let Some(location) = visual.location else { continue };
                    let pos = self.to_screen(rect, location);
                    let color = ROUTE_PALETTE[color_index % ROUTE_PALETTE.len()];
                    painter.circle_filled(pos, 5.0, color);
                    if let Some(position) = model.tag_for(id).position() {
                        painter.text(
                            pos + egui::vec2(8.0, -8.0),
                            egui::Align2::LEFT_BOTTOM,
                            position.to_string(),
                            egui::FontId::monospace(10.0),
                            color,
                        );
                    }
                }
                VisualKind::PathEditHandle | VisualKind::RingEditHandle => {
                    let Some(location) = visual.location else { continue };
                    let pos = self.to_screen(rect, location);
                    painter.circle(pos, 4.0, BACKGROUND, egui::Stroke::new(1.5, HANDLE));
                }
                VisualKind::Marker(kind) => {
                    let Some(location) = visual.location else { continue };
                    let pos = self.to_screen(rect, location);
                    paint_marker(painter, pos, kind);
                    if let Some(key) = model.tag_for(id).key() {
                        painter.text(
                            pos + egui::vec2(9.0, 0.0),
                            egui::Align2::LEFT_CENTER,
                            key,
                            egui::FontId::proportional(11.0),
                            egui::Color32::from_gray(200),
                        );
                    }
                }
                VisualKind::Selection => {
                    let Some(location) = visual.location else { continue };
                    painter.circle_stroke(self.to_screen(rect, location), 9.0, egui::Stroke::new(2.0, SELECTION));
                }
            }
        }

        if let Some(tag) = &self.preview {
            self.paint_preview(painter, rect, surface, tag);
        }
    }

    fn paint_graticule(&self, painter: &egui::Painter, rect: egui::Rect) {
        let corners = self.view.corners();
        let Some(bounds) = GeoBounds::from_locations(corners) else { return };
        let span = (bounds.max_lon - bounds.min_lon).max(bounds.max_lat - bounds.min_lat);
        let step = [0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
            .into_iter()
            .find(|s| span / s <= 12.0)
            .unwrap_or(30.0);
        let stroke = egui::Stroke::new(1.0, GRID);

        let mut lon = (bounds.min_lon / step).floor() * step;
        while lon <= bounds.max_lon {
            let x = self.to_screen(rect, Location::new(bounds.center().lat, lon)).x;
            painter.line_segment([egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())], stroke);
            lon += step;
        }
        let mut lat = (bounds.min_lat / step).floor() * step;
        while lat <= bounds.max_lat {
            let y = self.to_screen(rect, Location::new(lat, bounds.center().lon)).y;
            painter.line_segment([egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)], stroke);
            lat += step;
        }
    }

    fn paint_ring(&self, painter: &egui::Painter, rect: egui::Rect, center: Location, radius_m: f64) {
        let fill = egui::Color32::from_rgba_unmultiplied(255, 60, 60, 28);
        let stroke = egui::Stroke::new(1.5, egui::Color32::from_rgb(255, 90, 90));
        let c = self.view.project_to_screen(center);
        let e = self.view.project_to_screen(east_of(center, radius_m));

        match clip_ring(c, e, self.view.width, self.view.height) {
            RingBoundary::Hidden => {}
            RingBoundary::Circle { center: middle, radius, .. } => {
                let pos = egui::pos2(rect.min.x + middle.x as f32, rect.min.y + middle.y as f32);
                painter.circle(pos, radius as f32, fill, stroke);
            }
            boundary @ RingBoundary::Clipped { .. } => {
                let points: Vec<egui::Pos2> = boundary
                    .flatten(RING_ARC_STEPS)
                    .into_iter()
                    .map(|p| egui::pos2(rect.min.x + p.x as f32, rect.min.y + p.y as f32))
                    .collect();
                painter.add(egui::Shape::convex_polygon(points, fill, stroke));
            }
        }
    }

    fn paint_preview(&self, painter: &egui::Painter, rect: egui::Rect, surface: &Surface<Scene>, tag: &Tag) {
        let model = surface.model();
        let Some(location) = model.location_of(tag) else { return };
        let mut text = format!("{tag}\n{:.4}, {:.4}", location.lat, location.lon);
        if let Some(mark) = tag.key().and_then(|key| model.mark(key)).filter(|m| m.ring_radius_m() > 0.0) {
            text.push_str(&format!("\nring {:.1} km", mark.ring_radius_m() / 1000.0));
        }

        let anchor = self.to_screen(rect, location) + egui::vec2(12.0, 12.0);
        let galley = painter.layout_no_wrap(text, egui::FontId::monospace(11.0), egui::Color32::WHITE);
        let bubble = egui::Rect::from_min_size(anchor, galley.size() + egui::vec2(12.0, 8.0));
        painter.rect_filled(bubble, 5.0, egui::Color32::from_rgba_unmultiplied(0, 0, 0, 200));
        painter.galley(bubble.min + egui::vec2(6.0, 4.0), galley, egui::Color32::WHITE);
    }
}

fn paint_marker(painter: &egui::Painter, pos: egui::Pos2, kind: TagKind) {
    let stroke = egui::Stroke::new(1.5, egui::Color32::BLACK);
    match kind {
        TagKind::UnitEnemy => {
            let r = 6.0;
            let points = vec![
                pos + egui::vec2(0.0, -r),
                pos + egui::vec2(r, 0.0),
                pos + egui::vec2(0.0, r),
                pos + egui::vec2(-r, 0.0),
            ];
            painter.add(egui::Shape::convex_polygon(points, egui::Color32::from_rgb(230, 60, 60), stroke));
        }
        TagKind::UnitFriend => {
            let square = egui::Rect::from_center_size(pos, egui::vec2(10.0, 10.0));
            painter.rect_filled(square, 1.0, egui::Color32::from_rgb(80, 160, 255));
        }
        TagKind::Bullseye => {
            for r in [4.0, 8.0, 12.0] {
                painter.circle_stroke(pos, r, egui::Stroke::new(1.0, egui::Color32::from_rgb(200, 200, 200)));
            }
        }
        _ => {
            painter.circle(pos, 5.0, egui::Color32::from_rgb(120, 220, 120), stroke);
        }
    }
}
