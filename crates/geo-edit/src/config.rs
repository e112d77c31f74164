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

//! Tunables for the editing surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by the model, the interaction machine and the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Angular offset of path edit handles from an endpoint, in degrees.
    pub handle_delta_deg: f64,

    /// Pointer travel (pixels) before a press on a marker becomes a drag.
    pub drag_threshold_px: f64,

    /// Delay between selecting a point and revealing its edit handles.
    pub handle_reveal_delay_ms: u64,

    /// Delay before a hovered marker shows its preview.
    pub hover_delay_ms: u64,

    /// Hit-test radius around each interactive element, in pixels.
    pub pick_radius_px: f64,

    /// Padding added around all elements when fitting the view, in degrees.
    pub fit_margin_deg: f64,

    /// Zoom change per wheel notch, in zoom levels.
    pub zoom_notch_step: f64,

    /// Zoom change per pixel of smooth (trackpad) scrolling.
    pub smooth_zoom_rate: f64,

    /// Pending verbs buffered per surface before the oldest are dropped.
    pub mirror_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            handle_delta_deg: 0.01,
            drag_threshold_px: 4.0,
            handle_reveal_delay_ms: 250,
            hover_delay_ms: 400,
            pick_radius_px: 10.0,
            fit_margin_deg: 0.05,
            zoom_notch_step: 0.5,
            smooth_zoom_rate: 1.0 / 240.0,
            mirror_capacity: 256,
        }
    }
}

impl EditorConfig {
    #[must_use]
    pub fn handle_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.handle_reveal_delay_ms)
    }

    #[must_use]
    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }

    /// Squared drag threshold, compared against squared pointer travel.
    #[must_use]
    pub fn drag_threshold_sq(&self) -> f64 {
        self.drag_threshold_px * self.drag_threshold_px
    }
}
