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

//! Debounced hover preview.
//!
//! Entering an element schedules a callback stamped with the current serial.
//! Leaving or entering something else bumps the serial and drops whatever was
//! queued, so only the element still under the pointer can come due.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::tag::Tag;

#[derive(Debug, Clone)]
struct Scheduled {
    serial: u64,
    tag: Tag,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct HoverPreview {
    delay: Duration,
    serial: u64,
    hovered: Option<Tag>,
    queue: VecDeque<Scheduled>,
}

impl HoverPreview {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            serial: 0,
            hovered: None,
            queue: VecDeque::new(),
        }
    }

    /// Element the pointer is currently over, if any.
    #[must_use]
    pub fn hovered(&self) -> Option<&Tag> {
        self.hovered.as_ref()
    }

    /// The pointer entered `tag`. Re-entering the hovered element is a no-op.
    pub fn enter(&mut self, tag: Tag, now: Instant) {
        if self.hovered.as_ref() == Some(&tag) {
            return;
        }
        self.serial += 1;
        self.queue.clear();
        self.queue.push_back(Scheduled {
            serial: self.serial,
            tag: tag.clone(),
            due: now + self.delay,
        });
        self.hovered = Some(tag);
    }

    /// The pointer left whatever it was over.
    pub fn leave(&mut self) {
        if self.hovered.take().is_some() {
            self.serial += 1;
        }
        self.queue.clear();
    }

    /// Run callbacks that are due. Returns the element to preview, if a
    /// current callback fired while the pointer is still over `current`.
    pub fn poll(&mut self, current: &Tag, now: Instant) -> Option<Tag> {
        let mut fired = None;
        while self.queue.front().is_some_and(|s| s.due <= now) {
            let Some(scheduled) = self.queue.pop_front() else {
                break;
            };
            if scheduled.serial == self.serial && scheduled.tag == *current {
                fired = Some(scheduled.tag);
            }
        }
        fired
    }

    /// Time of the next queued callback, for scheduling a repaint.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.queue
            .iter()
            .find(|s| s.serial == self.serial)
            .map(|s| s.due)
    }
}
