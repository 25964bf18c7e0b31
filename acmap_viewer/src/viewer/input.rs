//! Pointer and keyboard handling. Every handler mutates the map, then
//! resyncs the batch in the same event so the next frame is consistent.

use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, KeyEvent, Modifiers, MouseButton},
    keyboard::{Key, NamedKey},
};

use crate::picking::{pick_at, pick_in_rect};

use super::{Marquee, ViewerState};

/// NDC distance past which a pressed button becomes a marquee drag rather
/// than a click.
const DRAG_THRESHOLD: f32 = 0.01;

impl ViewerState {
    pub fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let cursor = self
            .metrics
            .pixels_to_ndc([position.x as f32, position.y as f32]);
        self.cursor_ndc = Some(cursor);

        if let Some(marquee) = &mut self.marquee {
            let dx = cursor[0] - marquee.anchor[0];
            let dy = cursor[1] - marquee.anchor[1];
            if (dx * dx + dy * dy).sqrt() > DRAG_THRESHOLD {
                marquee.dragged = true;
            }
            self.window.request_redraw();
            return;
        }

        self.update_hover(cursor);
    }

    pub fn handle_mouse_input(&mut self, state: ElementState, button: MouseButton) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if let Some(cursor) = self.cursor_ndc {
                    self.marquee = Some(Marquee {
                        anchor: cursor,
                        dragged: false,
                    });
                }
            }
            ElementState::Released => {
                let Some(marquee) = self.marquee.take() else {
                    return;
                };
                let Some(cursor) = self.cursor_ndc else {
                    return;
                };
                if marquee.dragged {
                    self.commit_marquee(marquee.anchor, cursor);
                } else {
                    self.click_select(cursor);
                }
                self.sync_all_points();
                self.window.request_redraw();
            }
        }
    }

    pub fn handle_modifiers(&mut self, modifiers: Modifiers) {
        self.shift_held = modifiers.state().shift_key();
    }

    /// Returns true when the viewer should exit.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return false;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => {
                // Escape cancels an in-flight marquee without touching the
                // map; otherwise it drops the whole selection.
                if self.marquee.take().is_none() {
                    self.map.clear_selection();
                    self.sync_all_points();
                }
                self.window.request_redraw();
                false
            }
            Key::Named(NamedKey::ArrowRight) => {
                self.step_selection(1);
                false
            }
            Key::Named(NamedKey::ArrowLeft) => {
                self.step_selection(-1);
                false
            }
            Key::Character(text) => match text.as_str() {
                "d" => {
                    self.step_selection(1);
                    false
                }
                "a" => {
                    self.step_selection(-1);
                    false
                }
                "q" => true,
                _ => false,
            },
            _ => false,
        }
    }

    fn update_hover(&mut self, cursor: [f32; 2]) {
        let hit = pick_at(&self.batch, &self.projector, &self.metrics, cursor)
            .map(|slot| self.point_of_slot[slot]);
        if hit == self.hovered {
            return;
        }
        if let Some(old) = self.hovered.take() {
            self.map.dehover(old);
        }
        if let Some(new) = hit {
            self.map.hover(new);
            let point = self.map.point(new);
            log::debug!(
                "hovering {} {:?} (mean stress {:.3})",
                point.kind().label(),
                point.name,
                self.map.point_mean_stress(new)
            );
        }
        self.hovered = hit;
        self.sync_all_points();
        self.window.request_redraw();
    }

    fn click_select(&mut self, cursor: [f32; 2]) {
        let hit = pick_at(&self.batch, &self.projector, &self.metrics, cursor)
            .map(|slot| self.point_of_slot[slot]);
        match hit {
            Some(point) if self.shift_held => {
                if self.map.point(point).selected() {
                    self.map.deselect(point);
                } else {
                    self.map.select(point);
                }
            }
            Some(point) => {
                self.map.clear_selection();
                self.map.select(point);
                self.log_selected(point);
            }
            None => {
                if !self.shift_held {
                    self.map.clear_selection();
                }
            }
        }
    }

    /// Applies the marquee result as one batched transition.
    fn commit_marquee(&mut self, anchor: [f32; 2], cursor: [f32; 2]) {
        let hits = pick_in_rect(&self.batch, &self.projector, &self.metrics, anchor, cursor);
        if !self.shift_held {
            self.map.clear_selection();
        }
        for slot in hits {
            self.map.select(self.point_of_slot[slot]);
        }
        log::info!("marquee selected {} points", self.map.selection().len());
    }

    /// Moves a single selection to the next/previous visible point, wrapping
    /// at either end. Starts from the first visible point when nothing is
    /// selected.
    fn step_selection(&mut self, step: isize) {
        let len = self.map.len() as isize;
        if len == 0 {
            return;
        }
        let start = self.map.selection().first().copied();
        let mut candidate = start.map_or(0, |index| index as isize + step);
        for _ in 0..len {
            let wrapped = candidate.rem_euclid(len) as usize;
            if self.map.point(wrapped).visible() {
                self.map.clear_selection();
                self.map.select(wrapped);
                self.log_selected(wrapped);
                self.sync_all_points();
                self.window.request_redraw();
                return;
            }
            candidate += step;
        }
    }

    fn log_selected(&self, index: usize) {
        let point = self.map.point(index);
        log::info!(
            "selected {} {:?}: stress {:.3}, mean {:.3} over {} pairs",
            point.kind().label(),
            point.name,
            point.stress(),
            self.map.point_mean_stress(index),
            self.map.contributing_pairs(index)
        );
    }
}
