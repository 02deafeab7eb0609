//! Transport bar: play/pause, seek slider, clock labels, mute and a volume
//! slider that appears while the mute button is hovered.
//!
//! Nothing here talks to the engine. Interactions are queued as
//! [`ControlAction`]s and drained by the app each frame.

use eframe::egui;

use lm_common::format_clock;
use lm_engine::PlaybackSnapshot;

use crate::icons::{IconCache, IconKind};

const ICON_SIZE: egui::Vec2 = egui::vec2(24.0, 24.0);
const VOLUME_SLIDER_WIDTH: f32 = 90.0;
/// Seconds the volume slider stays visible after the pointer leaves.
pub const VOLUME_HIDE_DELAY: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    TogglePlay,
    /// Absolute position in milliseconds.
    Seek(u64),
    SetVolume(u8),
    ToggleMute,
}

// ---------------------------------------------------------------------------
// Seek slider
// ---------------------------------------------------------------------------

/// Seek slider state. While dragged the slider ignores position updates and
/// the seek is only issued when the drag ends.
#[derive(Debug, Default)]
pub struct SeekState {
    dragging: Option<u64>,
}

impl SeekState {
    /// Value the slider should show.
    pub fn displayed(&self, position_ms: u64) -> u64 {
        self.dragging.unwrap_or(position_ms)
    }

    /// Feed one frame of slider interaction. Returns the seek to issue, if any.
    pub fn interact(&mut self, value_ms: u64, dragged: bool, drag_stopped: bool, clicked: bool) -> Option<u64> {
        if drag_stopped {
            self.dragging = None;
            return Some(value_ms);
        }
        if dragged {
            self.dragging = Some(value_ms);
            return None;
        }
        if clicked {
            return Some(value_ms);
        }
        None
    }
}

#[cfg(test)]
impl SeekState {
    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }
}

// ---------------------------------------------------------------------------
// Volume reveal
// ---------------------------------------------------------------------------

/// Show-on-hover timer for the volume slider.
#[derive(Debug, Default)]
pub struct VolumeReveal {
    visible: bool,
    hide_at: Option<f64>,
}

impl VolumeReveal {
    /// Update with the hover state at time `now` (seconds). Returns whether
    /// the slider is visible this frame.
    pub fn update(&mut self, hovered: bool, now: f64) -> bool {
        if hovered {
            self.visible = true;
            self.hide_at = None;
        } else if self.visible {
            match self.hide_at {
                None => self.hide_at = Some(now + VOLUME_HIDE_DELAY),
                Some(at) if now >= at => {
                    self.visible = false;
                    self.hide_at = None;
                }
                Some(_) => {}
            }
        }
        self.visible
    }

    /// Pending hide time, for scheduling a repaint.
    pub fn hide_at(&self) -> Option<f64> {
        self.hide_at
    }
}

#[cfg(test)]
impl VolumeReveal {
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ControlsState {
    pub seek: SeekState,
    pub volume: VolumeReveal,
    /// Slider hover from the previous frame; the slider is laid out after
    /// the reveal decision.
    volume_hovered: bool,
    actions: Vec<ControlAction>,
}

impl ControlsState {
    pub fn push(&mut self, action: ControlAction) {
        self.actions.push(action);
    }

    pub fn drain_actions(&mut self) -> Vec<ControlAction> {
        std::mem::take(&mut self.actions)
    }
}

fn icon_button(ui: &mut egui::Ui, icons: &mut IconCache, kind: IconKind, fallback: &str) -> egui::Response {
    match icons.icon(kind) {
        Some(texture) => {
            let image = egui::Image::from_texture(egui::load::SizedTexture::from_handle(texture))
                .fit_to_exact_size(ICON_SIZE);
            ui.add(egui::Button::image(image).frame(false))
        }
        None => ui.add(egui::Button::new(fallback).frame(false).min_size(ICON_SIZE)),
    }
}

/// Draw the transport bar: a full-width seek slider over the control row.
/// Controls stay disabled until a duration is known.
pub fn show_controls(ui: &mut egui::Ui, state: &mut ControlsState, snapshot: &PlaybackSnapshot, icons: &mut IconCache) {
    let enabled = snapshot.has_duration();

    ui.add_enabled_ui(enabled, |ui| {
        // Seek slider
        let shown = state.seek.displayed(snapshot.position_ms);
        let mut value = shown as f64;
        let max = snapshot.duration_ms.max(1) as f64;
        ui.spacing_mut().slider_width = ui.available_width();
        let response = ui.add(egui::Slider::new(&mut value, 0.0..=max).show_value(false));
        let value = value.round() as u64;
        if let Some(target) = state
            .seek
            .interact(value, response.dragged(), response.drag_stopped(), response.clicked())
        {
            state.push(ControlAction::Seek(target));
        }

        ui.horizontal(|ui| {
            ui.spacing_mut().item_spacing.x = 8.0;

            // Play / pause
            let (kind, glyph) = if snapshot.playing {
                (IconKind::Pause, "⏸")
            } else {
                (IconKind::Play, "▶")
            };
            if icon_button(ui, icons, kind, glyph)
                .on_hover_text("Play/Pause (Space)")
                .clicked()
            {
                state.push(ControlAction::TogglePlay);
            }

            ui.label(format_clock(shown));
            ui.label(format_clock(snapshot.duration_ms));

            // Mute and volume, right-aligned
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (kind, glyph) = if snapshot.muted || snapshot.volume == 0 {
                    (IconKind::VolumeOff, "🔇")
                } else {
                    (IconKind::VolumeHigh, "🔊")
                };
                let mute = icon_button(ui, icons, kind, glyph).on_hover_text("Mute (M)");
                if mute.clicked() {
                    state.push(ControlAction::ToggleMute);
                }
                let mut hovered = mute.hovered();

                let now = ui.input(|i| i.time);
                if state.volume.update(state.volume_hovered || hovered, now) {
                    let mut volume = snapshot.volume;
                    ui.spacing_mut().slider_width = VOLUME_SLIDER_WIDTH;
                    let response = ui.add(egui::Slider::new(&mut volume, 0..=100).show_value(false));
                    if response.changed() {
                        state.push(ControlAction::SetVolume(volume));
                    }
                    hovered |= response.hovered() || response.dragged();
                }
                state.volume_hovered = hovered;

                if let Some(at) = state.volume.hide_at() {
                    ui.ctx()
                        .request_repaint_after(std::time::Duration::from_secs_f64((at - now).max(0.0)));
                }
            });
        });
    });
}
