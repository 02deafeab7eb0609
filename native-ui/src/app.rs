use eframe::{egui, glow};

use crate::config::PlayerConfig;
use crate::controls::{self, ControlAction, ControlsState};
use crate::icons::{IconCache, IconKind};
use crate::theme::{self, Theme};
use crate::video_surface::VideoSurface;

use crossbeam::channel::Receiver;
use lm_engine::{EndReason, EngineError, MpvEngine, PlaybackEvent, PlaybackService, PlaybackSnapshot};
use lm_render_bridge::FrameReadyCallback;
use tracing::{info, warn};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Left/Right arrow seek step.
const SEEK_STEP_MS: i64 = 5_000;
/// Repaint cadence while media is open, so position updates show when no
/// new video frames arrive (paused, audio-only).
const IDLE_REPAINT: Duration = Duration::from_millis(250);

const STATUS_TEXT: egui::Color32 = egui::Color32::from_rgb(0x99, 0x99, 0x99);
const STATUS_ERROR: egui::Color32 = egui::Color32::from_rgb(0xff, 0x6b, 0x6b);

// ---------------------------------------------------------------------------
// Event reduction
// ---------------------------------------------------------------------------

/// What the app must do to the render path after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    /// A file is loaded; frame-ready callbacks should be armed.
    Arm,
    /// Playback ended; stop frame-ready callbacks.
    Disarm(EndReason),
}

/// Fold a published event into the UI's view of playback.
pub fn apply_event(view: &mut PlaybackSnapshot, event: &PlaybackEvent) -> Option<Reaction> {
    match *event {
        PlaybackEvent::Position(ms) => view.position_ms = ms,
        PlaybackEvent::Duration(ms) => view.duration_ms = ms,
        PlaybackEvent::PlaybackState(playing) => view.playing = playing,
        PlaybackEvent::Volume(volume) => view.volume = volume,
        PlaybackEvent::Muted(muted) => view.muted = muted,
        PlaybackEvent::FileLoaded => {
            view.finished = false;
            return Some(Reaction::Arm);
        }
        PlaybackEvent::Finished(reason) => {
            view.finished = true;
            view.playing = false;
            return Some(Reaction::Disarm(reason));
        }
    }
    None
}

/// Style `ctx` with `theme` and retint the icons to match.
pub fn restyle(ctx: &egui::Context, icons: &mut IconCache, theme: &Theme) {
    theme::apply_theme(ctx, theme);
    icons.set_color(theme.palette.secondary_text);
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct LumenApp {
    service: PlaybackService<MpvEngine>,
    events: Receiver<PlaybackEvent>,
    view: PlaybackSnapshot,
    surface: VideoSurface,
    controls: ControlsState,
    icons: IconCache,
    theme: Theme,
    frame_ready: FrameReadyCallback,

    // UI state
    status_message: Option<(String, Instant)>,
    last_error: Option<String>,
}

impl LumenApp {
    /// Build the app inside eframe's creation callback, where the GL
    /// context is current.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: &PlayerConfig,
        theme: Theme,
        service: PlaybackService<MpvEngine>,
        media: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut icons = IconCache::new(cc.egui_ctx.clone(), theme.palette.secondary_text);
        restyle(&cc.egui_ctx, &mut icons, &theme);
        let surface = VideoSurface::new(cc, Arc::clone(service.engine()), config.gl_debug);

        let events = service.subscribe();
        service.set_volume(config.volume)?;

        let repaint_ctx = cc.egui_ctx.clone();
        let frame_ready: FrameReadyCallback = Arc::new(move || repaint_ctx.request_repaint());

        let mut app = Self {
            view: service.snapshot(),
            service,
            events,
            surface,
            controls: ControlsState::default(),
            icons,
            theme,
            frame_ready,
            status_message: None,
            last_error: None,
        };

        if let Some(path) = media {
            app.open_media(&path);
        }
        Ok(app)
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    pub fn open_media(&mut self, path: &Path) {
        match self.service.set_media(path) {
            Ok(()) => {
                self.view = self.service.snapshot();
                self.surface.set_frame_ready_callback(Some(Arc::clone(&self.frame_ready)));
                self.last_error = None;
                self.set_status(format!("Opening {}", display_name(path)));
            }
            Err(e) => self.report_error("Failed to open media", e),
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match apply_event(&mut self.view, &event) {
                Some(Reaction::Arm) => {
                    self.surface.set_frame_ready_callback(Some(Arc::clone(&self.frame_ready)));
                    if let Some(path) = &self.view.media {
                        let name = display_name(path);
                        self.set_status(format!("Playing {name}"));
                    }
                }
                Some(Reaction::Disarm(reason)) => {
                    self.surface.set_frame_ready_callback(None);
                    match reason {
                        EndReason::Error(code) => {
                            self.last_error = Some(format!("Playback failed (engine error {code})"));
                        }
                        _ => self.set_status("Playback finished".to_string()),
                    }
                }
                None => {}
            }
        }
    }

    fn run_action(&mut self, action: ControlAction) {
        let result = match action {
            ControlAction::TogglePlay => self.service.toggle_pause(),
            ControlAction::Seek(ms) => self.service.seek(ms).map(|_| ()),
            ControlAction::SetVolume(volume) => self.service.set_volume(volume),
            ControlAction::ToggleMute => self.service.toggle_mute(),
        };
        if let Err(e) = result {
            self.report_error("Playback command failed", e);
        }
    }

    fn report_error(&mut self, what: &str, e: EngineError) {
        warn!(error = %e, "{what}");
        self.last_error = Some(format!("{what}: {e}"));
    }

    fn set_status(&mut self, msg: String) {
        info!("{msg}");
        self.status_message = Some((msg, Instant::now()));
    }

    // -----------------------------------------------------------------------
    // Keyboard shortcuts
    // -----------------------------------------------------------------------

    fn cycle_theme(&mut self, ctx: &egui::Context) {
        self.theme = theme::next_builtin(&self.theme.name);
        restyle(ctx, &mut self.icons, &self.theme);
        self.set_status(format!("Theme: {}", self.theme.name));
    }

    fn process_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }

        // T - next built-in theme
        if ctx.input(|i| i.key_pressed(egui::Key::T)) {
            self.cycle_theme(ctx);
        }

        // Transport keys need a duration
        if !self.view.has_duration() {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.controls.push(ControlAction::TogglePlay);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::M)) {
            self.controls.push(ControlAction::ToggleMute);
        }

        let step = if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft)) {
            -SEEK_STEP_MS
        } else if ctx.input(|i| i.key_pressed(egui::Key::ArrowRight)) {
            SEEK_STEP_MS
        } else {
            0
        };
        if step != 0 {
            if let Err(e) = self.service.seek_by(step) {
                self.report_error("Seek failed", e);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Panels
    // -----------------------------------------------------------------------

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        let fill = theme::to_color32(self.theme.palette.secondary_dark);
        let error = self.last_error.clone().or_else(|| self.surface.error());
        let stats = self.surface.stats();

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .frame(egui::Frame::NONE.fill(fill).inner_margin(egui::Margin::symmetric(8, 2)))
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.spacing_mut().item_spacing.x = 8.0;

                    if let Some(error) = &error {
                        if let Some(texture) = self.icons.icon(IconKind::Warning) {
                            let image = egui::Image::from_texture(egui::load::SizedTexture::from_handle(texture))
                                .fit_to_exact_size(egui::vec2(14.0, 14.0));
                            ui.add(image);
                        }
                        ui.label(egui::RichText::new(error).color(STATUS_ERROR).size(11.0));
                    } else if let Some((ref msg, when)) = self.status_message {
                        // Fades after 3 seconds
                        let elapsed = when.elapsed().as_secs_f32();
                        if elapsed < 3.0 {
                            let alpha = if elapsed > 2.0 {
                                ((3.0 - elapsed) * 255.0) as u8
                            } else {
                                255
                            };
                            let color = egui::Color32::from_rgba_unmultiplied(
                                STATUS_TEXT.r(),
                                STATUS_TEXT.g(),
                                STATUS_TEXT.b(),
                                alpha,
                            );
                            ui.label(egui::RichText::new(msg).color(color).size(11.0));
                            ctx.request_repaint();
                        }
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            egui::RichText::new(format!(
                                "frames {} / skipped {} / failed {}",
                                stats.rendered, stats.skipped, stats.failed
                            ))
                            .color(STATUS_TEXT)
                            .size(11.0),
                        );
                    });
                });
            });
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl eframe::App for LumenApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. Engine notifications
        self.drain_events();

        // 2. Dropped files and keyboard shortcuts
        let dropped = ctx.input(|i| i.raw.dropped_files.iter().find_map(|f| f.path.clone()));
        if let Some(path) = dropped {
            self.open_media(&path);
        }
        self.process_keyboard_shortcuts(ctx);

        // 3. Status bar at the very bottom
        self.show_status_bar(ctx);

        // 4. Transport controls above it
        egui::TopBottomPanel::bottom("controls")
            .exact_height(64.0)
            .show(ctx, |ui| {
                controls::show_controls(ui, &mut self.controls, &self.view, &mut self.icons);
            });

        // 5. Video fills the rest
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let response = self.surface.show(ui);
                if response.double_clicked() {
                    let fullscreen = ctx.input(|i| i.viewport().fullscreen.unwrap_or(false));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(!fullscreen));
                } else if response.clicked() && self.view.has_duration() {
                    self.controls.push(ControlAction::TogglePlay);
                }
            });

        // 6. Apply queued control actions
        for action in self.controls.drain_actions() {
            self.run_action(action);
        }

        if self.view.media.is_some() && !self.view.finished {
            ctx.request_repaint_after(IDLE_REPAINT);
        }
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        // Render path first: no callback may reach a released context.
        self.surface.shutdown(gl);
        self.service.close();
        info!("Lumen shut down");
    }
}
