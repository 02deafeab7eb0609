use std::collections::BTreeMap;

use egui::{Color32, CornerRadius, Stroke};
use serde::{Deserialize, Serialize};

use lm_common::Rgba;

// ---------------------------------------------------------------------------
// Palettes
// ---------------------------------------------------------------------------

/// Material-style palette. Icons are tinted with `secondary_text`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePalette {
    pub dark: bool,
    pub primary: Rgba,
    pub primary_light: Rgba,
    pub secondary: Rgba,
    pub secondary_light: Rgba,
    pub secondary_dark: Rgba,
    pub primary_text: Rgba,
    pub secondary_text: Rgba,
}

/// A palette with the name it was selected by.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub name: String,
    pub palette: ThemePalette,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown theme {name:?} (built-in themes: {available})")]
pub struct UnknownTheme {
    pub name: String,
    pub available: String,
}

/// Accent colors of the built-in themes: (name, dark accent, light accent).
const ACCENTS: &[(&str, Rgba, Rgba)] = &[
    ("amber", Rgba::rgb(0xff, 0xd7, 0x40), Rgba::rgb(0xff, 0xc4, 0x00)),
    ("blue", Rgba::rgb(0x44, 0x8a, 0xff), Rgba::rgb(0x29, 0x79, 0xff)),
    ("cyan", Rgba::rgb(0x4d, 0xd0, 0xe1), Rgba::rgb(0x00, 0xe5, 0xff)),
    ("lightgreen", Rgba::rgb(0x8b, 0xc3, 0x4a), Rgba::rgb(0x64, 0xdd, 0x17)),
    ("pink", Rgba::rgb(0xff, 0x40, 0x81), Rgba::rgb(0xff, 0x40, 0x81)),
    ("purple", Rgba::rgb(0xab, 0x47, 0xbc), Rgba::rgb(0xe0, 0x40, 0xfb)),
    ("red", Rgba::rgb(0xff, 0x17, 0x44), Rgba::rgb(0xff, 0x17, 0x44)),
    ("teal", Rgba::rgb(0x1d, 0xe9, 0xb6), Rgba::rgb(0x1d, 0xe9, 0xb6)),
    ("yellow", Rgba::rgb(0xff, 0xff, 0x00), Rgba::rgb(0xff, 0xea, 0x00)),
];

/// Strip the `.xml` suffix legacy theme names carry.
pub fn normalize_name(name: &str) -> &str {
    name.strip_suffix(".xml").unwrap_or(name)
}

/// Names of every built-in theme, dark ones first.
pub fn builtin_names() -> Vec<String> {
    ["dark", "light"]
        .iter()
        .flat_map(|variant| ACCENTS.iter().map(move |(accent, ..)| format!("{variant}_{accent}")))
        .collect()
}

/// The built-in theme after `current`, wrapping around. Custom or unknown
/// names start over at the first built-in.
pub fn next_builtin(current: &str) -> Theme {
    let names = builtin_names();
    let current = normalize_name(current);
    let next = names
        .iter()
        .position(|n| n == current)
        .map_or(0, |i| (i + 1) % names.len());
    let name = names[next].clone();
    let palette = builtin(&name).unwrap_or(FALLBACK);
    Theme { name, palette }
}

/// Built-in palette by (normalized) name.
pub fn builtin(name: &str) -> Option<ThemePalette> {
    let name = normalize_name(name);
    let (dark, accent) = if let Some(accent) = name.strip_prefix("dark_") {
        (true, accent)
    } else if let Some(accent) = name.strip_prefix("light_") {
        (false, accent)
    } else {
        return None;
    };

    let &(_, dark_primary, light_primary) = ACCENTS.iter().find(|(n, ..)| *n == accent)?;
    Some(if dark {
        ThemePalette {
            dark: true,
            primary: dark_primary,
            primary_light: lighten(dark_primary),
            secondary: Rgba::rgb(0x23, 0x26, 0x29),
            secondary_light: Rgba::rgb(0x4f, 0x5b, 0x62),
            secondary_dark: Rgba::rgb(0x31, 0x36, 0x3b),
            primary_text: Rgba::BLACK,
            secondary_text: Rgba::WHITE,
        }
    } else {
        ThemePalette {
            dark: false,
            primary: light_primary,
            primary_light: lighten(light_primary),
            secondary: Rgba::rgb(0xf5, 0xf5, 0xf5),
            secondary_light: Rgba::WHITE,
            secondary_dark: Rgba::rgb(0xe6, 0xe6, 0xe6),
            primary_text: Rgba::BLACK,
            secondary_text: Rgba::rgb(0x55, 0x55, 0x55),
        }
    })
}

/// Look a theme up among custom palettes first, then built-ins.
pub fn resolve(name: &str, custom: &BTreeMap<String, ThemePalette>) -> Result<Theme, UnknownTheme> {
    let normalized = normalize_name(name);
    custom
        .get(normalized)
        .copied()
        .or_else(|| builtin(normalized))
        .map(|palette| Theme {
            name: normalized.to_string(),
            palette,
        })
        .ok_or_else(|| UnknownTheme {
            name: name.to_string(),
            available: builtin_names().join(", "),
        })
}

/// `dark_teal`, used if a built-in name ever fails to resolve.
const FALLBACK: ThemePalette = ThemePalette {
    dark: true,
    primary: Rgba::rgb(0x1d, 0xe9, 0xb6),
    primary_light: Rgba::rgb(0x68, 0xf0, 0xce),
    secondary: Rgba::rgb(0x23, 0x26, 0x29),
    secondary_light: Rgba::rgb(0x4f, 0x5b, 0x62),
    secondary_dark: Rgba::rgb(0x31, 0x36, 0x3b),
    primary_text: Rgba::BLACK,
    secondary_text: Rgba::WHITE,
};

fn lighten(c: Rgba) -> Rgba {
    let mix = |v: u8| v + (0xff - v) / 3;
    Rgba::rgb(mix(c.r), mix(c.g), mix(c.b))
}

pub fn to_color32(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

// ---------------------------------------------------------------------------
// egui styling
// ---------------------------------------------------------------------------

/// Apply `theme` to every widget drawn by `ctx`.
pub fn apply_theme(ctx: &egui::Context, theme: &Theme) {
    let p = &theme.palette;
    let mut visuals = if p.dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };

    let primary = to_color32(p.primary);
    let text = to_color32(p.secondary_text);

    visuals.override_text_color = Some(text);
    visuals.panel_fill = to_color32(p.secondary);
    visuals.window_fill = to_color32(p.secondary);
    visuals.extreme_bg_color = to_color32(p.secondary_dark);
    visuals.faint_bg_color = to_color32(p.secondary_dark);
    visuals.selection.bg_fill = primary;
    visuals.selection.stroke = Stroke::new(1.0, to_color32(p.primary_text));
    visuals.hyperlink_color = primary;
    visuals.slider_trailing_fill = true;

    visuals.widgets.inactive.bg_fill = to_color32(p.secondary_dark);
    visuals.widgets.inactive.weak_bg_fill = Color32::TRANSPARENT;
    visuals.widgets.hovered.weak_bg_fill = to_color32(p.secondary_light);
    visuals.widgets.hovered.bg_fill = to_color32(p.secondary_light);
    visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, primary);
    visuals.widgets.active.bg_fill = to_color32(p.primary_light);
    visuals.widgets.active.weak_bg_fill = to_color32(p.primary_light);

    for widget in [
        &mut visuals.widgets.inactive,
        &mut visuals.widgets.hovered,
        &mut visuals.widgets.active,
    ] {
        widget.corner_radius = CornerRadius::same(4);
    }

    ctx.set_visuals(visuals);
}
