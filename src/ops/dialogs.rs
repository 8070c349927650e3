// ============================================================================
// OPS DIALOG SYSTEM - modal threshold dialog with live preview
// ============================================================================
//
// Design principles:
//   - Accent-colored header strip with icon + title
//   - Consistent section layout with labeled groups
//   - Widget state kept as plain data so the rules can be exercised headless
//   - Every relevant change re-thresholds backup -> working immediately
// ============================================================================

use eframe::egui;
use egui::{Color32, Pos2, Rect, Rounding, Sense, Stroke, Vec2};
use image::RgbaImage;

use super::adjustments::{self, ThresholdKind, ThresholdType};

/// Max value handed to the threshold primitive by the dialog.
pub const THRESHOLD_MAX_VALUE: u8 = 255;

// ============================================================================
// ACTIVE-DIALOG ENUM - at most one modal dialog is open at a time
// ============================================================================

#[derive(Default)]
pub enum ActiveDialog {
    #[default]
    None,
    Threshold(ThresholdDialog),
}

impl ActiveDialog {
    /// Returns true if no dialog is currently open.
    pub fn is_none(&self) -> bool {
        matches!(self, ActiveDialog::None)
    }
}

/// Result returned by each dialog's `show()` method every frame.
#[derive(Debug, PartialEq)]
pub enum DialogResult<T> {
    /// Dialog is still open, no action needed this frame.
    Open,
    /// A parameter changed - caller should apply live preview.
    Changed,
    /// User clicked OK - contains the final values.
    Ok(T),
    /// User clicked Cancel (or pressed Escape).
    Cancel,
}

/// Emitted after every threshold application and once more on close, so the
/// owner can refresh whatever displays the working image.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageUpdated {
    /// Level the primitive actually used (the Otsu level when auto).
    pub level: u8,
    /// True when the working image was rolled back to the backup.
    pub reverted: bool,
}

// ============================================================================
// SHARED DIALOG STYLING HELPERS
// ============================================================================

/// Colors extracted from the current egui visuals for dialog rendering.
pub(crate) struct DialogColors {
    pub accent: Color32,
    pub accent_faint: Color32,
    pub text_muted: Color32,
    pub separator: Color32,
    pub is_dark: bool,
}

impl DialogColors {
    pub(crate) fn from_ctx(ctx: &egui::Context) -> Self {
        let v = ctx.style().visuals.clone();
        let accent = v.selection.stroke.color;
        let is_dark = v.dark_mode;
        let alpha = if is_dark { 35 } else { 25 };
        let accent_faint =
            Color32::from_rgba_unmultiplied(accent.r(), accent.g(), accent.b(), alpha);
        // In dark mode, boost muted text so labels stay readable
        let text_muted = if is_dark {
            Color32::from_gray(160)
        } else {
            v.weak_text_color()
        };
        Self {
            accent,
            accent_faint,
            text_muted,
            separator: v.widgets.noninteractive.bg_stroke.color,
            is_dark,
        }
    }
}

/// Paint the accent header bar with icon + title.
pub(crate) fn paint_dialog_header(ui: &mut egui::Ui, colors: &DialogColors, icon: &str, title: &str) {
    let available_width = ui.available_width();
    let header_height = 32.0;
    let (rect, _) = ui.allocate_exact_size(Vec2::new(available_width, header_height), Sense::hover());

    let painter = ui.painter();
    painter.rect_filled(rect, Rounding::ZERO, colors.accent_faint);
    painter.rect_filled(
        Rect::from_min_size(rect.min, Vec2::new(3.0, header_height)),
        Rounding::ZERO,
        colors.accent,
    );
    painter.text(
        Pos2::new(rect.min.x + 12.0, rect.center().y),
        egui::Align2::LEFT_CENTER,
        format!("{} {}", icon, title),
        egui::FontId::proportional(14.0),
        colors.accent,
    );
}

/// Styled section label (small caps feel).
pub(crate) fn section_label(ui: &mut egui::Ui, colors: &DialogColors, text: &str) {
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.add_space(2.0);
        ui.label(egui::RichText::new(text).size(11.0).color(colors.text_muted).strong());
    });
    ui.add_space(2.0);
}

/// Thin separator line using accent color (very faint).
pub(crate) fn accent_separator(ui: &mut egui::Ui, colors: &DialogColors) {
    let available_width = ui.available_width();
    let (rect, _) = ui.allocate_exact_size(Vec2::new(available_width, 1.0), Sense::hover());
    ui.painter().rect_filled(rect, 0.0, colors.accent_faint);
}

/// Styled OK / Cancel footer. Returns (ok_clicked, cancel_clicked).
pub(crate) fn dialog_footer(ui: &mut egui::Ui, colors: &DialogColors) -> (bool, bool) {
    let mut ok = false;
    let mut cancel = false;
    ui.add_space(4.0);
    accent_separator(ui, colors);
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button(t!("common.cancel")).clicked() {
                cancel = true;
            }
            let ok_label = format!("  {}  ", t!("common.ok"));
            let ok_btn = egui::Button::new(egui::RichText::new(ok_label).color(Color32::WHITE).strong())
                .fill(colors.accent);
            if ui.add(ok_btn).clicked() {
                ok = true;
            }
        });
    });
    (ok, cancel)
}

// ============================================================================
// THRESHOLD CONTROLS - radio group + modifiers + level slider
// ============================================================================

/// The three mutually exclusive base modes offered by the radio group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BaseMode {
    #[default]
    Normal,
    Truncate,
    ToZero,
}

impl BaseMode {
    pub const ALL: [BaseMode; 3] = [BaseMode::Normal, BaseMode::Truncate, BaseMode::ToZero];

    pub fn label(self) -> String {
        match self {
            BaseMode::Normal => t!("threshold.mode.normal"),
            BaseMode::Truncate => t!("threshold.mode.truncate"),
            BaseMode::ToZero => t!("threshold.mode.to_zero"),
        }
    }

    /// Stable identifier used by the settings file and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            BaseMode::Normal => "binary",
            BaseMode::Truncate => "truncate",
            BaseMode::ToZero => "to-zero",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "normal" => Some(BaseMode::Normal),
            "truncate" | "trunc" => Some(BaseMode::Truncate),
            "to-zero" | "tozero" | "to_zero" => Some(BaseMode::ToZero),
            _ => None,
        }
    }
}

/// Widget state of the threshold dialog.
///
/// The setters mirror widget events and return `true` when the change should
/// trigger a new threshold application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdControls {
    pub mode: BaseMode,
    pub inverted: bool,
    pub otsu: bool,
    pub level: u8,
}

impl Default for ThresholdControls {
    fn default() -> Self {
        Self {
            mode: BaseMode::Normal,
            inverted: false,
            otsu: false,
            level: 128,
        }
    }
}

impl ThresholdControls {
    /// Builds controls from possibly inconsistent stored values, enforcing the
    /// truncate/invert rule.
    pub fn new(mode: BaseMode, inverted: bool, otsu: bool, level: u8) -> Self {
        let mut controls = Self { mode, inverted, otsu, level };
        if mode == BaseMode::Truncate {
            controls.inverted = false;
        }
        controls
    }

    /// Threshold kind derived from the current widget state.
    pub fn kind(&self) -> ThresholdKind {
        let ty = match self.mode {
            BaseMode::Normal if self.inverted => ThresholdType::BinaryInv,
            BaseMode::Normal => ThresholdType::Binary,
            BaseMode::Truncate => ThresholdType::Trunc,
            BaseMode::ToZero if self.inverted => ThresholdType::ToZeroInv,
            BaseMode::ToZero => ThresholdType::ToZero,
        };
        ThresholdKind::new(ty, self.otsu)
    }

    /// The invert checkbox is disabled while truncate is selected.
    pub fn invert_enabled(&self) -> bool {
        self.mode != BaseMode::Truncate
    }

    /// The level slider is disabled while Otsu picks the level.
    pub fn slider_enabled(&self) -> bool {
        !self.otsu
    }

    /// Radio button selected. Re-selecting the current mode is a no-op.
    pub fn select_mode(&mut self, mode: BaseMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        if mode == BaseMode::Truncate {
            self.inverted = false;
        }
        true
    }

    pub fn set_inverted(&mut self, inverted: bool) -> bool {
        if !self.invert_enabled() || self.inverted == inverted {
            return false;
        }
        self.inverted = inverted;
        true
    }

    pub fn set_otsu(&mut self, otsu: bool) -> bool {
        if self.otsu == otsu {
            return false;
        }
        self.otsu = otsu;
        true
    }

    /// Slider moved. Ignored while the slider is disabled.
    pub fn set_level(&mut self, level: u8) -> bool {
        if !self.slider_enabled() || self.level == level {
            return false;
        }
        self.level = level;
        true
    }
}

// ============================================================================
// THRESHOLD DIALOG
// ============================================================================

pub struct ThresholdDialog {
    pub controls: ThresholdControls,
    /// Snapshot taken before editing began. Source of every preview.
    backup: RgbaImage,
    histogram: [u32; 256],
    hist_max: u32,
    accepted: bool,
    applied_level: u8,
}

impl ThresholdDialog {
    pub fn new(backup: RgbaImage, controls: ThresholdControls) -> Self {
        let histogram = adjustments::compute_histogram(&backup);
        let hist_max = histogram.iter().copied().max().unwrap_or(1).max(1);
        Self {
            applied_level: controls.level,
            controls,
            backup,
            histogram,
            hist_max,
            accepted: false,
        }
    }

    pub fn backup(&self) -> &RgbaImage {
        &self.backup
    }

    pub fn histogram(&self) -> &[u32; 256] {
        &self.histogram
    }

    pub fn kind(&self) -> ThresholdKind {
        self.controls.kind()
    }

    /// Level used by the last application.
    pub fn applied_level(&self) -> u8 {
        self.applied_level
    }

    /// Threshold the backup into `working` using the current controls.
    pub fn preview(&mut self, working: &mut RgbaImage) -> ImageUpdated {
        self.applied_level = adjustments::threshold(
            &self.backup,
            working,
            self.controls.level,
            THRESHOLD_MAX_VALUE,
            self.controls.kind(),
        );
        ImageUpdated { level: self.applied_level, reverted: false }
    }

    /// Mark the edit as confirmed; `close` will keep the working image.
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    /// Finalize the dialog. Unless accepted, the backup is copied back over
    /// `working`.
    pub fn close(self, working: &mut RgbaImage) -> ImageUpdated {
        let reverted = !self.accepted;
        if reverted {
            *working = self.backup;
            log_info!("Threshold cancelled, image restored");
        } else {
            log_info!(
                "Threshold applied (code {}, level {})",
                self.controls.kind().code(),
                self.applied_level
            );
        }
        ImageUpdated { level: self.applied_level, reverted }
    }

    /// Draw the dialog. Returns `Changed` whenever a control change requires a
    /// new preview.
    pub fn show(&mut self, ctx: &egui::Context) -> DialogResult<ThresholdControls> {
        let mut result = DialogResult::Open;
        let colors = DialogColors::from_ctx(ctx);

        egui::Window::new("dialog_threshold")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .default_pos(egui::pos2(ctx.screen_rect().center().x - 170.0, 60.0))
            .show(ctx, |ui| {
                ui.set_min_width(340.0);
                paint_dialog_header(ui, &colors, "◑", &t!("dialog.threshold"));
                ui.add_space(4.0);

                section_label(ui, &colors, &t!("threshold.section.histogram"));
                self.paint_histogram(ui, &colors);

                let mut changed = false;

                section_label(ui, &colors, &t!("threshold.section.mode"));
                let mut mode = self.controls.mode;
                ui.horizontal(|ui| {
                    for m in BaseMode::ALL {
                        ui.radio_value(&mut mode, m, m.label());
                    }
                });
                changed |= self.controls.select_mode(mode);

                ui.horizontal(|ui| {
                    let mut inverted = self.controls.inverted;
                    let r = ui.add_enabled(
                        self.controls.invert_enabled(),
                        egui::Checkbox::new(&mut inverted, t!("threshold.inverted")),
                    );
                    if r.changed() {
                        changed |= self.controls.set_inverted(inverted);
                    }

                    let mut otsu = self.controls.otsu;
                    if ui.checkbox(&mut otsu, t!("threshold.otsu")).changed() {
                        changed |= self.controls.set_otsu(otsu);
                    }
                });

                accent_separator(ui, &colors);
                section_label(ui, &colors, &t!("threshold.section.level"));
                egui::Grid::new("threshold_params")
                    .num_columns(2)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        ui.label(t!("threshold.level"));
                        let mut level = self.controls.level;
                        let r = ui.add_enabled(
                            self.controls.slider_enabled(),
                            egui::Slider::new(&mut level, 0..=255),
                        );
                        if r.changed() {
                            changed |= self.controls.set_level(level);
                        }
                        ui.end_row();
                    });
                if self.controls.otsu {
                    ui.label(
                        egui::RichText::new(t!("threshold.otsu_level", level = self.applied_level))
                            .size(11.0)
                            .color(colors.text_muted),
                    );
                }

                if changed {
                    result = DialogResult::Changed;
                }

                let (ok, cancel) = dialog_footer(ui, &colors);
                if ok {
                    result = DialogResult::Ok(self.controls);
                }
                if cancel {
                    result = DialogResult::Cancel;
                }
            });

        if matches!(result, DialogResult::Open) && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            result = DialogResult::Cancel;
        }
        result
    }

    /// Log-scaled luminance bars with a red marker at the active level.
    fn paint_histogram(&self, ui: &mut egui::Ui, colors: &DialogColors) {
        let hist_height = 80.0;
        let hist_rect = ui.allocate_space(Vec2::new(ui.available_width(), hist_height)).1;
        let painter = ui.painter();
        painter.rect_filled(
            hist_rect,
            Rounding::same(3.0),
            if colors.is_dark { Color32::from_gray(30) } else { Color32::from_gray(240) },
        );

        let bar_w = hist_rect.width() / 256.0;
        let log_max = (self.hist_max as f32).ln().max(1.0);
        for (i, &count) in self.histogram.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let h = ((count as f32).ln().max(0.0) / log_max * hist_height).clamp(1.0, hist_height);
            let x = hist_rect.min.x + i as f32 * bar_w;
            let bar = Rect::from_min_max(
                Pos2::new(x, hist_rect.max.y - h),
                Pos2::new(x + bar_w.max(1.0), hist_rect.max.y),
            );
            painter.rect_filled(bar, 0.0, colors.accent.linear_multiply(0.7));
        }

        let marker_level = if self.controls.otsu { self.applied_level } else { self.controls.level };
        let marker_x = hist_rect.min.x + marker_x_fraction(marker_level) * hist_rect.width();
        painter.vline(marker_x, hist_rect.y_range(), Stroke::new(1.5, Color32::RED));
        painter.rect_stroke(hist_rect, Rounding::same(3.0), Stroke::new(1.0, colors.separator));
    }
}

/// Marker position on a 0..256 axis, centred on the level's bin.
fn marker_x_fraction(level: u8) -> f32 {
    (level as f32 + 0.5) / 256.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = ((x * 7 + y * 13) % 256) as u8;
            Rgba([v, v.wrapping_add(40), v / 2, 255])
        })
    }

    fn expected(src: &RgbaImage, controls: ThresholdControls) -> RgbaImage {
        let mut out = RgbaImage::new(1, 1);
        adjustments::threshold(src, &mut out, controls.level, 255, controls.kind());
        out
    }

    #[test]
    fn kind_mapping() {
        let mut c = ThresholdControls::default();
        assert_eq!(c.kind(), ThresholdKind::new(ThresholdType::Binary, false));
        c.set_inverted(true);
        assert_eq!(c.kind().ty, ThresholdType::BinaryInv);
        c.select_mode(BaseMode::ToZero);
        assert_eq!(c.kind().ty, ThresholdType::ToZero);
        c.set_inverted(true);
        assert_eq!(c.kind().ty, ThresholdType::ToZeroInv);
        c.set_otsu(true);
        assert_eq!(c.kind(), ThresholdKind::new(ThresholdType::ToZeroInv, true));
    }

    #[test]
    fn truncate_clears_and_disables_invert() {
        let mut c = ThresholdControls::default();
        c.set_inverted(true);
        assert!(c.select_mode(BaseMode::Truncate));
        assert!(!c.inverted);
        assert!(!c.invert_enabled());
        assert!(!c.set_inverted(true));
        assert!(!c.inverted);
        assert_eq!(c.kind().ty, ThresholdType::Trunc);

        c.select_mode(BaseMode::Normal);
        assert!(c.invert_enabled());
        assert!(!c.inverted);
        assert!(!ThresholdControls::new(BaseMode::Truncate, true, false, 9).inverted);
    }

    #[test]
    fn otsu_disables_slider() {
        let mut c = ThresholdControls::default();
        assert!(c.set_otsu(true));
        assert!(!c.slider_enabled());
        assert!(!c.set_level(12));
        assert_eq!(c.level, 128);
        c.set_otsu(false);
        assert!(c.set_level(12));
    }

    #[test]
    fn reselecting_mode_is_noop() {
        let mut c = ThresholdControls::default();
        assert!(!c.select_mode(BaseMode::Normal));
        assert!(!c.set_otsu(false));
        assert!(!c.set_level(128));
    }

    #[test]
    fn cancel_restores_backup() {
        let original = gradient(17, 9);
        let mut working = original.clone();
        let mut dlg = ThresholdDialog::new(original.clone(), ThresholdControls::default());
        let _ = dlg.preview(&mut working);
        dlg.controls.select_mode(BaseMode::ToZero);
        dlg.controls.set_level(40);
        let _ = dlg.preview(&mut working);
        assert_ne!(working, original);

        let upd = dlg.close(&mut working);
        assert!(upd.reverted);
        assert_eq!(working, original);
    }

    #[test]
    fn accept_keeps_last_preview() {
        let original = gradient(11, 11);
        let mut working = original.clone();
        let mut dlg = ThresholdDialog::new(original.clone(), ThresholdControls::default());
        let _ = dlg.preview(&mut working);
        dlg.controls.set_level(90);
        dlg.controls.set_inverted(true);
        let _ = dlg.preview(&mut working);
        let controls = dlg.controls;

        dlg.accept();
        let upd = dlg.close(&mut working);
        assert!(!upd.reverted);
        assert_eq!(upd.level, 90);
        assert_eq!(working, expected(&original, controls));
    }

    #[test]
    fn otsu_preview_ignores_slider_value() {
        let original = gradient(32, 8);
        let mut a = original.clone();
        let mut b = original.clone();

        let mut low = ThresholdControls::default();
        low.set_level(3);
        low.set_otsu(true);
        let mut high = ThresholdControls::default();
        high.set_level(250);
        high.set_otsu(true);

        let up_a = ThresholdDialog::new(original.clone(), low).preview(&mut a);
        let up_b = ThresholdDialog::new(original.clone(), high).preview(&mut b);
        assert_eq!(a, b);
        assert_eq!(up_a.level, up_b.level);
        assert_eq!(up_a.level, adjustments::otsu_level(&original));
    }

    #[test]
    fn previews_always_start_from_backup() {
        let original = gradient(8, 8);
        let mut working = original.clone();
        let mut dlg = ThresholdDialog::new(original.clone(), ThresholdControls::default());
        dlg.controls.select_mode(BaseMode::Truncate);
        dlg.controls.set_level(10);
        let _ = dlg.preview(&mut working);
        dlg.controls.set_level(200);
        let _ = dlg.preview(&mut working);
        assert_eq!(working, expected(&original, dlg.controls));
    }

    #[test]
    fn histogram_comes_from_backup() {
        let original = gradient(5, 5);
        let dlg = ThresholdDialog::new(original.clone(), ThresholdControls::default());
        assert_eq!(dlg.histogram(), &adjustments::compute_histogram(&original));
        assert_eq!(dlg.histogram().iter().sum::<u32>(), 25);
    }

    #[test]
    fn marker_sits_mid_bin() {
        assert_eq!(marker_x_fraction(0), 0.5 / 256.0);
        assert_eq!(marker_x_fraction(255), 255.5 / 256.0);
    }

    #[test]
    fn base_mode_names_round_trip() {
        for m in BaseMode::ALL {
            assert_eq!(BaseMode::parse(m.as_str()), Some(m));
        }
        assert_eq!(BaseMode::parse("TRUNC"), Some(BaseMode::Truncate));
        assert_eq!(BaseMode::parse("otsu"), None);
    }

    #[test]
    fn idle_frame_stays_open() {
        let ctx = egui::Context::default();
        let mut dlg = ThresholdDialog::new(gradient(4, 4), ThresholdControls::default());
        let mut result = None;
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            result = Some(dlg.show(ctx));
        });
        assert_eq!(result, Some(DialogResult::Open));
    }
}
