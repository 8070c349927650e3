use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Vec2};
use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::components::history::{HistoryManager, SnapshotCommand};
use crate::io::{FileHandler, load_image_sync};
use crate::ops::dialogs::{
    ActiveDialog, DialogResult, ImageUpdated, ThresholdControls, ThresholdDialog,
};
use crate::settings::{AppSettings, ThemeMode};

pub struct ThresholdFEApp {
    settings: AppSettings,
    /// Where settings are written. `None` disables persistence.
    settings_path: Option<PathBuf>,
    file_handler: FileHandler,
    history: HistoryManager,
    active_dialog: ActiveDialog,
    /// Working image. Previews from the threshold dialog are written here.
    image: Option<RgbaImage>,
    texture: Option<egui::TextureHandle>,
    texture_dirty: bool,
    /// Unsaved changes since the last open/save.
    is_dirty: bool,
    status: String,
}

impl ThresholdFEApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let lang = if settings.language.is_empty() {
            crate::i18n::detect_system_language()
        } else {
            settings.language.clone()
        };
        crate::i18n::set_language(&lang);
        apply_theme(&cc.egui_ctx, settings.theme_mode);
        log_info!("Language: {}, theme: {:?}", lang, settings.theme_mode);

        let mut app = Self::with_settings(settings, AppSettings::settings_path());

        // A path given on the command line is opened straight away
        if let Some(arg) = std::env::args().nth(1) {
            let path = PathBuf::from(arg);
            if path.is_file() {
                app.load_path(&path);
            }
        }
        app
    }

    fn with_settings(settings: AppSettings, settings_path: Option<PathBuf>) -> Self {
        Self {
            history: HistoryManager::new(settings.max_undo_steps),
            file_handler: FileHandler::new(),
            active_dialog: ActiveDialog::None,
            image: None,
            texture: None,
            texture_dirty: false,
            is_dirty: false,
            status: t!("status.no_image"),
            settings,
            settings_path,
        }
    }

    fn save_settings(&self) {
        let Some(path) = self.settings_path.as_deref() else { return };
        if let Err(e) = self.settings.save_to(path) {
            log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    // ========================================================================
    // FILE + HISTORY ACTIONS
    // ========================================================================

    fn set_image(&mut self, image: RgbaImage, path: &Path) {
        log_info!("Opened {} ({}x{})", path.display(), image.width(), image.height());
        self.status = t!("status.opened", name = display_name(path), w = image.width(), h = image.height());
        self.image = Some(image);
        self.history.clear();
        self.texture_dirty = true;
        self.is_dirty = false;
    }

    fn load_path(&mut self, path: &Path) {
        match load_image_sync(path) {
            Ok(image) => {
                self.file_handler.current_path = Some(path.to_path_buf());
                self.set_image(image, path);
            }
            Err(e) => self.report_error(&format!("{}: {}", path.display(), e)),
        }
    }

    fn open_image(&mut self) {
        match self.file_handler.open_image() {
            Ok(Some((image, path))) => self.set_image(image, &path),
            Ok(None) => {}
            Err(e) => self.report_error(&e),
        }
    }

    fn save_image_as(&mut self) {
        let Some(image) = self.image.as_ref() else { return };
        let Some((path, format)) = self.file_handler.pick_save_path() else { return };
        match self
            .file_handler
            .save_image(image, &path, format, self.settings.jpeg_quality)
        {
            Ok(()) => {
                log_info!("Saved {} as {:?}", path.display(), format);
                self.status = t!("status.saved", name = display_name(&path));
                self.is_dirty = false;
            }
            Err(e) => self.report_error(&format!("{}: {}", path.display(), e)),
        }
    }

    fn undo(&mut self) {
        if let Some(image) = self.image.as_mut()
            && let Some(desc) = self.history.undo(image)
        {
            self.status = t!("status.undo", action = desc);
            self.texture_dirty = true;
            self.is_dirty = true;
        }
    }

    fn redo(&mut self) {
        if let Some(image) = self.image.as_mut()
            && let Some(desc) = self.history.redo(image)
        {
            self.status = t!("status.redo", action = desc);
            self.texture_dirty = true;
            self.is_dirty = true;
        }
    }

    fn report_error(&mut self, msg: &str) {
        log_err!("{}", msg);
        self.status = t!("status.error", msg = msg);
    }

    fn set_theme(&mut self, ctx: &egui::Context, mode: ThemeMode) {
        self.settings.theme_mode = mode;
        apply_theme(ctx, mode);
        self.save_settings();
    }

    // ========================================================================
    // THRESHOLD DIALOG
    // ========================================================================

    fn open_threshold_dialog(&mut self) {
        if !self.active_dialog.is_none() {
            return;
        }
        let Some(image) = self.image.as_mut() else { return };
        let mut dlg = ThresholdDialog::new(image.clone(), self.settings.threshold);
        let updated = dlg.preview(image);
        log_info!("Threshold dialog opened (code {})", dlg.kind().code());
        self.active_dialog = ActiveDialog::Threshold(dlg);
        self.image_updated(updated);
    }

    /// Drive the active dialog for one frame.
    fn show_active_dialog(&mut self, ctx: &egui::Context) {
        let ActiveDialog::Threshold(mut dlg) = std::mem::take(&mut self.active_dialog) else {
            return;
        };
        let result = dlg.show(ctx);
        self.handle_dialog_result(dlg, result);
    }

    /// Act on one frame's dialog result. OK records a history step and
    /// remembers the controls; Cancel rolls the preview back.
    fn handle_dialog_result(
        &mut self,
        mut dlg: ThresholdDialog,
        result: DialogResult<ThresholdControls>,
    ) {
        let Some(image) = self.image.as_mut() else { return };

        match result {
            DialogResult::Open => {
                self.active_dialog = ActiveDialog::Threshold(dlg);
            }
            DialogResult::Changed => {
                let updated = dlg.preview(image);
                self.active_dialog = ActiveDialog::Threshold(dlg);
                self.image_updated(updated);
            }
            DialogResult::Ok(controls) => {
                dlg.accept();
                let before = dlg.backup().clone();
                let updated = dlg.close(image);
                let after = image.clone();
                self.history
                    .push(Box::new(SnapshotCommand::new(t!("history.threshold"), before, after)));
                self.settings.threshold = controls;
                self.save_settings();
                self.is_dirty = true;
                self.image_updated(updated);
            }
            DialogResult::Cancel => {
                let updated = dlg.close(image);
                self.image_updated(updated);
            }
        }
    }

    /// Cancel any open dialog, rolling its preview back.
    fn cancel_active_dialog(&mut self) {
        if let ActiveDialog::Threshold(dlg) = std::mem::take(&mut self.active_dialog)
            && let Some(image) = self.image.as_mut()
        {
            let updated = dlg.close(image);
            self.image_updated(updated);
        }
    }

    fn image_updated(&mut self, updated: ImageUpdated) {
        self.texture_dirty = true;
        self.status = if updated.reverted {
            t!("status.threshold_reverted")
        } else {
            t!("status.threshold_level", level = updated.level)
        };
    }

    // ========================================================================
    // UI
    // ========================================================================

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let no_dialog = self.active_dialog.is_none();
        let (open, save, undo, redo, thresh) = ctx.input_mut(|i| {
            (
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::O),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::S),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::T),
            )
        });
        if !no_dialog {
            return;
        }
        if open {
            self.open_image();
        }
        if save {
            self.save_image_as();
        }
        if undo {
            self.undo();
        }
        if redo {
            self.redo();
        }
        if thresh {
            self.open_threshold_dialog();
        }

        let dropped: Option<PathBuf> = ctx.input(|i| i.raw.dropped_files.iter().find_map(|f| f.path.clone()));
        if let Some(path) = dropped {
            self.load_path(&path);
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        let no_dialog = self.active_dialog.is_none();
        let has_image = self.image.is_some();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button(t!("menu.file"), |ui| {
                    if ui.add_enabled(no_dialog, egui::Button::new(t!("menu.file.open"))).clicked() {
                        self.open_image();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(no_dialog && has_image, egui::Button::new(t!("menu.file.save_as")))
                        .clicked()
                    {
                        self.save_image_as();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button(t!("menu.file.quit")).clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close_menu();
                    }
                });

                ui.menu_button(t!("menu.edit"), |ui| {
                    if ui
                        .add_enabled(no_dialog && self.history.can_undo(), egui::Button::new(t!("menu.edit.undo")))
                        .clicked()
                    {
                        self.undo();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(no_dialog && self.history.can_redo(), egui::Button::new(t!("menu.edit.redo")))
                        .clicked()
                    {
                        self.redo();
                        ui.close_menu();
                    }
                });

                ui.menu_button(t!("menu.image"), |ui| {
                    if ui
                        .add_enabled(no_dialog && has_image, egui::Button::new(t!("menu.image.threshold")))
                        .clicked()
                    {
                        self.open_threshold_dialog();
                        ui.close_menu();
                    }
                });

                ui.menu_button(t!("menu.view"), |ui| {
                    let mut mode = self.settings.theme_mode;
                    ui.radio_value(&mut mode, ThemeMode::Light, t!("menu.view.light"));
                    ui.radio_value(&mut mode, ThemeMode::Dark, t!("menu.view.dark"));
                    if mode != self.settings.theme_mode {
                        self.set_theme(ctx, mode);
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty {
            return;
        }
        self.texture_dirty = false;
        let Some(image) = self.image.as_ref() else {
            self.texture = None;
            return;
        };
        let size = [image.width() as usize, image.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
        match self.texture.as_mut() {
            Some(tex) => tex.set(color_image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("working_image", color_image, egui::TextureOptions::NEAREST));
            }
        }
    }

    fn central_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status.as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!(
                        "{} {} / {} {}",
                        t!("status.undo_count"),
                        self.history.undo_count(),
                        t!("status.redo_count"),
                        self.history.redo_count()
                    ));
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(tex) = self.texture.as_ref() else {
                ui.centered_and_justified(|ui| {
                    ui.label(t!("status.drop_hint"));
                });
                return;
            };
            let avail = ui.available_size();
            let size = fit_size(tex.size_vec2(), avail);
            let (rect, _) = ui.allocate_exact_size(avail, Sense::hover());
            let img_rect = Rect::from_center_size(rect.center(), size);
            ui.painter().image(
                tex.id(),
                img_rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        });
    }
}

impl eframe::App for ThresholdFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let title = match (&self.file_handler.current_path, self.is_dirty) {
            (Some(p), dirty) => format!("ThresholdFE - {}{}", display_name(p), if dirty { "*" } else { "" }),
            (None, _) => "ThresholdFE".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        // Closing the main window while previewing discards the preview
        if ctx.input(|i| i.viewport().close_requested()) {
            self.cancel_active_dialog();
        }

        self.handle_shortcuts(ctx);
        self.menu_bar(ctx);
        self.show_active_dialog(ctx);
        self.refresh_texture(ctx);
        self.central_panel(ctx);
    }
}

fn apply_theme(ctx: &egui::Context, mode: ThemeMode) {
    ctx.set_visuals(match mode {
        ThemeMode::Light => egui::Visuals::light(),
        ThemeMode::Dark => egui::Visuals::dark(),
    });
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Largest size with `content`'s aspect ratio that fits in `avail`, never upscaled.
fn fit_size(content: Vec2, avail: Vec2) -> Vec2 {
    if content.x <= 0.0 || content.y <= 0.0 {
        return Vec2::ZERO;
    }
    let scale = (avail.x / content.x).min(avail.y / content.y).min(1.0).max(0.0);
    content * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::dialogs::BaseMode;
    use image::Rgba;

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(4, 1, |x, _| {
            let v = (x * 80) as u8;
            Rgba([v, v, v, 255])
        })
    }

    /// App with an image loaded and the threshold dialog open.
    fn app_with_dialog(settings_path: PathBuf) -> (ThresholdFEApp, ThresholdDialog) {
        let mut app = ThresholdFEApp::with_settings(AppSettings::default(), Some(settings_path));
        app.image = Some(gradient());
        app.open_threshold_dialog();
        let ActiveDialog::Threshold(dlg) = std::mem::take(&mut app.active_dialog) else {
            panic!("threshold dialog did not open");
        };
        (app, dlg)
    }

    #[test]
    fn ok_pushes_one_history_step_and_saves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("thresholdfe_settings.cfg");
        let (mut app, mut dlg) = app_with_dialog(cfg.clone());

        assert!(dlg.controls.select_mode(BaseMode::ToZero));
        assert!(dlg.controls.set_level(100));
        app.handle_dialog_result(dlg, DialogResult::Changed);
        let ActiveDialog::Threshold(dlg) = std::mem::take(&mut app.active_dialog) else {
            panic!("dialog closed on a preview");
        };
        let controls = dlg.controls;
        app.handle_dialog_result(dlg, DialogResult::Ok(controls));

        assert!(app.active_dialog.is_none());
        assert_eq!(app.history.undo_count(), 1);
        let reds: Vec<u8> = app.image.as_ref().unwrap().pixels().map(|p| p.0[0]).collect();
        assert_eq!(reds, vec![0, 0, 160, 240]);
        assert_eq!(AppSettings::load_from(&cfg).threshold, controls);

        app.undo();
        assert_eq!(app.image.as_ref(), Some(&gradient()));
    }

    #[test]
    fn cancel_restores_image_and_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("thresholdfe_settings.cfg");
        let (mut app, mut dlg) = app_with_dialog(cfg.clone());

        assert!(dlg.controls.set_level(10));
        app.handle_dialog_result(dlg, DialogResult::Changed);
        assert_ne!(app.image.as_ref(), Some(&gradient()));
        let ActiveDialog::Threshold(dlg) = std::mem::take(&mut app.active_dialog) else {
            panic!("dialog closed on a preview");
        };
        app.handle_dialog_result(dlg, DialogResult::Cancel);

        assert!(app.active_dialog.is_none());
        assert_eq!(app.history.undo_count(), 0);
        assert_eq!(app.image.as_ref(), Some(&gradient()));
        assert!(!cfg.exists());
    }

    #[test]
    fn closing_the_window_cancels_the_preview() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, dlg) = app_with_dialog(dir.path().join("s.cfg"));
        app.active_dialog = ActiveDialog::Threshold(dlg);
        assert_ne!(app.image.as_ref(), Some(&gradient()));

        app.cancel_active_dialog();
        assert!(app.active_dialog.is_none());
        assert_eq!(app.history.undo_count(), 0);
        assert_eq!(app.image.as_ref(), Some(&gradient()));
    }

    #[test]
    fn fit_keeps_aspect_and_never_upscales() {
        assert_eq!(fit_size(Vec2::new(100.0, 50.0), Vec2::new(1000.0, 1000.0)), Vec2::new(100.0, 50.0));
        assert_eq!(fit_size(Vec2::new(400.0, 200.0), Vec2::new(200.0, 200.0)), Vec2::new(200.0, 100.0));
        assert_eq!(fit_size(Vec2::ZERO, Vec2::new(10.0, 10.0)), Vec2::ZERO);
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/tmp/scan.png")), "scan.png");
    }
}
