// src/app/ui/settings.rs
use eframe::egui as eg;
use rfd::FileDialog;

impl crate::app::CinedexApp {
    // ---------- SETTINGS WINDOW ----------
    pub(crate) fn ui_render_settings_window(&mut self, ctx: &eg::Context) {
        if !self.show_settings {
            return;
        }

        let mut open = self.show_settings;
        let mut save = false;
        let mut prune = false;
        eg::Window::new("Settings")
            .collapsible(false)
            .resizable(false)
            .default_width(460.0)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(eg::RichText::new("Movie folder").strong());
                ui.horizontal(|ui| {
                    ui.add(
                        eg::TextEdit::singleline(&mut self.settings_root_text)
                            .hint_text("/path/to/movies")
                            .desired_width(320.0),
                    );
                    if ui.button("Browse…").clicked() {
                        let mut dialog = FileDialog::new();
                        if !self.settings_root_text.trim().is_empty() {
                            dialog = dialog.set_directory(self.settings_root_text.trim());
                        }
                        if let Some(dir) = dialog.pick_folder() {
                            self.settings_root_text = dir.display().to_string();
                        }
                    }
                });
                ui.label(
                    eg::RichText::new("Each subfolder is a category; each folder inside it is one movie.")
                        .weak(),
                );

                ui.add_space(6.0);
                ui.checkbox(&mut self.settings_auto_scan, "Scan library on start");

                ui.add_space(6.0);
                ui.separator();
                ui.horizontal(|ui| {
                    ui.monospace(format!("Cache: {}", self.cache.path().display()));
                    if ui
                        .small_button("Clean cache")
                        .on_hover_text("Forget posters whose files were deleted")
                        .clicked()
                    {
                        prune = true;
                    }
                });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        save = true;
                    }
                });
            });

        if prune {
            self.prune_cache();
        }
        if save {
            self.apply_settings(ctx);
            open = false;
        }
        self.show_settings = open;
    }
}
