// src/app/ui/topbar.rs
use eframe::egui as eg;

use super::super::POSTER_W_RANGE;

impl crate::app::CinedexApp {
    // ---------- TOP BAR ----------
    pub(crate) fn ui_render_topbar(&mut self, ui: &mut eg::Ui, ctx: &eg::Context) {
        ui.horizontal(|ui| {
            // Category
            let mut picked: Option<String> = None;
            eg::ComboBox::from_id_source("category_combo")
                .selected_text(self.selected_category.as_deref().unwrap_or("Category…"))
                .show_ui(ui, |ui| {
                    for cat in &self.categories {
                        let is_current = self.selected_category.as_deref() == Some(cat.as_str());
                        if ui.selectable_label(is_current, cat).clicked() && !is_current {
                            picked = Some(cat.clone());
                        }
                    }
                });
            if let Some(cat) = picked {
                self.select_category(ctx, &cat);
            }

            ui.separator();

            // Filter
            ui.add(
                eg::TextEdit::singleline(&mut self.filter_text)
                    .hint_text("Filter titles…")
                    .desired_width(180.0),
            );
            if !self.filter_text.is_empty() && ui.small_button("✕").clicked() {
                self.filter_text.clear();
            }

            ui.separator();

            let scan_label = if self.categories.is_empty() {
                "Scan library"
            } else {
                "Rescan"
            };
            if ui
                .add_enabled(self.root.is_some() && !self.scanning, eg::Button::new(scan_label))
                .clicked()
            {
                self.start_scan(ctx);
            }

            ui.separator();

            // Batch
            if let Some(run) = &self.batch {
                let fraction = run.fraction();
                let text = format!("{}/{}", run.done, run.total);
                ui.add(
                    eg::ProgressBar::new(fraction)
                        .desired_width(160.0)
                        .text(text),
                );
                if ui.button("Cancel").clicked() {
                    self.cancel_batch();
                }
            } else {
                let missing = self.entries.iter().filter(|e| e.poster.is_none()).count();
                let enabled = self.resolver.is_some() && missing > 0;
                if ui
                    .add_enabled(enabled, eg::Button::new("Fetch missing posters"))
                    .on_hover_text(format!("{missing} movies in this category have no poster"))
                    .clicked()
                {
                    self.start_batch(ctx);
                }
                if self.batch_report.is_some() && ui.small_button("Last report").clicked() {
                    self.show_batch_report = true;
                }
            }

            ui.separator();

            // Poster size
            ui.label("Poster:");
            if ui
                .add(eg::Slider::new(&mut self.poster_width_ui, POSTER_W_RANGE).suffix(" px"))
                .changed()
            {
                self.remember_poster_width();
            }

            ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                if ui.button("Settings").clicked() {
                    self.show_settings = true;
                }
            });
        });
    }
}
