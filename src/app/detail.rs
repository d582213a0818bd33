// src/app/detail.rs
use eframe::egui as eg;
use egui_extras::{Column, TableBuilder};

use crate::app::ui::CardAction;

impl crate::app::CinedexApp {
    pub(crate) fn ui_render_detail_panel(&mut self, ctx: &eg::Context) {
        let Some(key) = self.selected.clone() else {
            return;
        };
        let Some(entry) = self.entry_by_key(&key).cloned() else {
            // entry vanished after a reload
            self.selected = None;
            return;
        };

        let mut actions = Vec::new();
        let mut budget = 1usize;
        let tex = self.poster_texture(ctx, &entry, &mut budget);
        let mut close = false;

        eg::SidePanel::right("detail_panel")
            .resizable(true)
            .default_width(320.0)
            .min_width(260.0)
            .max_width(520.0)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.heading("Details");
                    ui.with_layout(eg::Layout::right_to_left(eg::Align::Center), |ui| {
                        if ui.button("Close").clicked() {
                            close = true;
                        }
                    });
                });
                ui.separator();

                let avail_w = ui.available_width().clamp(120.0, 520.0);
                let poster_size = eg::vec2(avail_w, avail_w * 1.5);
                if let Some(tex) = &tex {
                    ui.image((tex.id(), poster_size));
                } else {
                    let (rect, _resp) = ui.allocate_exact_size(poster_size, eg::Sense::hover());
                    ui.painter().rect_filled(rect, 8.0, eg::Color32::from_gray(40));
                    ui.painter().text(
                        rect.center(),
                        eg::Align2::CENTER_CENTER,
                        "No poster yet",
                        eg::FontId::proportional(14.0),
                        eg::Color32::WHITE,
                    );
                }

                ui.add_space(8.0);
                let heading = entry
                    .info
                    .as_ref()
                    .and_then(|i| i.title.clone())
                    .unwrap_or_else(|| entry.display_title());
                ui.heading(heading);
                ui.label(eg::RichText::new(&entry.folder.category).weak());
                ui.add_space(6.0);

                if let Some(info) = &entry.info {
                    eg::Grid::new("detail_info")
                        .num_columns(2)
                        .spacing([8.0, 4.0])
                        .show(ui, |ui| {
                            if let Some(year) = info.year {
                                ui.label("Year");
                                ui.label(year.to_string());
                                ui.end_row();
                            }
                            if let Some(rating) = info.rating {
                                ui.label("Rating");
                                ui.label(format!("★ {rating:.1}"));
                                ui.end_row();
                            }
                            if !info.genres.is_empty() {
                                ui.label("Genre");
                                ui.label(info.genres.join(", "));
                                ui.end_row();
                            }
                        });
                    if let Some(plot) = &info.plot {
                        ui.add_space(4.0);
                        ui.label(plot);
                    }
                    if let Some(at) = &entry.cached_at {
                        let day = at.split('T').next().unwrap_or(at);
                        ui.label(eg::RichText::new(format!("info cached: {day}")).weak().small());
                    }
                    ui.add_space(6.0);
                }

                eg::Grid::new("detail_paths")
                    .num_columns(2)
                    .spacing([8.0, 4.0])
                    .show(ui, |ui| {
                        ui.label("Folder");
                        ui.monospace(entry.folder.path.display().to_string());
                        ui.end_row();
                        ui.label("Video");
                        match &entry.play_target {
                            Some(p) => ui.monospace(
                                p.file_name()
                                    .map(|n| n.to_string_lossy().into_owned())
                                    .unwrap_or_default(),
                            ),
                            None => ui.label(eg::RichText::new("none found").italics()),
                        };
                        ui.end_row();
                        ui.label("Poster");
                        match &entry.poster {
                            Some(p) => ui.monospace(p.display().to_string()),
                            None => ui.label(eg::RichText::new("not cached").italics()),
                        };
                        ui.end_row();
                    });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(entry.is_playable(), eg::Button::new("Play"))
                        .clicked()
                    {
                        actions.push(CardAction::Play(entry.clone()));
                    }
                    if ui
                        .add_enabled(self.resolver.is_some(), eg::Button::new("Fetch poster"))
                        .clicked()
                    {
                        actions.push(CardAction::Fetch {
                            entry: entry.clone(),
                            force: true,
                        });
                    }
                    if ui.button("Reveal").clicked() {
                        let target = entry
                            .play_target
                            .clone()
                            .unwrap_or_else(|| entry.folder.path.clone());
                        actions.push(CardAction::Reveal(target));
                    }
                });
            });

        if close {
            self.selected = None;
        }
        self.apply_card_actions(ctx, actions);
    }

    pub(crate) fn ui_render_batch_report(&mut self, ctx: &eg::Context) {
        if !self.show_batch_report {
            return;
        }
        let Some(report) = &self.batch_report else {
            self.show_batch_report = false;
            return;
        };

        let mut open = self.show_batch_report;
        eg::Window::new("Poster batch report")
            .default_width(560.0)
            .default_height(360.0)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(format!(
                    "{} processed{}: {} ok, {} failed, {:.1}s",
                    report.outcomes.len(),
                    if report.cancelled { " (cancelled)" } else { "" },
                    report.ok_count(),
                    report.failed_count(),
                    report.elapsed.as_secs_f32()
                ));
                ui.separator();

                TableBuilder::new(ui)
                    .striped(true)
                    .column(Column::auto().at_least(180.0))
                    .column(Column::auto().at_least(70.0))
                    .column(Column::remainder())
                    .header(20.0, |mut header| {
                        header.col(|ui| {
                            ui.strong("Movie");
                        });
                        header.col(|ui| {
                            ui.strong("Result");
                        });
                        header.col(|ui| {
                            ui.strong("Detail");
                        });
                    })
                    .body(|mut body| {
                        for o in &report.outcomes {
                            body.row(18.0, |mut row| {
                                row.col(|ui| {
                                    ui.label(&o.folder.name);
                                });
                                row.col(|ui| match &o.result {
                                    Ok(_) if o.from_cache => {
                                        ui.label("cached");
                                    }
                                    Ok(_) => {
                                        ui.colored_label(eg::Color32::LIGHT_GREEN, "fetched");
                                    }
                                    Err(e) => {
                                        ui.colored_label(eg::Color32::LIGHT_RED, e.kind_label());
                                    }
                                });
                                row.col(|ui| {
                                    let text = match &o.result {
                                        Ok(p) => p.display().to_string(),
                                        Err(e) => e.to_string(),
                                    };
                                    ui.label(text);
                                });
                            });
                        }
                    });
            });
        self.show_batch_report = open;
    }
}
