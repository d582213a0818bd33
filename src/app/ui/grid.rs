// src/app/ui/grid.rs
use eframe::egui as eg;

use super::CardAction;
use crate::app::cache::PosterCache;
use crate::app::catalog::CatalogEntry;
use crate::app::types::PosterState;

pub const H_SPACING: f32 = 8.0;
pub const V_SPACING: f32 = 12.0;
const TEXT_H: f32 = 64.0;

fn draw_placeholder(p: &eg::Painter, rect: eg::Rect, label: &str) {
    p.rect_filled(rect, 6.0, eg::Color32::from_gray(40));
    p.text(
        rect.center(),
        eg::Align2::CENTER_CENTER,
        label,
        eg::FontId::proportional(13.0),
        eg::Color32::from_gray(170),
    );
}

impl crate::app::CinedexApp {
    pub(crate) fn ui_render_grid(&mut self, ui: &mut eg::Ui, ctx: &eg::Context) {
        let visible: Vec<CatalogEntry> = self.visible_entries().into_iter().cloned().collect();
        if visible.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(32.0);
                ui.label(format!("No titles match “{}”.", self.filter_text));
            });
            return;
        }

        let card_w = self.poster_width_ui;
        let card_h = card_w * 1.5 + TEXT_H;
        let mut uploads_left = super::super::MAX_UPLOADS_PER_FRAME;
        let mut actions: Vec<CardAction> = Vec::new();

        eg::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                let avail = ui.available_width();
                let cols = ((avail + H_SPACING) / (card_w + H_SPACING))
                    .floor()
                    .max(1.0) as usize;

                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = eg::vec2(H_SPACING, V_SPACING);

                    for (col, entry) in visible.iter().enumerate() {
                        if col > 0 && col % cols == 0 {
                            ui.end_row();
                        }
                        let key = PosterCache::key_for(&entry.folder.category, &entry.folder.name);
                        let tex = self.poster_texture(ctx, entry, &mut uploads_left);
                        let state = self.poster_states.get(&key).cloned();
                        let is_selected = self.selected.as_ref() == Some(&key);

                        ui.allocate_ui_with_layout(
                            eg::vec2(card_w, card_h),
                            eg::Layout::top_down(eg::Align::Min),
                            |ui| {
                                ui.set_min_size(eg::vec2(card_w, card_h));
                                let rect = ui.max_rect();

                                let (poster_rect, poster_resp) = ui.allocate_exact_size(
                                    eg::vec2(card_w, card_w * 1.5),
                                    eg::Sense::click(),
                                );
                                if poster_resp.clicked() {
                                    actions.push(CardAction::Select(key.clone()));
                                }
                                match (&tex, &state) {
                                    (Some(tex), _) => {
                                        ui.painter().image(
                                            tex.id(),
                                            poster_rect,
                                            eg::Rect::from_min_max(
                                                eg::pos2(0.0, 0.0),
                                                eg::pos2(1.0, 1.0),
                                            ),
                                            eg::Color32::WHITE,
                                        );
                                    }
                                    (None, Some(PosterState::Fetching)) => {
                                        draw_placeholder(ui.painter(), poster_rect, "Fetching…");
                                    }
                                    (None, _) => {
                                        draw_placeholder(ui.painter(), poster_rect, "No poster");
                                    }
                                }

                                ui.add(
                                    eg::Label::new(
                                        eg::RichText::new(entry.display_title()).strong(),
                                    )
                                    .truncate(),
                                )
                                .on_hover_text(entry.hover_text());

                                if let Some(PosterState::Failed { label, detail }) = &state {
                                    ui.colored_label(
                                        eg::Color32::LIGHT_RED,
                                        format!("⚠ {label}"),
                                    )
                                    .on_hover_text(detail);
                                }

                                ui.horizontal(|ui| {
                                    let fetching = matches!(state, Some(PosterState::Fetching));
                                    let can_fetch = self.resolver.is_some() && !fetching;
                                    if ui
                                        .add_enabled(can_fetch, eg::Button::new("Poster").small())
                                        .on_hover_text("Fetch the poster again")
                                        .clicked()
                                    {
                                        actions.push(CardAction::Fetch {
                                            entry: entry.clone(),
                                            force: true,
                                        });
                                    }
                                    if ui
                                        .add_enabled(entry.is_playable(), eg::Button::new("Play").small())
                                        .on_disabled_hover_text("No playable file in this folder")
                                        .clicked()
                                    {
                                        actions.push(CardAction::Play(entry.clone()));
                                    }
                                    if ui.small_button("Reveal").clicked() {
                                        actions.push(CardAction::Reveal(entry.folder.path.clone()));
                                    }
                                });

                                if is_selected {
                                    ui.painter().rect_stroke(
                                        rect.shrink(1.0),
                                        6.0,
                                        eg::Stroke::new(2.0, eg::Color32::YELLOW),
                                    );
                                }
                            },
                        );
                    }

                    ui.end_row();
                });
            });

        self.apply_card_actions(ctx, actions);
    }
}
