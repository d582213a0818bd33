// src/app/ui/mod.rs
pub mod grid;
pub mod settings;
pub mod topbar;

use std::path::PathBuf;

use eframe::egui as eg;

use crate::app::cache::CacheKey;
use crate::app::catalog::CatalogEntry;

/// Clicks collected while drawing, applied once the frame's borrows end.
pub(crate) enum CardAction {
    Select(CacheKey),
    Fetch { entry: CatalogEntry, force: bool },
    Play(CatalogEntry),
    Reveal(PathBuf),
}

impl crate::app::CinedexApp {
    pub(crate) fn apply_card_actions(&mut self, ctx: &eg::Context, actions: Vec<CardAction>) {
        for action in actions {
            match action {
                CardAction::Select(key) => self.selected = Some(key),
                CardAction::Fetch { entry, force } => self.request_fetch(ctx, &entry, force),
                CardAction::Play(entry) => self.play_entry(&entry),
                CardAction::Reveal(path) => self.reveal_path(&path),
            }
        }
    }

    /// Message for the central panel when there is no grid to show.
    pub(crate) fn empty_state_message(&self) -> Option<String> {
        let Some(root) = &self.root else {
            return Some("No movie folder configured yet.".into());
        };
        if self.categories.is_empty() {
            return Some(if self.scanning {
                format!("Scanning {}…", root.display())
            } else {
                format!("No categories found in {}", root.display())
            });
        }
        if self.selected_category.is_none() {
            return Some("Pick a category.".into());
        }
        if self.entries.is_empty() {
            return Some(if self.loading {
                "Loading…".into()
            } else {
                "No movies found in this category.".into()
            });
        }
        None
    }

    pub(crate) fn ui_render_empty_state(&mut self, ui: &mut eg::Ui, ctx: &eg::Context, msg: &str) {
        ui.vertical_centered(|ui| {
            ui.add_space(48.0);
            if self.scanning || self.loading {
                ui.add(eg::Spinner::new().size(18.0));
            }
            ui.heading(msg);
            ui.add_space(12.0);
            if self.root.is_none() {
                if ui.button("Open settings…").clicked() {
                    self.show_settings = true;
                }
            } else if !self.scanning && self.categories.is_empty() && ui.button("Scan library").clicked()
            {
                self.start_scan(ctx);
            }
        });
    }
}
