// src/app/catalog.rs
// One category's movie folders joined with cached posters. Cache-only;
// resolution is always an explicit action elsewhere.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::cache::PosterCache;
use crate::app::scan::{self, MovieFolder};
use crate::app::source::TitleInfo;
use crate::app::utils;

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub folder: MovieFolder,
    pub poster: Option<PathBuf>,
    pub info: Option<TitleInfo>,
    /// When the poster row (and its info) was written.
    pub cached_at: Option<String>,
    /// `None` disables Play for this card.
    pub play_target: Option<PathBuf>,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.folder.name
    }

    pub fn display_title(&self) -> String {
        utils::display_title(&self.folder.name)
    }

    pub fn is_playable(&self) -> bool {
        self.play_target.is_some()
    }

    /// Raw folder name, plus the cached year and rating when known.
    pub fn hover_text(&self) -> String {
        match self.info.as_ref().and_then(TitleInfo::year_and_rating) {
            Some(extra) => format!("{}\n{extra}", self.folder.name),
            None => self.folder.name.clone(),
        }
    }
}

/// Entries for `root/category`, sorted by folder name. Folders without any
/// media file are kept so misorganised titles stay visible.
pub fn load_category(root: &Path, category: &str, cache: &PosterCache) -> Vec<CatalogEntry> {
    let mut folders = scan::list_movie_folders(&root.join(category));
    folders.sort_by(|a, b| utils::compare_names(&a.name, &b.name));

    let entries: Vec<CatalogEntry> = folders
        .into_iter()
        .map(|folder| {
            let hit = cache.lookup(&PosterCache::key_for(&folder.category, &folder.name));
            let play_target = scan::find_playable_file(&folder.path);
            let (poster, info, cached_at) = match hit {
                Some(h) => (Some(h.path), h.info, Some(h.fetched_at)),
                None => (None, None, None),
            };
            CatalogEntry {
                folder,
                poster,
                info,
                cached_at,
                play_target,
            }
        })
        .collect();

    debug!(
        "Catalog: {category}: {} entries, {} with posters",
        entries.len(),
        entries.iter().filter(|e| e.poster.is_some()).count()
    );
    entries
}

/// Case-insensitive substring match on the folder name. Empty text keeps
/// everything in order.
pub fn filter_entries<'a>(entries: &'a [CatalogEntry], text: &str) -> Vec<&'a CatalogEntry> {
    let needle = text.to_lowercase();
    if needle.is_empty() {
        return entries.iter().collect();
    }
    entries
        .iter()
        .filter(|e| e.folder.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::resolver::tests::{setup, FakeSource};
    use std::fs;
    use std::sync::atomic::Ordering;

    fn cache_in(dir: &Path) -> PosterCache {
        PosterCache::open(&dir.join("cache").join("posters.db")).unwrap()
    }

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            folder: MovieFolder {
                category: "Action".into(),
                name: name.into(),
                path: PathBuf::from("/movies/Action").join(name),
            },
            poster: None,
            info: None,
            cached_at: None,
            play_target: None,
        }
    }

    #[test]
    fn die_hard_end_to_end() {
        let fake = FakeSource {
            title_tag: Some("Die Hard (1988) - IMDb".into()),
            ..FakeSource::default()
        };
        let (dir, fake, resolver) = setup(fake);
        let root = dir.path().join("movies");
        let movie = root.join("Action").join("Die.Hard.1988");
        fs::create_dir_all(&movie).unwrap();
        fs::create_dir_all(root.join("Comedy")).unwrap();
        fs::write(movie.join("Die.Hard.1988.mkv"), b"x").unwrap();
        let cache = resolver.cache();

        assert_eq!(scan::list_categories(&root), vec!["Action", "Comedy"]);

        let entries = load_category(&root, "Action", cache);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "Die.Hard.1988");
        assert_eq!(entries[0].display_title(), "Die Hard 1988");
        assert!(entries[0]
            .play_target
            .as_ref()
            .is_some_and(|p| p.extension().is_some_and(|e| e == "mkv")));
        assert_eq!(entries[0].poster, None);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0, "loading never fetches");

        let resolved = resolver.resolve(&entries[0].folder, false).unwrap();
        assert_eq!(resolved.path, movie.join("poster.jpg"));

        let entries = load_category(&root, "Action", cache);
        assert_eq!(entries[0].poster, Some(movie.join("poster.jpg")));
        assert!(entries[0].cached_at.is_some());
        let info = entries[0].info.as_ref().unwrap();
        assert_eq!(info.title.as_deref(), Some("Die Hard"));
        assert_eq!(info.year, Some(1988));
    }

    #[test]
    fn folders_without_media_are_kept_unplayable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("Drama").join("Empty.Folder")).unwrap();
        let cache = cache_in(dir.path());

        let entries = load_category(&root, "Drama", &cache);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_playable());
    }

    #[test]
    fn missing_category_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(load_category(dir.path(), "Nope", &cache).is_empty());
    }

    #[test]
    fn entries_are_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["heat", "Alien", "Brazil"] {
            fs::create_dir_all(dir.path().join("Mixed").join(name)).unwrap();
        }
        let cache = cache_in(dir.path());
        let names: Vec<String> = load_category(dir.path(), "Mixed", &cache)
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["Alien", "Brazil", "heat"]);
    }

    #[test]
    fn hover_text_adds_known_metadata() {
        let mut e = entry("Heat.1995");
        assert_eq!(e.hover_text(), "Heat.1995");
        e.info = Some(TitleInfo {
            year: Some(1995),
            rating: Some(8.3),
            ..TitleInfo::default()
        });
        assert_eq!(e.hover_text(), "Heat.1995\n1995 · ★ 8.3");
    }

    #[test]
    fn empty_filter_is_identity() {
        let entries = vec![entry("Heat"), entry("Alien"), entry("Brazil")];
        let out = filter_entries(&entries, "");
        assert_eq!(out.len(), 3);
        assert!(out.iter().zip(&entries).all(|(a, b)| *a == b));
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let entries = vec![entry("Die.Hard.1988"), entry("Heat"), entry("Hard.Boiled")];
        let names: Vec<&str> = filter_entries(&entries, "HARD")
            .into_iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["Die.Hard.1988", "Hard.Boiled"]);
        assert!(filter_entries(&entries, "zzz").is_empty());
    }
}
