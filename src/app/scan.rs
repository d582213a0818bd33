// src/app/scan.rs
// Directory scanner: categories under the root, movie folders under a
// category, first playable file inside a movie folder.
// Listing never fails from the caller's point of view: an unreadable or
// missing directory is logged and yields an empty result.

use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::app::utils;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieFolder {
    pub category: String,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    VideoFile,
}

struct DirEntryInfo {
    name: String,
    path: PathBuf,
    kind: EntryKind,
}

/// Immediate children of `dir` that are directories or playable files,
/// in directory-listing order.
fn read_entries(dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", dir.display()),
        ));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                // the directory itself being unreadable surfaces as the first error
                if err.depth() == 0 {
                    return Err(err.into());
                }
                warn!("Scan: failed entry in {}: {err}", dir.display());
                continue;
            }
        };

        let kind = if entry.file_type().is_dir() {
            EntryKind::Directory
        } else if entry.file_type().is_file() && utils::is_video_ext(entry.path()) {
            EntryKind::VideoFile
        } else {
            continue;
        };

        entries.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.into_path(),
            kind,
        });
    }
    Ok(entries)
}

/// Category names under `root`, sorted case-insensitively.
pub fn list_categories(root: &Path) -> Vec<String> {
    match read_entries(root) {
        Ok(entries) => {
            let names: Vec<String> = entries
                .into_iter()
                .filter(|e| e.kind == EntryKind::Directory)
                .map(|e| e.name)
                .sorted_by(|a, b| utils::compare_names(a, b))
                .collect();
            debug!("Scan: {} categories under {}", names.len(), root.display());
            names
        }
        Err(err) => {
            warn!("Scan: unable to list categories in {}: {err}", root.display());
            Vec::new()
        }
    }
}

/// Every immediate subdirectory of `category_path`, in filesystem order.
pub fn list_movie_folders(category_path: &Path) -> Vec<MovieFolder> {
    let category = category_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match read_entries(category_path) {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| e.kind == EntryKind::Directory)
            .map(|e| MovieFolder {
                category: category.clone(),
                name: e.name,
                path: e.path,
            })
            .collect(),
        Err(err) => {
            warn!(
                "Scan: unable to list movie folders in {}: {err}",
                category_path.display()
            );
            Vec::new()
        }
    }
}

/// First file with a playable extension, by listing order.
pub fn find_playable_file(movie_folder: &Path) -> Option<PathBuf> {
    match read_entries(movie_folder) {
        Ok(entries) => entries
            .into_iter()
            .find(|e| e.kind == EntryKind::VideoFile)
            .map(|e| e.path),
        Err(err) => {
            warn!("Scan: unable to read {}: {err}", movie_folder.display());
            None
        }
    }
}
