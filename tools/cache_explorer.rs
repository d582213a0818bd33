use cinedex::app::cache::{poster_cache_path, PosterCache};
use cinedex::config::load_config;
use std::env;
use std::fs::File;
use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() == 1 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let cfg = load_config();
    let db_path = poster_cache_path(&cfg);
    if !db_path.exists() {
        eprintln!(
            "Poster cache not found at {}. Launch Cinedex and fetch a poster first.",
            db_path.display()
        );
        return ExitCode::FAILURE;
    }

    let cache = match PosterCache::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to open {}: {e}", db_path.display());
            return ExitCode::FAILURE;
        }
    };
    println!("Opening poster cache: {}", db_path.display());

    let result = if args.iter().any(|a| a == "--prune") {
        cache.prune_missing().map(|n| println!("Removed {n} entries with missing files."))
    } else if args.iter().any(|a| a == "--list") {
        let out_file = args
            .iter()
            .position(|a| a == "--out")
            .and_then(|i| args.get(i + 1).cloned());
        list_entries(&cache, out_file.as_deref())
    } else {
        eprintln!("Unknown arguments: {}", args[1..].join(" "));
        print_usage();
        return ExitCode::FAILURE;
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!(
        r#"Cinedex poster cache explorer.

Usage:
  cargo run --bin cache_explorer -- --list [--out file]
      Print every cached poster (category, folder, title, fetched at, path).
      Rows whose file is gone are marked with `!`.

  cargo run --bin cache_explorer -- --prune
      Delete rows whose poster file no longer exists.

The cache location follows `cache_dir` in config.json."#
    );
}

fn list_entries(
    cache: &PosterCache,
    out_file: Option<&str>,
) -> Result<(), cinedex::app::error::CacheError> {
    let rows = cache.entries()?;
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!("{} cached posters", rows.len()));
    for row in &rows {
        let marker = if row.path.is_file() { ' ' } else { '!' };
        let title = row
            .info
            .as_ref()
            .map(|i| match (&i.title, i.year) {
                (Some(t), Some(y)) => format!("{t} ({y})"),
                (Some(t), None) => t.clone(),
                (None, Some(y)) => y.to_string(),
                (None, None) => String::new(),
            })
            .unwrap_or_default();
        lines.push(format!(
            "{marker} {:<24} {:<40} {:<32} {}  {}",
            row.key.category,
            row.key.folder,
            title,
            row.fetched_at,
            row.path.display()
        ));
    }

    match out_file {
        Some(path) => {
            let mut f = File::create(path)?;
            for line in &lines {
                writeln!(f, "{line}")?;
            }
            println!("Wrote {} rows to {path}", rows.len());
        }
        None => {
            for line in &lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}
