//! Read-only directory statistics: counting, listing, sizes, duplicates

use crate::error::{KeeperError, Result};
use crate::scan::{extension_of, FileEntry, Scope, DISPLAY_TIME_FORMAT};
use chrono::{DateTime, Local};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable size: `0 B`, `1.5 KB`, `256.3 MB` (1024 base)
pub fn format_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

pub fn count_files(scope: &Scope) -> usize {
    scope.files().count()
}

/// Paths relative to the scope directory, sorted
pub fn list_files(scope: &Scope) -> Vec<String> {
    let mut files: Vec<String> = scope
        .files()
        .map(|f| f.relative_to(&scope.directory).display().to_string())
        .collect();
    files.sort();
    files
}

/// `.ext` (or `no_extension`) -> sorted absolute paths
pub fn categorize_by_extension(scope: &Scope) -> BTreeMap<String, Vec<String>> {
    let mut categorized: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in scope.files() {
        let mut key = extension_of(&file.path);
        if key.is_empty() {
            key = "no_extension".to_string();
        }
        let full = std::path::absolute(&file.path).unwrap_or(file.path);
        categorized
            .entry(key)
            .or_default()
            .push(full.display().to_string());
    }
    for files in categorized.values_mut() {
        files.sort();
    }
    categorized
}

/// Unit for get_directory_size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    #[default]
    Auto,
    B,
    KB,
    MB,
    GB,
    TB,
}

impl SizeUnit {
    fn divisor(self) -> Option<f64> {
        let exp = match self {
            Self::Auto => return None,
            Self::B => 0,
            Self::KB => 1,
            Self::MB => 2,
            Self::GB => 3,
            Self::TB => 4,
        };
        Some(1024f64.powi(exp))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::B => "B",
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
            Self::TB => "TB",
        }
    }

    fn format(self, bytes: f64) -> String {
        match self.divisor() {
            Some(div) => format!("{:.1} {}", bytes / div, self.as_str()),
            None => format_file_size(bytes as u64),
        }
    }
}

impl FromStr for SizeUnit {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "AUTO" => Ok(Self::Auto),
            "B" => Ok(Self::B),
            "KB" => Ok(Self::KB),
            "MB" => Ok(Self::MB),
            "GB" => Ok(Self::GB),
            "TB" => Ok(Self::TB),
            other => Err(KeeperError::InvalidArgument(format!(
                "unknown unit '{}' (expected auto, B, KB, MB, GB or TB)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorySize {
    pub total_size_bytes: u64,
    pub total_files: usize,
    pub average_size_bytes: u64,
    pub formatted_total: String,
    pub formatted_average: String,
    pub unit: String,
}

pub fn directory_size(scope: &Scope, unit: SizeUnit) -> DirectorySize {
    let (total_size, total_files) = scope
        .files()
        .fold((0u64, 0usize), |(size, count), f| (size + f.size(), count + 1));

    let average = if total_files > 0 {
        total_size as f64 / total_files as f64
    } else {
        0.0
    };

    DirectorySize {
        total_size_bytes: total_size,
        total_files,
        average_size_bytes: average as u64,
        formatted_total: unit.format(total_size as f64),
        formatted_average: unit.format(average),
        unit: unit.as_str().to_string(),
    }
}

/// Files of at least `min_size_mb`, largest first
pub fn find_large_files(scope: &Scope, min_size_mb: f64) -> Result<Vec<FileEntry>> {
    if !min_size_mb.is_finite() || min_size_mb < 0.0 {
        return Err(KeeperError::InvalidArgument(format!(
            "min_size_mb must be a non-negative number, got {}",
            min_size_mb
        )));
    }
    let min_bytes = (min_size_mb * 1024.0 * 1024.0) as u64;

    let mut large: Vec<FileEntry> = scope
        .files()
        .filter(|f| f.size() >= min_bytes)
        .map(|f| f.to_entry(&scope.directory))
        .collect();
    large.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    Ok(large)
}

/// Directories with no entries at all
///
/// Recursive mode also reports the base directory itself when empty.
pub fn find_empty_folders(scope: &Scope) -> Vec<String> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if scope.recursive && scope.directory.is_dir() {
        candidates.push(scope.directory.clone());
    }
    candidates.extend(scope.directories());

    candidates
        .into_iter()
        .filter(|dir| match fs::read_dir(dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) => {
                tracing::debug!(path = %dir.display(), "skipping unreadable directory: {}", e);
                false
            }
        })
        .map(|dir| dir.display().to_string())
        .collect()
}

/// Groups of identical files keyed by SHA-256, only groups of two or more
pub fn find_duplicate_files(scope: &Scope) -> BTreeMap<String, Vec<String>> {
    // Only files sharing a size can share content
    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for file in scope.files() {
        by_size.entry(file.size()).or_default().push(file.path);
    }

    let mut by_hash: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for paths in by_size.into_values().filter(|paths| paths.len() > 1) {
        for path in paths {
            match hash_file(&path) {
                Ok(hash) => by_hash
                    .entry(hash)
                    .or_default()
                    .push(path.display().to_string()),
                Err(e) => tracing::debug!(path = %path.display(), "cannot hash: {}", e),
            }
        }
    }

    by_hash.retain(|_, paths| paths.len() > 1);
    for paths in by_hash.values_mut() {
        paths.sort();
    }
    by_hash
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub full_path: String,
    pub parent_directory: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size_bytes: u64,
    pub size_formatted: String,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub accessed_time: Option<String>,
    pub extension: Option<String>,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_items_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_files_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_dirs_count: Option<usize>,
}

/// Metadata of a single file or directory (symlinks followed)
pub fn file_info(path: &Path) -> Result<FileInfo> {
    let full = path
        .canonicalize()
        .map_err(|e| KeeperError::from_io(path, e))?;
    let meta = fs::metadata(&full).map_err(|e| KeeperError::from_io(&full, e))?;
    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| full.display().to_string());

    let mut info = FileInfo {
        is_hidden: name.starts_with('.'),
        name,
        full_path: full.display().to_string(),
        parent_directory: full
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        kind: if meta.is_dir() { "directory" } else { "file" }.to_string(),
        size_bytes: meta.len(),
        size_formatted: format_file_size(meta.len()),
        created_time: format_time(meta.created()),
        modified_time: format_time(meta.modified()),
        accessed_time: format_time(meta.accessed()),
        extension: meta.is_file().then(|| extension_of(&full)),
        sub_items_count: None,
        sub_files_count: None,
        sub_dirs_count: None,
    };

    if meta.is_dir() {
        let (mut items, mut files, mut dirs) = (0, 0, 0);
        // Unreadable directories report zero children
        if let Ok(entries) = fs::read_dir(&full) {
            for entry in entries.flatten() {
                items += 1;
                match entry.path().metadata() {
                    Ok(m) if m.is_dir() => dirs += 1,
                    Ok(m) if m.is_file() => files += 1,
                    _ => {}
                }
            }
        }
        info.sub_items_count = Some(items);
        info.sub_files_count = Some(files);
        info.sub_dirs_count = Some(dirs);
    }

    Ok(info)
}

fn format_time(time: io::Result<SystemTime>) -> Option<String> {
    time.ok()
        .map(|t| DateTime::<Local>::from(t).format(DISPLAY_TIME_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.txt"), "same content").unwrap();
        fs::write(root.join("b.TXT"), "same content").unwrap();
        fs::write(root.join("README"), "readme").unwrap();
        fs::write(root.join("big.bin"), vec![0u8; 2048]).unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c.txt"), "same content").unwrap();
        fs::write(root.join("sub").join("d.txt"), "different!!!").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join("sub").join("empty_too")).unwrap();
        tmp
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024 * 256), "256.0 MB");
        assert_eq!(format_file_size(5 * 1024u64.pow(5)), "5120.0 TB");
    }

    #[test]
    fn test_count_and_list() {
        let tmp = tree();
        assert_eq!(count_files(&Scope::new(tmp.path(), false)), 4);
        assert_eq!(count_files(&Scope::new(tmp.path(), true)), 6);

        let listed = list_files(&Scope::new(tmp.path(), true).with_extension(Some("txt")));
        let expected = vec![
            "a.txt".to_string(),
            "b.TXT".to_string(),
            Path::new("sub").join("c.txt").display().to_string(),
            Path::new("sub").join("d.txt").display().to_string(),
        ];
        let mut expected_sorted = expected.clone();
        expected_sorted.sort();
        assert_eq!(listed, expected_sorted);
    }

    #[test]
    fn test_categorize_by_extension() {
        let tmp = tree();
        let cats = categorize_by_extension(&Scope::new(tmp.path(), false));
        assert_eq!(cats[".txt"].len(), 2);
        assert_eq!(cats["no_extension"].len(), 1);
        assert_eq!(cats[".bin"].len(), 1);
        assert!(cats[".txt"].iter().all(|p| Path::new(p).is_absolute()));
    }

    #[test]
    fn test_directory_size_units() {
        let tmp = tree();
        let scope = Scope::new(tmp.path(), false);

        let auto = directory_size(&scope, SizeUnit::Auto);
        assert_eq!(auto.total_files, 4);
        assert_eq!(auto.total_size_bytes, 12 + 12 + 6 + 2048);
        assert_eq!(auto.average_size_bytes, (12 + 12 + 6 + 2048) / 4);
        assert_eq!(auto.unit, "auto");

        let kb = directory_size(&scope, SizeUnit::KB);
        assert!(kb.formatted_total.ends_with(" KB"));
    }

    #[test]
    fn test_directory_size_empty() {
        let tmp = TempDir::new().unwrap();
        let size = directory_size(&Scope::new(tmp.path(), true), SizeUnit::Auto);
        assert_eq!(size.total_files, 0);
        assert_eq!(size.formatted_total, "0 B");
        assert_eq!(size.formatted_average, "0 B");
    }

    #[test]
    fn test_size_unit_parse() {
        assert_eq!("mb".parse::<SizeUnit>().unwrap(), SizeUnit::MB);
        assert_eq!("auto".parse::<SizeUnit>().unwrap(), SizeUnit::Auto);
        assert!("PB".parse::<SizeUnit>().is_err());
    }

    #[test]
    fn test_find_large_files() {
        let tmp = tree();
        let scope = Scope::new(tmp.path(), true);
        let large = find_large_files(&scope, 1.0 / 1024.0).unwrap();
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].filename, "big.bin");

        let all = find_large_files(&scope, 0.0).unwrap();
        assert_eq!(all.len(), 6);
        assert!(all.windows(2).all(|w| w[0].size_bytes >= w[1].size_bytes));

        assert!(find_large_files(&scope, -1.0).is_err());
    }

    #[test]
    fn test_find_empty_folders() {
        let tmp = tree();
        let top = find_empty_folders(&Scope::new(tmp.path(), false));
        assert_eq!(top, vec![tmp.path().join("empty").display().to_string()]);

        let all = find_empty_folders(&Scope::new(tmp.path(), true));
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_find_empty_folders_recursive_includes_empty_base() {
        let tmp = TempDir::new().unwrap();
        let found = find_empty_folders(&Scope::new(tmp.path(), true));
        assert_eq!(found, vec![tmp.path().display().to_string()]);
    }

    #[test]
    fn test_find_duplicate_files() {
        let tmp = tree();
        let top = find_duplicate_files(&Scope::new(tmp.path(), false));
        assert_eq!(top.len(), 1);
        assert_eq!(top.values().next().unwrap().len(), 2);

        let all = find_duplicate_files(&Scope::new(tmp.path(), true));
        assert_eq!(all.len(), 1);
        let (hash, group) = all.iter().next().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(group.len(), 3);
        assert!(!group.iter().any(|p| p.ends_with("d.txt")));
    }

    #[test]
    fn test_file_info_for_file_and_directory() {
        let tmp = tree();
        let info = file_info(&tmp.path().join("a.txt")).unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.kind, "file");
        assert_eq!(info.size_bytes, 12);
        assert_eq!(info.extension.as_deref(), Some(".txt"));
        assert!(!info.is_hidden);
        assert!(info.sub_items_count.is_none());

        let info = file_info(&tmp.path().join("sub")).unwrap();
        assert_eq!(info.kind, "directory");
        assert_eq!(info.sub_items_count, Some(3));
        assert_eq!(info.sub_files_count, Some(2));
        assert_eq!(info.sub_dirs_count, Some(1));
        assert!(info.extension.is_none());
    }

    #[test]
    fn test_file_info_missing() {
        let err = file_info(Path::new("/nonexistent/filekeeper.txt")).unwrap_err();
        assert!(matches!(err, KeeperError::NotFound(_)));
    }
}
