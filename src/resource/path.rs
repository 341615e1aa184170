use std::{
    cmp::Ordering,
    fmt, fs,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Engine-root-relative path used as the identity of a resource.
///
/// The key is case-folded with separators normalized to `/`; `.` and empty
/// segments are dropped and `..` pops the previous segment. Two spellings of
/// the same file always compare, hash and order equal. The spelling the path
/// was built from is kept beside the key so the file can be found on a
/// case-sensitive disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourcePath {
    key: String,
    spelling: String,
}

impl ResourcePath {
    pub fn new(raw: &str) -> Self {
        Self::from_parts(&split_components(raw))
    }

    fn from_parts(parts: &[String]) -> Self {
        let spelling = parts.join("/");
        Self {
            key: spelling.to_lowercase(),
            spelling,
        }
    }

    /// The folded key.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Normalized separators, original case.
    pub fn spelling(&self) -> &str {
        &self.spelling
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Sibling used while a save is in flight (`<path>.tmp`).
    pub fn temp_sibling(&self) -> ResourcePath {
        ResourcePath {
            key: format!("{}.tmp", self.key),
            spelling: format!("{}.tmp", self.spelling),
        }
    }
}

impl PartialEq for ResourcePath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ResourcePath {}

impl Hash for ResourcePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ResourcePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourcePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<&str> for ResourcePath {
    fn from(value: &str) -> Self {
        ResourcePath::new(value)
    }
}

impl From<String> for ResourcePath {
    fn from(value: String) -> Self {
        ResourcePath::new(&value)
    }
}

impl From<ResourcePath> for String {
    fn from(value: ResourcePath) -> Self {
        value.spelling
    }
}

fn split_components(raw: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for part in raw.trim().split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other.to_string()),
        }
    }
    parts
}

fn looks_absolute(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    raw.starts_with(['/', '\\'])
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// The directory every [`ResourcePath`] is relative to.
#[derive(Debug, Clone)]
pub struct EngineRoot {
    root: PathBuf,
}

impl EngineRoot {
    /// A relative `root` is anchored at the current directory, so absolute
    /// paths from a file dialog can be matched against it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Converts user input (absolute or already relative) into the canonical
    /// resource key. Absolute paths outside the root are kept whole, minus
    /// their leading separator, so they still produce a stable key.
    pub fn to_relative_path(&self, raw: &str) -> ResourcePath {
        let parts = split_components(raw);
        if !looks_absolute(raw.trim()) {
            return ResourcePath::from_parts(&parts);
        }
        let root = split_components(&self.root.to_string_lossy());
        let under_root = !root.is_empty()
            && parts.len() > root.len()
            && root
                .iter()
                .zip(&parts)
                .all(|(a, b)| a.to_lowercase() == b.to_lowercase());
        if under_root {
            ResourcePath::from_parts(&parts[root.len()..])
        } else {
            ResourcePath::from_parts(&parts)
        }
    }

    /// Locates `path` on disk. Each segment that exists under another case is
    /// resolved to the name actually on disk; missing segments keep the
    /// path's own spelling.
    pub fn to_absolute(&self, path: &ResourcePath) -> PathBuf {
        path.spelling()
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |dir, part| {
                let exact = dir.join(part);
                if exact.exists() {
                    exact
                } else {
                    find_ignoring_case(&dir, part).unwrap_or(exact)
                }
            })
    }
}

fn find_ignoring_case(dir: &Path, name: &str) -> Option<PathBuf> {
    let wanted = name.to_lowercase();
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|entry| entry.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_spellings_share_a_key() {
        assert_eq!(
            ResourcePath::new("Textures/Wood.MAT"),
            ResourcePath::new("textures/wood.mat")
        );
        let path = ResourcePath::new("Textures/Wood.MAT");
        assert_eq!(path.as_str(), "textures/wood.mat");
        assert_eq!(path.spelling(), "Textures/Wood.MAT");
    }

    #[test]
    fn separators_and_dot_segments_fold() {
        let path = ResourcePath::new(".\\textures//detail/../a.DDS");
        assert_eq!(path.as_str(), "textures/a.dds");
        assert_eq!(path.spelling(), "textures/a.DDS");
    }

    #[test]
    fn absolute_paths_under_root_become_relative() {
        let root = EngineRoot::new("/home/dev/Engine");
        let path = root.to_relative_path("/home/dev/engine/Materials/Stone.mat");
        assert_eq!(path.as_str(), "materials/stone.mat");
        assert_eq!(path.spelling(), "Materials/Stone.mat");
        assert_eq!(root.to_relative_path("materials/stone.mat"), path);
    }

    #[cfg(windows)]
    #[test]
    fn windows_style_root_is_stripped() {
        let root = EngineRoot::new("C:\\Games\\Engine");
        let path = root.to_relative_path("c:/games/engine/textures/a.dds");
        assert_eq!(path.as_str(), "textures/a.dds");
    }

    #[test]
    fn relative_input_is_never_stripped() {
        let root = EngineRoot::new("/data/game");
        assert_eq!(
            root.to_relative_path("data/game/materials/a.mat").as_str(),
            "data/game/materials/a.mat"
        );
    }

    #[test]
    fn relative_root_matches_absolute_input() {
        let root = EngineRoot::new(".");
        assert!(root.path().is_absolute());
        let cwd = std::env::current_dir().unwrap();
        let picked = cwd.join("Materials").join("a.mat");
        let path = root.to_relative_path(&picked.to_string_lossy());
        assert_eq!(path.as_str(), "materials/a.mat");
    }

    #[test]
    fn to_absolute_finds_the_spelling_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Materials")).unwrap();
        fs::write(dir.path().join("Materials/Stone.mat"), "{}").unwrap();
        let root = EngineRoot::new(dir.path());

        let located = root.to_absolute(&ResourcePath::new("materials/stone.mat"));
        assert_eq!(located, root.path().join("Materials").join("Stone.mat"));

        let fresh = root.to_absolute(&ResourcePath::new("materials/New.mat"));
        assert_eq!(fresh, root.path().join("Materials").join("New.mat"));
    }

    #[test]
    fn temp_sibling_appends_suffix() {
        let path = ResourcePath::new("Materials/Stone.mat");
        assert_eq!(path.temp_sibling().as_str(), "materials/stone.mat.tmp");
        assert_eq!(path.temp_sibling().spelling(), "Materials/Stone.mat.tmp");
    }

    #[test]
    fn serializes_with_its_spelling() {
        let path = ResourcePath::new("Shaders/Rigid.SHD");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"Shaders/Rigid.SHD\"");
        let back: ResourcePath = serde_json::from_str("\"SHADERS\\\\rigid.shd\"").unwrap();
        assert_eq!(back, path);
        assert_eq!(back.spelling(), "SHADERS/rigid.shd");
    }
}
