use std::{
    fmt, fs,
    io::{self, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bitflags::bitflags;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{error, info, warn};

use crate::{
    meta::Material,
    resource::{EngineRoot, LoadError, ResourceLoader, ResourcePath},
};

/// File system errors surfaced to GUI tooling.
#[derive(Debug)]
pub enum ProjectIoError {
    Missing {
        path: PathBuf,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ProjectIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectIoError::Missing { path } => {
                write!(f, "missing file: {}", path.display())
            }
            ProjectIoError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            ProjectIoError::Corrupt { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ProjectIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectIoError::Missing { .. } => None,
            ProjectIoError::Io { source, .. } => Some(source),
            ProjectIoError::Corrupt { source, .. } => Some(source),
        }
    }
}

pub fn read_json_file_blocking<T>(path: impl AsRef<Path>) -> Result<T, ProjectIoError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let data = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ProjectIoError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(ProjectIoError::Io {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    serde_json::from_str(&data).map_err(|source| ProjectIoError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        const READ = 1;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
    }
}

/// A writable file obtained from [`FileSystem::open`].
pub trait OpenFile: Write + Send {}

impl<W: Write + Send> OpenFile for W {}

/// The engine file system as seen by the editor. Paths are resource paths
/// relative to the engine root.
pub trait FileSystem: Send + Sync {
    /// Opens `path` for writing. Failure is reported as `None`, never as a
    /// panic or error value, and is logged by the implementation.
    fn open(&self, path: &ResourcePath, mode: OpenMode) -> Option<Box<dyn OpenFile>>;

    /// Flushes and closes a file returned by `open`.
    fn close(&self, file: Box<dyn OpenFile>) -> io::Result<()>;

    fn read_to_string(&self, path: &ResourcePath) -> io::Result<String>;

    /// Removes `path`. Removing a file that does not exist succeeds.
    fn remove(&self, path: &ResourcePath) -> io::Result<()>;

    fn rename(&self, from: &ResourcePath, to: &ResourcePath) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct DiskFileSystem {
    root: EngineRoot,
}

impl DiskFileSystem {
    pub fn new(root: EngineRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &EngineRoot {
        &self.root
    }
}

impl FileSystem for DiskFileSystem {
    fn open(&self, path: &ResourcePath, mode: OpenMode) -> Option<Box<dyn OpenFile>> {
        let absolute = self.root.to_absolute(path);
        if mode.contains(OpenMode::CREATE) {
            if let Some(parent) = absolute.parent() {
                if let Err(err) = fs::create_dir_all(parent) {
                    warn!(path = %path, error = %err, "could not create parent directory");
                    return None;
                }
            }
        }

        let opened = fs::OpenOptions::new()
            .read(mode.contains(OpenMode::READ))
            .write(mode.contains(OpenMode::WRITE))
            .create(mode.contains(OpenMode::CREATE))
            .truncate(mode.contains(OpenMode::CREATE | OpenMode::WRITE))
            .open(&absolute);
        match opened {
            Ok(file) => Some(Box::new(BufWriter::new(file))),
            Err(err) => {
                warn!(path = %path, error = %err, "open failed");
                None
            }
        }
    }

    fn close(&self, mut file: Box<dyn OpenFile>) -> io::Result<()> {
        file.flush()
    }

    fn read_to_string(&self, path: &ResourcePath) -> io::Result<String> {
        fs::read_to_string(self.root.to_absolute(path))
    }

    fn remove(&self, path: &ResourcePath) -> io::Result<()> {
        match fs::remove_file(self.root.to_absolute(path)) {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn rename(&self, from: &ResourcePath, to: &ResourcePath) -> io::Result<()> {
        fs::rename(self.root.to_absolute(from), self.root.to_absolute(to))
    }
}

#[derive(Debug)]
pub enum SaveError {
    /// The temporary file could not be created. Nothing on disk changed.
    Open { temp: ResourcePath },
    /// The value could not be encoded. The temporary file was removed and
    /// the original is untouched.
    Serialize {
        temp: ResourcePath,
        source: serde_json::Error,
    },
    /// Writing into the temporary file failed. The temporary file was
    /// removed and the original is untouched.
    Write {
        temp: ResourcePath,
        source: io::Error,
    },
    /// The new contents are complete in `temp` but could not replace `path`.
    /// `temp` is left on disk for manual recovery.
    Swap {
        path: ResourcePath,
        temp: ResourcePath,
        source: io::Error,
    },
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Open { temp } => write!(f, "could not open {} for writing", temp),
            SaveError::Serialize { temp, source } => {
                write!(f, "failed to encode {}: {}", temp, source)
            }
            SaveError::Write { temp, source } => {
                write!(f, "failed to write {}: {}", temp, source)
            }
            SaveError::Swap { path, temp, source } => write!(
                f,
                "wrote {} but could not replace {}: {}",
                temp, path, source
            ),
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveError::Open { .. } => None,
            SaveError::Serialize { source, .. } => Some(source),
            SaveError::Write { source, .. } => Some(source),
            SaveError::Swap { source, .. } => Some(source),
        }
    }
}

/// Writes `value` as pretty JSON to `<path>.tmp`, then swaps it over `path`.
///
/// The live resource may be re-read while this runs; readers never observe a
/// half-written `path`.
pub fn save_atomic<T>(fs: &dyn FileSystem, path: &ResourcePath, value: &T) -> Result<(), SaveError>
where
    T: Serialize,
{
    let temp = path.temp_sibling();
    let Some(mut file) = fs.open(&temp, OpenMode::CREATE | OpenMode::WRITE) else {
        error!(path = %path, "could not save file");
        return Err(SaveError::Open { temp });
    };

    let written = match serde_json::to_writer_pretty(&mut file, value) {
        Ok(()) => file.write_all(b"\n"),
        Err(err) if err.is_io() => Err(io::Error::from(err)),
        Err(source) => {
            error!(path = %path, error = %source, "could not encode value");
            drop(file);
            discard_temp(fs, &temp);
            return Err(SaveError::Serialize { temp, source });
        }
    };
    let closed = fs.close(file);
    if let Err(source) = written.and(closed) {
        error!(path = %path, error = %source, "failed to write temporary file");
        discard_temp(fs, &temp);
        return Err(SaveError::Write { temp, source });
    }

    let swapped = fs.remove(path).and_then(|_| fs.rename(&temp, path));
    if let Err(source) = swapped {
        error!(path = %path, temp = %temp, error = %source, "save left a temporary file behind");
        return Err(SaveError::Swap {
            path: path.clone(),
            temp,
            source,
        });
    }

    info!(resource = "material", path = %path, "saved");
    Ok(())
}

fn discard_temp(fs: &dyn FileSystem, temp: &ResourcePath) {
    if let Err(err) = fs.remove(temp) {
        warn!(path = %temp, error = %err, "could not remove temporary file");
    }
}

/// Loads `.mat` files through a [`FileSystem`].
#[derive(Clone)]
pub struct MaterialLoader {
    fs: Arc<dyn FileSystem>,
}

impl MaterialLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ResourceLoader<Material> for MaterialLoader {
    fn load(&self, path: &ResourcePath) -> Result<Material, LoadError> {
        let raw = self
            .fs
            .read_to_string(path)
            .map_err(|err| LoadError::new(path.clone(), err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| LoadError::new(path.clone(), err.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Disk file system whose `remove` always fails, to strand a save between
    /// the write and the swap.
    pub(crate) struct StuckRemove(pub DiskFileSystem);

    impl FileSystem for StuckRemove {
        fn open(&self, path: &ResourcePath, mode: OpenMode) -> Option<Box<dyn OpenFile>> {
            self.0.open(path, mode)
        }

        fn close(&self, file: Box<dyn OpenFile>) -> io::Result<()> {
            self.0.close(file)
        }

        fn read_to_string(&self, path: &ResourcePath) -> io::Result<String> {
            self.0.read_to_string(path)
        }

        fn remove(&self, _path: &ResourcePath) -> io::Result<()> {
            Err(io::Error::new(ErrorKind::PermissionDenied, "file is locked"))
        }

        fn rename(&self, from: &ResourcePath, to: &ResourcePath) -> io::Result<()> {
            self.0.rename(from, to)
        }
    }

    fn disk() -> (tempfile::TempDir, DiskFileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let fs = DiskFileSystem::new(EngineRoot::new(dir.path()));
        (dir, fs)
    }

    fn on_disk(fs: &DiskFileSystem, path: &ResourcePath) -> bool {
        fs.root().to_absolute(path).exists()
    }

    fn read_material(fs: &dyn FileSystem, path: &ResourcePath) -> Material {
        serde_json::from_str(&fs.read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn save_replaces_existing_file() {
        let (_dir, fs) = disk();
        let path = ResourcePath::new("materials/stone.mat");
        save_atomic(&fs, &path, &Material::default()).unwrap();

        let edited = Material {
            alpha_to_coverage: true,
            textures: vec![ResourcePath::new("textures/a.dds")],
            ..Material::default()
        };
        save_atomic(&fs, &path, &edited).unwrap();

        assert_eq!(read_material(&fs, &path), edited);
        assert!(!on_disk(&fs, &path.temp_sibling()));
    }

    #[test]
    fn save_keeps_the_spelling_on_disk() {
        let (dir, fs) = disk();
        fs::create_dir_all(dir.path().join("Materials")).unwrap();
        fs::write(
            dir.path().join("Materials/Stone.mat"),
            serde_json::to_string(&Material::default()).unwrap(),
        )
        .unwrap();

        let edited = Material {
            backface_culling: false,
            ..Material::default()
        };
        save_atomic(&fs, &ResourcePath::new("Materials/Stone.mat"), &edited).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path().join("Materials"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Stone.mat".to_string()]);
        assert_eq!(
            read_material(&fs, &ResourcePath::new("materials/stone.mat")),
            edited
        );
    }

    #[test]
    fn failed_swap_keeps_both_files() {
        let (_dir, disk) = disk();
        let path = ResourcePath::new("materials/stone.mat");
        save_atomic(&disk, &path, &Material::default()).unwrap();

        let stuck = StuckRemove(disk.clone());
        let edited = Material {
            z_test: false,
            ..Material::default()
        };
        let err = save_atomic(&stuck, &path, &edited).unwrap_err();
        assert!(matches!(err, SaveError::Swap { .. }));

        assert_eq!(read_material(&disk, &path), Material::default());
        assert_eq!(read_material(&disk, &path.temp_sibling()), edited);
    }

    #[test]
    fn unopenable_temp_file_leaves_original_alone() {
        let (dir, fs) = disk();
        let path = ResourcePath::new("materials/stone.mat");
        save_atomic(&fs, &path, &Material::default()).unwrap();
        fs::create_dir_all(dir.path().join("materials/stone.mat.tmp")).unwrap();

        let err = save_atomic(
            &fs,
            &path,
            &Material {
                z_test: false,
                ..Material::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SaveError::Open { .. }));
        assert_eq!(read_material(&fs, &path), Material::default());
    }

    #[test]
    fn unencodable_value_removes_temp_file() {
        use std::collections::HashMap;

        let (_dir, fs) = disk();
        let path = ResourcePath::new("materials/odd.mat");
        let mut odd = HashMap::new();
        odd.insert((1, 2), true);

        let err = save_atomic(&fs, &path, &odd).unwrap_err();
        assert!(matches!(err, SaveError::Serialize { .. }));
        assert!(!on_disk(&fs, &path.temp_sibling()));
        assert!(!on_disk(&fs, &path));
    }

    #[test]
    fn loader_reports_missing_and_corrupt_files() {
        let (dir, fs) = disk();
        let loader = MaterialLoader::new(Arc::new(fs));
        let missing = loader.load(&ResourcePath::new("materials/none.mat")).unwrap_err();
        assert_eq!(missing.path.as_str(), "materials/none.mat");

        fs::create_dir_all(dir.path().join("materials")).unwrap();
        fs::write(dir.path().join("materials/bad.mat"), "{ not json").unwrap();
        assert!(loader.load(&ResourcePath::new("materials/bad.mat")).is_err());
    }

    #[test]
    fn missing_config_is_reported_as_missing() {
        let (dir, _) = disk();
        let err = read_json_file_blocking::<Material>(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ProjectIoError::Missing { .. }));
    }
}
