use std::{fs, io, path::Path};

use tracing::debug;

use crate::resource::{EngineRoot, ResourcePath};

/// Every file with the material extension under the engine root, as sorted
/// resource paths.
pub fn scan_materials(root: &EngineRoot, extension: &str) -> io::Result<Vec<ResourcePath>> {
    let extension = extension.to_lowercase();
    let mut found = Vec::new();
    walk(root.path(), &mut |path| {
        let matches = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == extension)
            .unwrap_or(false);
        if matches {
            found.push(root.to_relative_path(&path.to_string_lossy()));
        }
    })?;
    found.sort();
    found.dedup();
    debug!(count = found.len(), root = %root.path().display(), "scanned materials");
    Ok(found)
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_materials_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = EngineRoot::new(dir.path());
        fs::create_dir_all(dir.path().join("materials/props")).unwrap();
        fs::write(dir.path().join("materials/Stone.MAT"), "{}").unwrap();
        fs::write(dir.path().join("materials/props/crate.mat"), "{}").unwrap();
        fs::write(dir.path().join("materials/props/crate.mat.tmp"), "{}").unwrap();
        fs::write(dir.path().join("materials/readme.txt"), "").unwrap();

        let found = scan_materials(&root, "mat").unwrap();
        let names: Vec<_> = found.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["materials/props/crate.mat", "materials/stone.mat"]);
        assert_eq!(found[1].spelling(), "materials/Stone.MAT");
        assert!(root.to_absolute(&found[1]).is_file());
    }
}
