use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Archive-internal name of `path`: relative to `base`, forward slashes
fn entry_name(base: &Path, path: &Path) -> io::Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{:?} is outside of {:?}", path, base),
        )
    })?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

/// Every directory under `root`, parents before children
pub fn collect_directories(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut directories = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            directories.push(entry.into_path());
        }
    }
    Ok(directories)
}

/// Write a tar of `directories` followed by `files`, named relative to
///  `base`. Any previous archive at `output` is replaced; a failed write
///  leaves no archive behind.
pub fn write_archive(
    base: &Path,
    directories: &[PathBuf],
    files: &[PathBuf],
    output: &Path,
) -> io::Result<usize> {
    match std::fs::remove_file(output) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let result = append_all(base, directories, files, output);
    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result
}

fn append_all(
    base: &Path,
    directories: &[PathBuf],
    files: &[PathBuf],
    output: &Path,
) -> io::Result<usize> {
    let mut builder = tar::Builder::new(File::create(output)?);

    for directory in directories {
        builder.append_dir(entry_name(base, directory)?, directory)?;
    }
    for file in files {
        builder.append_path_with_name(file, entry_name(base, file)?)?;
    }

    builder.into_inner()?.sync_all()?;
    Ok(directories.len() + files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_lists_directories_first_with_relative_names() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("_stems");
        let export_root = base.join("bandcsmxjam007");
        std::fs::create_dir_all(export_root.join("a")).unwrap();
        std::fs::create_dir_all(export_root.join("b")).unwrap();
        let file_a = export_root.join("a").join("abc");
        let file_b = export_root.join("b").join("bcd");
        std::fs::write(&file_a, b"aaaa").unwrap();
        std::fs::write(&file_b, b"bb").unwrap();

        let output = temp.path().join("out.tar");
        std::fs::write(&output, b"stale").unwrap();

        let directories = collect_directories(&export_root).unwrap();
        let count =
            write_archive(&base, &directories, &[file_a, file_b], &output).unwrap();
        assert_eq!(count, 5);

        let mut archive = tar::Archive::new(File::open(&output).unwrap());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().trim_end_matches('/').to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "bandcsmxjam007",
                "bandcsmxjam007/a",
                "bandcsmxjam007/b",
                "bandcsmxjam007/a/abc",
                "bandcsmxjam007/b/bcd",
            ]
        );
    }

    #[test]
    fn test_file_outside_base_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let stray = temp.path().join("stray");
        std::fs::write(&stray, b"x").unwrap();
        let output = temp.path().join("out.tar");

        let err = write_archive(&temp.path().join("_stems"), &[], &[stray], &output).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!output.exists());
    }
}
