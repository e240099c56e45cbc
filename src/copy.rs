//! Byte-for-byte file copy into the mirrored destination.
//!
//! The copy is staged in a temporary file in the destination directory. The
//! source's permission bits, access time and modification time are applied
//! to the staged file before it is renamed into place, so the destination
//! path only ever holds a complete copy.

use crate::report::{Action, EntryEvents};
use crate::skip::should_skip;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied(PathBuf),
    Skipped,
}

#[derive(Error, Debug)]
#[error("{}: {error}", .source_path.display())]
pub struct CopyError {
    pub source_path: PathBuf,
    #[source]
    pub error: io::Error,
}

/// Copy `source` to `destination` unless it already exists and `overwrite`
/// is off. Emits `Ignored` or `Copying`.
pub fn copy(
    source: &Path,
    destination: &Path,
    overwrite: bool,
    events: EntryEvents<'_>,
) -> Result<CopyOutcome, CopyError> {
    if should_skip(destination, None, overwrite) {
        events.emit(Action::Ignored);
        return Ok(CopyOutcome::Skipped);
    }
    events.emit(Action::Copying);

    copy_staged(source, destination).map_err(|error| CopyError {
        source_path: source.to_path_buf(),
        error,
    })?;
    Ok(CopyOutcome::Copied(destination.to_path_buf()))
}

fn copy_staged(source: &Path, destination: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let metadata = input.metadata()?;

    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".raw-to-jpg-")
        .suffix(".part")
        .tempfile_in(parent)?;
    io::copy(&mut input, staged.as_file_mut())?;

    let file = staged.as_file();
    file.set_permissions(metadata.permissions())?;
    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    file.set_times(times)?;

    staged.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::time::Duration;

    #[test]
    fn copies_bytes_and_timestamps() {
        let tmp = setup_tree(&[("notes.txt", "hello")]);
        let (src, dst) = roots(&tmp);
        let source = src.join("notes.txt");
        let accessed = fixed_time() + Duration::from_secs(60);
        File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_times(
                FileTimes::new()
                    .set_modified(fixed_time())
                    .set_accessed(accessed),
            )
            .unwrap();

        let dest = dst.join("notes.txt");
        let outcome = copy(&source, &dest, false, EntryEvents::silent()).unwrap();

        // Check atime before reading the copy back.
        assert_eq!(fs::metadata(&dest).unwrap().accessed().unwrap(), accessed);
        assert_eq!(mtime(&dest), fixed_time());
        assert_eq!(outcome, CopyOutcome::Copied(dest.clone()));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn copies_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = setup_tree(&[("run.sh", "#!/bin/sh")]);
        let (src, dst) = roots(&tmp);
        let source = src.join("run.sh");
        fs::set_permissions(&source, fs::Permissions::from_mode(0o751)).unwrap();

        let dest = dst.join("run.sh");
        copy(&source, &dest, false, EntryEvents::silent()).unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o751);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let tmp = setup_tree(&[("a/b/c.txt", "deep")]);
        let (src, dst) = roots(&tmp);

        copy(&src.join("a/b/c.txt"), &dst.join("a/b/c.txt"), false, EntryEvents::silent())
            .unwrap();
        assert_tree(&dst, &["a/b/c.txt"]);
    }

    #[test]
    fn existing_destination_is_ignored() {
        let tmp = setup_tree(&[("notes.txt", "new")]);
        let (src, dst) = roots(&tmp);
        let dest = write_file(&dst, "notes.txt", "old");
        let (tx, rx) = event_channel();

        let outcome = copy(
            &src.join("notes.txt"),
            &dest,
            false,
            EntryEvents::new(Some(&tx), "/notes.txt"),
        )
        .unwrap();

        assert_eq!(outcome, CopyOutcome::Skipped);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
        assert_eq!(drain(&rx), vec![("/notes.txt".to_string(), Action::Ignored)]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn upper_case_twin_does_not_block_a_copy() {
        let tmp = setup_tree(&[("a.jpg", "mine")]);
        let (src, dst) = roots(&tmp);
        write_file(&dst, "a.JPG", "theirs");

        let outcome = copy(&src.join("a.jpg"), &dst.join("a.jpg"), false, EntryEvents::silent())
            .unwrap();
        assert!(matches!(outcome, CopyOutcome::Copied(_)));
    }

    #[test]
    fn overwrite_replaces_destination() {
        let tmp = setup_tree(&[("notes.txt", "new")]);
        let (src, dst) = roots(&tmp);
        let dest = write_file(&dst, "notes.txt", "old");

        copy(&src.join("notes.txt"), &dest, true, EntryEvents::silent()).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn missing_source_fails_without_leaving_files() {
        let tmp = setup_tree(&[]);
        let (src, dst) = roots(&tmp);

        let err = copy(&src.join("gone.txt"), &dst.join("gone.txt"), false, EntryEvents::silent())
            .unwrap_err();
        assert_eq!(err.source_path, src.join("gone.txt"));
        assert_eq!(err.error.kind(), io::ErrorKind::NotFound);
        assert_tree(&dst, &[]);
    }
}
