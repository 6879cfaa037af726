use std::{fs, io, path::Path};

/// Try to read the file, return None if it doesn't exist
pub fn read_optional_file(path: impl AsRef<Path>) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
        Ok(s) => Ok(Some(s)),
    }
}

/// Creates the directory, and its parents, if it doesn't exist. Returns true if it was
/// created. Something else than a directory at `dir` is an error.
pub fn ensure_dir(dir: impl AsRef<Path>) -> io::Result<bool> {
    let dir = dir.as_ref();
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(false),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists but is not a directory", dir.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map(|()| true)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");

        assert!(ensure_dir(&dir).unwrap());
        assert!(dir.is_dir());
        assert!(!ensure_dir(&dir).unwrap());
    }

    #[test]
    fn ensure_dir_on_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, "not a dir").unwrap();

        assert!(ensure_dir(&file).is_err());
    }

    #[test]
    fn optional_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("rc");
        assert!(read_optional_file(&file).unwrap().is_none());

        fs::write(&file, "--threshold 2").unwrap();
        assert_eq!(
            Some("--threshold 2"),
            read_optional_file(&file).unwrap().as_deref()
        );
    }
}
