//! Size-rotated log file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Log file that rotates to `<name>.1`, `<name>.2`, ... once it would grow
/// past `max_bytes`, keeping at most `max_count` rotated files.
#[derive(Debug)]
pub struct RollingFile {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
    max_count: usize,
}

impl RollingFile {
    /// Open (or create) `dir/file_name` for appending.
    ///
    /// # Errors
    ///
    /// When the directory cannot be created or the file cannot be opened.
    pub fn open(dir: &Path, file_name: &str, max_bytes: u64, max_count: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        let file = Self::open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            size,
            max_bytes: max_bytes.max(1),
            max_count,
        })
    }

    /// Path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `index`-th rotated file.
    #[must_use]
    pub fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_count == 0 {
            self.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
            self.size = 0;
            return Ok(());
        }

        let oldest = self.rotated_path(self.max_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.max_count).rev() {
            let from = self.rotated_path(index);
            if from.exists() {
                fs::rename(&from, self.rotated_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.rotated_path(1))?;
        self.file = Self::open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size.saturating_add(buf.len() as u64) > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_when_limit_would_be_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RollingFile::open(dir.path(), "worker.log", 10, 2).unwrap();

        log.write_all(b"aaaaaaaa\n").unwrap();
        log.write_all(b"bbbbbbbb\n").unwrap();
        log.write_all(b"cccccccc\n").unwrap();
        log.write_all(b"dddddddd\n").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(log.path()).unwrap(), "dddddddd\n");
        assert_eq!(fs::read_to_string(log.rotated_path(1)).unwrap(), "cccccccc\n");
        assert_eq!(fs::read_to_string(log.rotated_path(2)).unwrap(), "bbbbbbbb\n");
        assert!(!log.rotated_path(3).exists());
    }

    #[test]
    fn appends_to_existing_file_and_counts_its_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("worker.log"), b"12345678").unwrap();

        let mut log = RollingFile::open(dir.path(), "worker.log", 10, 1).unwrap();
        log.write_all(b"xyz").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(log.rotated_path(1)).unwrap(), "12345678");
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "xyz");
    }

    #[test]
    fn zero_kept_files_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RollingFile::open(dir.path().join("nested").as_path(), "w.log", 4, 0).unwrap();
        log.write_all(b"abc").unwrap();
        log.write_all(b"def").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(log.path()).unwrap(), "def");
        assert!(!log.rotated_path(1).exists());
    }
}
