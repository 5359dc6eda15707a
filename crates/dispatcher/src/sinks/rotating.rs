//! Rotating file shared by the file sinks.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

/// Writes into `<directory>/<timestamp>-<id>.<extension>`, switching to a
/// new file every `max_count_per_file` records.
pub(crate) struct RotatingFile {
    directory: PathBuf,
    extension: &'static str,
    max_count_per_file: usize,
    header: &'static [u8],
    current: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    count: usize,
    /// Name stamp of the last file, names stay ordered
    last_stamp: Option<DateTime<Utc>>,
}

impl RotatingFile {
    pub fn new(directory: PathBuf, extension: &'static str, max_count_per_file: usize) -> Self {
        Self {
            directory,
            extension,
            max_count_per_file: max_count_per_file.max(1),
            header: &[],
            current: None,
            current_path: None,
            count: 0,
            last_stamp: None,
        }
    }

    /// Bytes written at the start of every file
    pub fn with_header(mut self, header: &'static [u8]) -> Self {
        self.header = header;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Creates the directory and the first file.
    pub fn open(&mut self) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        self.open_next()
    }

    /// Writes one record, rotating first when the current file is full.
    pub fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        if self.current.is_none() || self.count >= self.max_count_per_file {
            self.open_next()?;
        }
        match self.current.as_mut() {
            Some(file) => {
                file.write_all(record)?;
                self.count += 1;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no open log file")),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Flushes and closes the current file. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.current.take() {
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn open_next(&mut self) -> io::Result<()> {
        self.close()?;

        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);

        let path = self.directory.join(format!(
            "{}-{}.{}",
            stamp.format("%Y%m%dT%H%M%S%.6f"),
            &Uuid::new_v4().simple().to_string()[..8],
            self.extension
        ));
        let file = OpenOptions::new().create_new(true).write(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.header)?;

        debug!(path = ?path, "Log file opened");
        self.current = Some(writer);
        self.current_path = Some(path);
        self.count = 0;
        Ok(())
    }
}

/// Files of `directory` with `extension`, oldest first.
pub fn log_files(directory: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    Ok(files)
}
