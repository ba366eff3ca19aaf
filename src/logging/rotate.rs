use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeDelta};

use crate::logging;

/// Default max size of a single file: 10 MB
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// Default retention: 7 days
const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Date-patterned log file that also rolls over into numbered generations by size.
pub struct Rotate {
    /// strftime pattern, e.g. "log/%Y-%m-%d-poller.log"
    fn_pattern: String,
    /// file name of the current date, without generation
    cur_base_fn: String,
    /// file name currently written to
    cur_fn: String,
    out_fh: Option<BufWriter<File>>,
    /// 0, 1, 2, ... only ever grows within a day
    generation: u32,
    max_size: u64,
    current_size: u64,
    max_age: TimeDelta,
}

impl Rotate {
    pub fn new(fn_pattern: String) -> Self {
        Self::with_options(fn_pattern, DEFAULT_MAX_SIZE, DEFAULT_MAX_AGE_DAYS)
    }

    /// # Arguments
    /// * `fn_pattern` - strftime file name pattern, e.g. "log/%Y-%m-%d-poller.log"
    /// * `max_size` - max bytes per file before moving to the next generation
    /// * `max_age_days` - files older than this are removed when the date changes
    pub fn with_options(fn_pattern: String, max_size: u64, max_age_days: i64) -> Self {
        Rotate {
            fn_pattern,
            cur_base_fn: String::new(),
            cur_fn: String::new(),
            out_fh: None,
            generation: 0,
            max_size,
            current_size: 0,
            max_age: TimeDelta::try_days(max_age_days).unwrap_or(TimeDelta::days(7)),
        }
    }

    /// Appends `msg` to the file for `now`, switching file on date change or size overflow.
    pub fn write_msg(&mut self, now: DateTime<Local>, msg: &[u8]) -> Result<()> {
        let base_fn = now.format(&self.fn_pattern).to_string();

        if base_fn != self.cur_base_fn {
            self.generation = 0;
            self.cur_base_fn = base_fn;
            self.open_new_file()?;
            self.cleanup_old_files(now);
        }

        if self.current_size > 0 && self.current_size + msg.len() as u64 > self.max_size {
            self.generation += 1;
            self.open_new_file()?;
        }

        let writer = self
            .out_fh
            .as_mut()
            .ok_or_else(|| anyhow!("No log file is open for {}", self.cur_base_fn))?;
        writer.write_all(msg)?;
        self.current_size += msg.len() as u64;

        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.out_fh.as_mut() {
            if let Err(why) = writer.flush() {
                logging::error_console(format!("Failed to flush {} because {:?}", self.cur_fn, why));
            }
        }
    }

    /// generation 0: "log/2025-02-03-app.log", generation 2: "log/2025-02-03-app.2.log"
    fn generate_full_fn(base_fn: &str, generation: u32) -> String {
        if generation == 0 {
            return base_fn.to_string();
        }

        let path = Path::new(base_fn);
        let parent = path.parent().unwrap_or(Path::new(""));
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("log");

        parent
            .join(format!("{}.{}.{}", stem, generation, ext))
            .to_string_lossy()
            .to_string()
    }

    fn open_new_file(&mut self) -> Result<()> {
        self.flush();

        let filename = Self::generate_full_fn(&self.cur_base_fn, self.generation);
        if let Some(parent) = Path::new(&filename).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out_fh = Some(BufWriter::with_capacity(4096, file));
        self.cur_fn = filename;

        Ok(())
    }

    /// Removes `.log` files next to the current one that were last modified before `now - max_age`.
    fn cleanup_old_files(&self, now: DateTime<Local>) {
        let cut_off = (now - self.max_age).timestamp().max(0) as u64;
        let files = match Self::files_in_directory(&self.cur_fn) {
            Ok(files) => files,
            Err(why) => {
                logging::error_console(format!(
                    "Failed to list files next to {} because {:?}",
                    self.cur_fn, why
                ));
                return;
            }
        };

        files
            .into_iter()
            .filter(|file| file.extension().is_some_and(|ext| ext == "log"))
            .filter(|file| {
                fs::metadata(file)
                    .and_then(|metadata| metadata.modified())
                    .ok()
                    .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                    .is_some_and(|age| age.as_secs() <= cut_off)
            })
            .for_each(|file| {
                if let Err(why) = fs::remove_file(&file) {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        file.display(),
                        why
                    ));
                }
            });
    }

    fn files_in_directory<P: AsRef<Path>>(file_path: P) -> Result<Vec<PathBuf>, io::Error> {
        let parent_dir = match file_path.as_ref().parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(parent_dir)? {
            files.push(entry?.path());
        }

        Ok(files)
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn file_names(dir: &Path) -> HashSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_generation_filename() {
        let base = "log/2025-02-03-app.log";
        assert_eq!(Rotate::generate_full_fn(base, 0), "log/2025-02-03-app.log");
        assert_eq!(Rotate::generate_full_fn(base, 1), "log/2025-02-03-app.1.log");
        assert_eq!(Rotate::generate_full_fn(base, 2), "log/2025-02-03-app.2.log");
    }

    #[test]
    fn test_size_rotation_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/%Y-%m-%d-size.log", dir.path().display());
        let mut r = Rotate::with_options(pattern, 512, 7);
        let now = Local::now();

        for i in 0..50 {
            let msg = format!("Line {:03} - {}\r\n", i, "X".repeat(50));
            r.write_msg(now, msg.as_bytes()).unwrap();
        }
        r.flush();

        assert!(r.generation >= 3, "generation: {}", r.generation);

        let files = file_names(dir.path());
        assert_eq!(files.len() as u32, r.generation + 1, "{:?}", files);

        let base_fn = now.format("%Y-%m-%d-size").to_string();
        for gen in 0..=r.generation {
            let expected = if gen == 0 {
                format!("{}.log", base_fn)
            } else {
                format!("{}.{}.log", base_fn, gen)
            };
            assert!(files.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_date_change_opens_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/%Y-%m-%d-day.log", dir.path().display());
        let mut r = Rotate::new(pattern);
        let today = Local::now();
        let tomorrow = today + TimeDelta::days(1);

        r.write_msg(today, b"day 1\r\n").unwrap();
        r.write_msg(tomorrow, b"day 2\r\n").unwrap();
        r.flush();

        let files = file_names(dir.path());
        assert!(files.contains(&today.format("%Y-%m-%d-day.log").to_string()));
        assert!(files.contains(&tomorrow.format("%Y-%m-%d-day.log").to_string()));
        assert_eq!(r.generation, 0);
    }
}
