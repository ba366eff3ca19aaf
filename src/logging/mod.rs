use std::{fmt::Write as _, thread};

use chrono::{format::DelayedFormat, Local};
use crossbeam_channel::{unbounded, Sender};
use once_cell::sync::Lazy;

use crate::logging::rotate::Rotate;

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("poller"));

/// File logger whose writes happen on background threads, one file per level.
pub struct Logger {
    info_writer: Sender<String>,
    warn_writer: Sender<String>,
    error_writer: Sender<String>,
    debug_writer: Sender<String>,
}

impl Logger {
    pub(crate) fn new(log_name: &str) -> Self {
        Logger {
            info_writer: Self::create_writer(&format!("{}_info", log_name)),
            warn_writer: Self::create_writer(&format!("{}_warn", log_name)),
            error_writer: Self::create_writer(&format!("{}_error", log_name)),
            debug_writer: Self::create_writer(&format!("{}_debug", log_name)),
        }
    }

    pub(crate) fn info(&self, log: String) {
        self.send(log, &self.info_writer);
    }

    pub(crate) fn warn(&self, log: String) {
        self.send(log, &self.warn_writer);
    }

    pub(crate) fn error(&self, log: String) {
        self.send(log, &self.error_writer);
    }

    pub(crate) fn debug(&self, log: String) {
        self.send(log, &self.debug_writer);
    }

    fn send(&self, msg: String, writer: &Sender<String>) {
        if let Err(why) = writer.send(msg) {
            error_console(why.to_string());
        }
    }

    fn create_writer(log_name: &str) -> Sender<String> {
        let (tx, rx) = unbounded::<String>();
        let mut rotate = Rotate::new(format!("log/%Y-%m-%d-{}.log", log_name));

        // file writes stay off the caller's thread
        thread::spawn(move || {
            let mut lines = String::with_capacity(2048);

            for received in &rx {
                let now = Local::now();
                if writeln!(&mut lines, "{} {}", now.format("%F %X%.6f"), received).is_err() {
                    continue;
                }

                if rx.is_empty() || lines.len() >= 2048 {
                    if let Err(why) = rotate.write_msg(now, lines.as_bytes()) {
                        error_console(format!(
                            "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                            why, lines
                        ));
                    }

                    rotate.flush();
                    lines.clear();
                }
            }
        });

        tx
    }
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
