//! Session log for the `postercraft` binary.
//!
//! One file per launch in the OS data directory, truncated on start:
//!   Windows:  `%APPDATA%\PosterCraft\postercraft.log`
//!   Linux:    `~/.local/share/PosterCraft/postercraft.log`
//!   macOS:    `~/Library/Application Support/PosterCraft/postercraft.log`
//!
//! The library logs through `log_info!` / `log_warn!` / `log_err!`. Until
//! [`init`] runs those are no-ops, so hosts embedding the engine and the test
//! suite get silence for free.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

struct Sink {
    file: File,
    /// Mirror WARN and ERROR lines to stderr.
    echo: bool,
}

static SINK: OnceLock<Mutex<Sink>> = OnceLock::new();

/// Timestamped, level-tagged line. I/O errors are swallowed.
pub fn write(level: &str, msg: &str) {
    let Some(sink) = SINK.get() else { return };
    let line = format!("[{}] [{}] {}", clock(), level, msg);
    let echo = match sink.lock() {
        Ok(mut sink) => {
            let _ = writeln!(sink.file, "{}", line);
            sink.echo
        }
        Err(_) => return,
    };
    if echo && level != "INFO" {
        eprintln!("{}", line);
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Open (truncating) the log file and hook panics into it. Call once from
/// the binary; `echo` mirrors warnings and errors to stderr.
pub fn init(echo: bool) {
    let path = data_dir().join("PosterCraft").join("postercraft.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("warning: no session log at {}: {}", path.display(), e);
            return;
        }
    };
    if SINK.set(Mutex::new(Sink { file, echo })).is_err() {
        return;
    }

    write("INFO", &format!("Session log {} (unix {})", path.display(), unix_seconds()));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write("PANIC", &info.to_string());
        prev(info);
    }));
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// HH:MM:SS, UTC.
fn clock() -> String {
    let secs = unix_seconds();
    format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
}
