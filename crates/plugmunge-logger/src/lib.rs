use colored::Colorize;
use indicatif::ProgressBar;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);
static QUIET: Mutex<bool> = Mutex::new(false);
static CURRENT_PLATFORM: Mutex<Option<String>> = Mutex::new(None);
static SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

const LOG_FILE_NAME: &str = "plugmunge.log";

/// Current verbosity: 0 = warnings, 1 = debug (-v), 2 = trace (-vv)
pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map_or(0, |v| *v)
}

pub fn is_quiet() -> bool {
    QUIET.lock().ok().is_some_and(|v| *v)
}

/// Platform being processed, used to tag log-file lines
pub fn get_current_platform() -> Option<String> {
    CURRENT_PLATFORM.lock().ok().and_then(|guard| guard.clone())
}

pub fn set_current_platform(platform: Option<String>) {
    if let Ok(mut v) = CURRENT_PLATFORM.lock() {
        *v = platform;
    }
}

/// `tracing` filter directive matching the verbosity
pub fn verbosity_to_filter() -> &'static str {
    match get_verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Set verbosity and quiet mode, then start a fresh log file
pub fn init_with_verbosity(verbosity: u8, quiet: bool) -> Result<(), String> {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }
    if let Ok(mut q) = QUIET.lock() {
        *q = quiet;
    }
    init()
}

fn init() -> Result<(), String> {
    let config_dir = get_config_dir()?;
    fs::create_dir_all(&config_dir)
        .map_err(|e| format!("Failed to create config directory: {}", e))?;

    let log_file = config_dir.join(LOG_FILE_NAME);

    // One log per run
    if log_file.exists() {
        let _ = fs::remove_file(&log_file);
    }

    let mut guard = LOG_FILE
        .lock()
        .map_err(|_| "Log file lock poisoned".to_string())?;
    *guard = Some(log_file);
    Ok(())
}

fn get_config_dir() -> Result<PathBuf, String> {
    #[cfg(not(target_os = "windows"))]
    let config_dir = dirs::home_dir()
        .ok_or("Could not determine home directory")?
        .join(".config")
        .join("plugmunge");

    #[cfg(target_os = "windows")]
    let config_dir = dirs::config_dir()
        .ok_or("Could not determine config directory")?
        .join("plugmunge");

    Ok(config_dir)
}

fn write_to_log(message: &str) {
    if let Ok(log_file_guard) = LOG_FILE.lock() {
        if let Some(ref log_path) = *log_file_guard {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let platform = get_current_platform().unwrap_or_else(|| "-".to_string());
                let _ = writeln!(file, "[{}] [{}] {}", timestamp, platform, message);
            }
        }
    }
}

/// Informational message (console when verbose, always to file)
pub fn info(message: &str) {
    write_to_log(&format!("INFO {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{}", message);
    }
}

pub fn debug(message: &str) {
    write_to_log(&format!("DEBUG {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{} {}", "DEBUG:".blue().bold(), message);
    }
}

/// Warning (console unless quiet, always to file)
pub fn warn(message: &str) {
    write_to_log(&format!("WARN {}", message));
    if !is_quiet() {
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }
}

pub fn error(message: &str) {
    write_to_log(&format!("ERROR {}", message));
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn success(message: &str) {
    write_to_log(&format!("SUCCESS {}", message));
    if !is_quiet() {
        eprintln!("{} {}", "\u{2714}".green().bold(), message);
    }
}

/// Step of a longer operation; printed only at -vv
pub fn step(message: &str) {
    if get_verbosity() >= 2 {
        eprintln!("TRACE: {}", message);
    }
    write_to_log(&format!("STEP: {}", message));
}

pub fn get_log_path() -> Option<PathBuf> {
    LOG_FILE.lock().ok().and_then(|guard| guard.clone())
}

pub fn show_log_path() {
    if let Some(path) = get_log_path() {
        eprintln!("Log file: {}", path.display());
    } else if let Ok(config_dir) = get_config_dir() {
        eprintln!("Log file: {}", config_dir.join(LOG_FILE_NAME).display());
    } else {
        eprintln!("Log file location not available");
    }
}

/// Start a spinner; skipped when verbose or quiet
pub fn spinner_start(message: &str) {
    if get_verbosity() > 0 || is_quiet() {
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message.to_string());

    if let Ok(mut spinner_guard) = SPINNER.lock() {
        *spinner_guard = Some(spinner);
    }
}

pub fn spinner_stop() {
    if let Ok(mut spinner_guard) = SPINNER.lock() {
        if let Some(spinner) = spinner_guard.take() {
            spinner.finish_and_clear();
        }
    }
}

pub fn spinner_success(message: &str) {
    spinner_stop();
    success(message);
}

pub fn spinner_error(message: &str) {
    spinner_stop();
    write_to_log(&format!("ERROR {}", message));
    eprintln!("  {} {}", "✗".red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_tag_round_trip() {
        set_current_platform(Some("android".to_string()));
        assert_eq!(get_current_platform().as_deref(), Some("android"));
        set_current_platform(None);
        assert!(get_current_platform().is_none());
    }

    #[test]
    fn test_filter_for_default_verbosity() {
        assert!(matches!(verbosity_to_filter(), "warn" | "debug" | "trace"));
    }
}
