use crate::config::{LoggingConfig, Section};
use crate::home_dir::resolve_under;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io::{IsTerminal, Write},
    path::Path,
    sync::Arc,
};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

fn level_filter(s: &str) -> LevelFilter {
    parse_tracing_level(s)
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::OFF)
}

/// Returns true if target == crate_name or target starts with "crate_name::"
fn matches_crate_prefix(target: &str, crate_name: &str) -> bool {
    target == crate_name
        || (target.starts_with(crate_name) && target[crate_name.len()..].starts_with("::"))
}

type SharedRotate = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct RotWriterHandle(Option<SharedRotate>);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(w) => w.lock().write(buf),
            // no file for this target: drop silently
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(w) => w.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Routes JSON log records to per-subsystem files by target prefix,
/// falling back to the "default" section's file.
#[derive(Default)]
struct MultiFileRouter {
    default: Option<SharedRotate>,
    by_prefix: HashMap<String, SharedRotate>,
}

impl MultiFileRouter {
    fn resolve_for(&self, target: &str) -> Option<SharedRotate> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| matches_crate_prefix(target, prefix))
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for MultiFileRouter {
    type Writer = RotWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RotWriterHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RotWriterHandle(self.resolve_for(meta.target()))
    }
}

/// Create a rotating writer, ensuring the parent directory exists.
fn create_rotating_writer_at_path(
    log_path: &Path,
    section: &Section,
) -> std::io::Result<SharedRotate> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    let rot = FileRotate::new(
        log_path,
        AppendTimestamp::default(FileLimit::MaxFiles(backups)),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(rot)))
}

fn open_section_file(name: &str, section: &Section, base_dir: &Path) -> Option<SharedRotate> {
    if section.file.trim().is_empty() {
        return None;
    }
    let log_path = resolve_under(base_dir, &section.file);
    match create_rotating_writer_at_path(&log_path, section) {
        Ok(w) => Some(w),
        Err(e) => {
            eprintln!(
                "Failed to init log file for '{}': {} ({})",
                name,
                log_path.display(),
                e
            );
            None
        }
    }
}

/// Per-target filters for the console and the file layer.
fn build_targets(cfg: &LoggingConfig) -> (Targets, Targets) {
    let default = cfg.get("default");
    let mut console = Targets::new().with_default(
        default
            .map(|s| level_filter(&s.console_level))
            .unwrap_or(LevelFilter::INFO),
    );
    let mut file = Targets::new().with_default(
        default
            .filter(|s| !s.file.trim().is_empty())
            .map(|s| level_filter(&s.file_level))
            .unwrap_or(LevelFilter::OFF),
    );

    for (name, section) in cfg.iter().filter(|(k, _)| k.as_str() != "default") {
        console = console.with_target(name.clone(), level_filter(&section.console_level));
        // a subsystem without its own file still lands in the default file
        let file_level = if section.file.trim().is_empty() && section.file_level.is_empty() {
            default
                .map(|s| level_filter(&s.file_level))
                .unwrap_or(LevelFilter::OFF)
        } else {
            level_filter(&section.file_level)
        };
        file = file.with_target(name.clone(), file_level);
    }
    (console, file)
}

fn build_file_router(cfg: &LoggingConfig, base_dir: &Path) -> MultiFileRouter {
    let mut router = MultiFileRouter::default();
    for (name, section) in cfg {
        let Some(writer) = open_section_file(name, section, base_dir) else {
            continue;
        };
        if name == "default" {
            router.default = Some(writer);
        } else {
            router.by_prefix.insert(name.clone(), writer);
        }
    }
    router
}

/// Initialize the global subscriber.
/// - `cfg`: logging sections keyed by target ("default" is the catch-all)
/// - `base_dir`: anchor for relative log file paths (usually server.home_dir)
///
/// Console output is human readable; file output is JSON, rotated by size.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, prelude::*, Registry};

    // Bridge `log` → `tracing` before installing the subscriber
    let _ = tracing_log::LogTracer::init();

    let (console_targets, file_targets) = build_targets(cfg);
    let ansi = std::io::stdout().is_terminal();

    let console_layer = fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let router = build_file_router(cfg, base_dir);
    if router.is_empty() {
        let _ = Registry::default().with(console_layer).try_init();
        return;
    }

    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(router)
        .with_filter(file_targets);

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
