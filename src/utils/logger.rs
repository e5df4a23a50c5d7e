use log::{Level, LevelFilter, Metadata, Record};

pub struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if record.target().starts_with("wave_conf") {
            eprintln!("{: <6} {}", record.level(), record.args());
        } else {
            eprintln!(
                "{: <6} [{}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

pub fn init() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(Level::Warn);
    log::set_logger(&Logger).expect("Failed to initialize logger");
    log::set_max_level(level.to_level_filter());
}

/// Raise the log level to at least `debug`, for the `debug` server option.
pub fn enable_debug() {
    if log::max_level() < LevelFilter::Debug {
        log::set_max_level(LevelFilter::Debug);
    }
}
