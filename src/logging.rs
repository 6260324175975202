//! Global logger, colored by level

use std::fmt;

#[allow(unused)]
use log::{self, Level, LevelFilter, Log, Metadata, Record};

struct SimpleLogger;

#[allow(unused_parens)]
impl log::Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if (self.enabled(record.metadata())) {
            print_with_color(
                format_args!("[{}] {}", record.level().to_level_filter(), record.args()),
                log_level_to_color_code(record.level()),
            );
        }
    }

    fn flush(&self) {}
}

/// install the logger, level taken from the LOG env var
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    // 重复init时set_logger会失败，直接忽略
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(match std::env::var("LOG").as_deref() {
        Ok("error") => LevelFilter::Error,
        Ok("warn") => LevelFilter::Warn,
        Ok("info") => LevelFilter::Info,
        Ok("debug") => LevelFilter::Debug,
        Ok("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    });
}

fn log_level_to_color_code(level: Level) -> u8 {
    match level {
        Level::Error => 31,
        Level::Warn => 93,
        Level::Info => 34,
        Level::Debug => 32,
        Level::Trace => 90,
    }
}

fn print_with_color(args: fmt::Arguments, color_code: u8) {
    println!(
        "{}",
        format_args!("\u{1B}[{}m{}\u{1B}[0m", color_code as u8, args)
    );
}
