use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use env_logger::Builder;
use log::LevelFilter;

/// Log target used for every record emitted by the webhook handlers.
pub const EVENT_LOG_TARGET: &str = "github_webhooks";

const LOG_DIR: &str = "logs";

/// Where handler output goes. Each call is one log record carrying a tag
/// (event key such as `push` or `star.created`) and a formatted message.
pub trait EventLog: Send + Sync {
    fn info(&self, tag: &str, message: &str);
    fn error(&self, tag: &str, message: &str);
}

/// Forwards handler output to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventLog for LogSink {
    fn info(&self, tag: &str, message: &str) {
        log::info!(target: EVENT_LOG_TARGET, "[{}] {}", tag, message);
    }

    fn error(&self, tag: &str, message: &str) {
        log::error!(target: EVENT_LOG_TARGET, "[{}] {}", tag, message);
    }
}

fn build_file_logger(log_file: &str, level: LevelFilter) -> io::Result<Builder> {
    let mut builder = Builder::new();
    builder.filter_level(level);
    // RUST_LOG still wins over the default level
    builder.parse_default_env();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            buf.timestamp(),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.target(env_logger::Target::Pipe(Box::new(file)));

    Ok(builder)
}

pub fn init_production_logger() -> io::Result<()> {
    let log_file = format!("{}/github_webhook_service.log", LOG_DIR);
    fs::create_dir_all(LOG_DIR)?;

    build_file_logger(&log_file, LevelFilter::Info)?
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    log::info!("Logger initialized - logging to {}", log_file);
    Ok(())
}
