use std::io;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::config::LogConfig;

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber from the engine's `[log]` settings: the
/// debug flag picks the level, a configured directory adds a daily rolling
/// file alongside stdout. Later calls are no-ops, so every entry point
/// (server binary, embedded use, tests) can initialize unconditionally.
pub fn init(config: &LogConfig) {
    let level = if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let dir = config.dir.clone();

    INIT.get_or_init(|| {
        let format = fmt::format()
            .with_file(true)
            .with_line_number(false)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .compact();

        match dir {
            Some(dir) => {
                // file plus stdout; the file side never carries ansi codes
                let file_appender = rolling::daily(format!("{}/engine", dir), "engine.log");
                let _ = tracing_subscriber::fmt()
                    .with_max_level(level)
                    .event_format(format)
                    .with_writer(file_appender.and(io::stdout))
                    .with_ansi(false)
                    .try_init();
            }
            None => {
                let _ = tracing_subscriber::fmt()
                    .with_max_level(level)
                    .event_format(format)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod test {
    use tracing::{debug, info};

    use crate::config::LogConfig;

    #[test]
    fn init_is_idempotent() {
        let config = LogConfig {
            debug: true,
            dir: None,
        };
        super::init(&config);
        super::init(&config);

        debug!("log init test: {:?}", "debug");
        info!("log init test: {:?}", "info");
    }
}
