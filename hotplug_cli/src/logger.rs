use log::*;

/// Writes `LEVEL - message` lines to stderr.
pub struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{} - {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

impl StderrLogger {
    pub fn init(level: LevelFilter) {
        static LOGGER: StderrLogger = StderrLogger;

        log::set_max_level(level);
        if let Err(err) = log::set_logger(&LOGGER) {
            eprintln!("Failed to init logger: {:?}", err);
        }
    }
}
