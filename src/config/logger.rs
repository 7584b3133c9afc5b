use log::{error, LevelFilter};

pub struct Logger;

impl Logger {
    /// Initializes `log4rs` from `log4rs.yaml` if present, otherwise falls
    /// back to a stdout appender at `Info` so the proxy is runnable without
    /// requiring an operator to author a logging config first.
    pub fn init() {
        if log4rs::init_file("log4rs.yaml", Default::default()).is_err() {
            let stdout = log4rs::append::console::ConsoleAppender::builder().build();
            let fallback = log4rs::config::Config::builder()
                .appender(log4rs::config::Appender::builder().build("stdout", Box::new(stdout)))
                .build(
                    log4rs::config::Root::builder()
                        .appender("stdout")
                        .build(LevelFilter::Info),
                )
                .expect("failed to build fallback log4rs config");
            if let Err(e) = log4rs::init_config(fallback) {
                eprintln!("Failed to initialize fallback logger: {}", e);
            }
        }
    }
}

pub trait LogMsg {
    fn err(&self, msg: &str);
}

impl LogMsg for Logger {
    fn err(&self, msg: &str) {
        error!("{}", msg);
    }
}

#[cfg(test)]
mod tests_logger {
    use crate::config::logger::{LogMsg, Logger};

    #[test]
    fn test_log_error() {
        Logger::init();
        let logger = Logger;
        logger.err("Error message");
    }
}
