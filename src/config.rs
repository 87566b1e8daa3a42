//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "timer-keeper")]
#[command(about = "A state-managed countdown timer service with categories and history")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding the persisted timers, categories and history
    #[arg(short, long, default_value = "./timer-data")]
    pub data_dir: PathBuf,

    /// Skip persisting every countdown tick; pending ticks are flushed on
    /// pause, completion and shutdown
    #[arg(long)]
    pub coalesce_ticks: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = Config::try_parse_from(["timer-keeper"]).unwrap();
        assert_eq!(config.port, 20554);
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert!(!config.coalesce_ticks);
    }

    #[test]
    fn verbose_and_coalescing_flags() {
        let config =
            Config::try_parse_from(["timer-keeper", "-v", "--coalesce-ticks", "-d", "/tmp/t"])
                .unwrap();
        assert_eq!(config.log_level(), "debug");
        assert!(config.coalesce_ticks);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/t"));
    }
}
