//! Log backend selection and daemonizing.

use std::fs::File;

use anyhow::{Result, anyhow};
use daemonize::Daemonize;
use log::LevelFilter;
use syslog::{BasicLogger, Facility, Formatter3164};

pub const PROCESS_NAME: &str = "ocypus_lcdd";
pub const DAEMON_LOG: &str = "/var/tmp/ocypus_lcdd.log";

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Syslog,
    Stderr,
}

impl LogTarget {
    pub fn select(syslog: bool) -> Self {
        if syslog { Self::Syslog } else { Self::Stderr }
    }
}

/// Installs the global logger. `RUST_LOG` overrides `level` on stderr.
pub fn init_log(target: LogTarget, level: LevelFilter) -> Result<()> {
    match target {
        LogTarget::Syslog => init_syslog(level),
        LogTarget::Stderr => env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(level.as_str()),
        )
        .try_init()
        .map_err(|e| anyhow!("{e}")),
    }
}

fn init_syslog(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: PROCESS_NAME.into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

/// Detaches from the terminal with stdout and stderr sent to [`DAEMON_LOG`].
pub fn into_daemon() -> Result<()> {
    File::create(DAEMON_LOG)
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syslog_flag_selects_target() {
        assert_eq!(LogTarget::select(true), LogTarget::Syslog);
        assert_eq!(LogTarget::select(false), LogTarget::Stderr);
    }
}
