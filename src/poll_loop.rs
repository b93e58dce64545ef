//! The sample, encode and write cycle that keeps the display current.

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    config::DaemonConfig,
    drivers::ocypus::{DeviceSelector, DisplayTransport, FrameEncoder, TransportState},
    error::OpenError,
    sensors::SensorReader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Running,
    ShuttingDown,
}

/// Why [`PollLoop::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    /// `max_open_retries` consecutive opens failed; carries the last error.
    OpenRetriesExhausted(OpenError),
}

/// Owns the sensor reader and the display transport for the daemon's lifetime.
pub struct PollLoop<T: DisplayTransport> {
    config: DaemonConfig,
    reader: Box<dyn SensorReader>,
    transport: T,
    encoder: FrameEncoder,
    selector: DeviceSelector,
    mode: LoopMode,
}

impl<T: DisplayTransport> PollLoop<T> {
    pub fn new(config: DaemonConfig, reader: Box<dyn SensorReader>, transport: T) -> Self {
        let encoder = config.encoder();
        let selector = config.device_selector();
        Self {
            config,
            reader,
            transport,
            encoder,
            selector,
            mode: LoopMode::Running,
        }
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs until `cancel` fires or the open retry bound is reached.
    ///
    /// A write already started is never interrupted. The transport is closed
    /// on every exit path.
    pub async fn run(&mut self, cancel: CancellationToken) -> LoopExit {
        info!(
            "Polling '{}' via {} every {:?}, unit {}",
            self.config.sensor,
            self.reader.backend_name(),
            self.config.interval,
            self.config.unit.symbol()
        );

        let mut failed_opens: u32 = 0;

        let exit = loop {
            if cancel.is_cancelled() {
                break LoopExit::Shutdown;
            }

            if self.transport.state() != TransportState::Open {
                match self.transport.open(&self.selector) {
                    Ok(()) => failed_opens = 0,
                    Err(e) => {
                        failed_opens = failed_opens.saturating_add(1);
                        warn!("Display unavailable (attempt {failed_opens}): {e}");
                        if self
                            .config
                            .max_open_retries
                            .is_some_and(|max| failed_opens >= max)
                        {
                            break LoopExit::OpenRetriesExhausted(e);
                        }
                        if !self.pause(&cancel).await {
                            break LoopExit::Shutdown;
                        }
                        continue;
                    }
                }
            }

            match self.reader.read(&self.config.sensor).await {
                Ok(sample) => {
                    if cancel.is_cancelled() {
                        break LoopExit::Shutdown;
                    }
                    let report = self.encoder.encode(&sample, self.config.unit);
                    match self.transport.write(&report) {
                        Ok(()) => debug!("Displayed {sample}"),
                        Err(e) => warn!("{e}; reopening next cycle"),
                    }
                }
                Err(e) => warn!("Skipping display update: {e}"),
            }

            if !self.pause(&cancel).await {
                break LoopExit::Shutdown;
            }
        };

        self.mode = LoopMode::ShuttingDown;
        self.transport.close();
        info!("Poll loop stopped");
        exit
    }

    /// Sleeps one interval; `false` when cancelled first.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.interval) => true,
        }
    }
}
