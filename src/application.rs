//! Application entry point and builder pattern implementation.

use anyhow::{Context, Result, anyhow};
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use crate::{
    config::DaemonConfig,
    drivers::ocypus::{
        DeviceSelector, DisplayTransport, FrameEncoder, HidTransport, device_io::InterfaceInfo,
    },
    poll_loop::{LoopExit, PollLoop},
    sensors::SensorListing,
    temperature_sensors::build_reader,
};

/// The daemon and its one-shot commands, configured once at start-up.
///
/// # Example
///
/// ```no_run
/// use ocypus_lcdd::application::Application;
/// use ocypus_lcdd::config::DaemonConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let app = Application::builder()
///     .with_config(DaemonConfig::default())
///     .build()?;
///
/// app.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    config: DaemonConfig,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Keeps the display updated until SIGINT or SIGTERM.
    pub async fn run(&self) -> Result<LoopExit> {
        let reader = build_reader(self.config.backend);
        let transport = HidTransport::system(self.config.encoder())?;
        let mut poll = PollLoop::new(self.config.clone(), reader, transport);

        let cancel = CancellationToken::new();
        let run = poll.run(cancel.clone());
        tokio::pin!(run);

        let exit = tokio::select! {
            exit = &mut run => exit,
            signalled = shutdown_signal() => {
                match signalled {
                    Ok(()) => info!("Shutdown requested"),
                    Err(e) => error!("Signal handling failed, shutting down: {e:#}"),
                }
                cancel.cancel();
                run.await
            }
        };
        Ok(exit)
    }

    /// Blanks the display and releases it.
    pub fn off(&self) -> Result<()> {
        let encoder = self.config.encoder();
        let mut transport = HidTransport::system(encoder)?;
        blank_display(&mut transport, &self.config.device_selector(), encoder)
    }

    /// One line per HID interface of the cooler.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut transport = HidTransport::system(self.config.encoder())?;
        let interfaces = transport.list_interfaces()?;
        Ok(interfaces.iter().map(describe_interface).collect())
    }

    /// One line per temperature input, `*` marking the configured source.
    pub fn sensors(&self) -> Vec<String> {
        build_reader(self.config.backend)
            .list()
            .iter()
            .map(|listing| describe_listing(listing, &self.config.sensor))
            .collect()
    }
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config: Option<DaemonConfig>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self { config: None }
    }

    pub fn with_config(mut self, config: DaemonConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the Application instance with the provided configuration.
    pub fn build(self) -> Result<Application> {
        let config = self
            .config
            .ok_or_else(|| anyhow!("Daemon configuration is required"))?;

        Ok(Application { config })
    }
}

/// Opens the display, writes the blank frame and closes it again.
pub fn blank_display<T: DisplayTransport>(
    transport: &mut T,
    selector: &DeviceSelector,
    encoder: FrameEncoder,
) -> Result<()> {
    transport.open(selector)?;
    let written = transport.write(&encoder.blank());
    transport.close();
    written?;
    info!("Display blanked");
    Ok(())
}

fn describe_interface(info: &InterfaceInfo) -> String {
    format!(
        "interface={} usage_page={:#06x} usage={:#06x} path={} product={}",
        info.interface_number,
        info.usage_page,
        info.usage,
        info.path,
        info.product.as_deref().unwrap_or("N/A")
    )
}

fn describe_listing(listing: &SensorListing, source: &str) -> String {
    let mark = if listing.matches(source) { '*' } else { ' ' };
    format!(
        "{mark} {}/{}: {:.1}°C",
        listing.chip, listing.label, listing.celsius
    )
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => interrupted.context("wait for SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
