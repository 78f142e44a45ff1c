pub mod app;
pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod time;

use app::App;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

pub use error::{DeviceError, RendererError};

/// `Info` unless `RUST_LOG` says otherwise.
fn init_logging() {
    let _ = logger_builder().try_init();
}

fn logger_builder() -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .parse_default_env();
    builder
}

/// Opens the viewer window and blocks until it is closed.
pub fn run() -> Result<(), winit::error::EventLoopError> {
    init_logging();

    let settings = RenderSettings::load();
    log::info!(
        "Starting forward-viewer ({}x{}, shadow map {})",
        settings.resolution.width,
        settings.resolution.height,
        settings.shadow_map_size
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);
    event_loop
        .run_app(&mut app)
        .inspect_err(|err| log::error!("Event loop terminated: {err}"))?;

    log::info!("Viewer closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_defaults_to_info() {
        // Only meaningful when the harness runs without RUST_LOG.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let logger = logger_builder().build();
        assert_eq!(logger.filter(), log::LevelFilter::Info);
    }

    #[test]
    fn explicit_filter_overrides_the_default() {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Info).parse_filters("warn");
        assert_eq!(builder.build().filter(), log::LevelFilter::Warn);
    }
}
