//! Monospec Viewer - desktop host for the catalog and asset sessions

mod app;
mod gpu;
mod pane;
mod pipelines;
mod shaders;

pub use gpu::{GpuEngine, GpuScene, SurfaceEntry, SurfaceRegistry};

use std::path::PathBuf;
use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

/// Run the viewer on a catalog root. `log_filter` is used when `RUST_LOG` is unset.
pub fn run(root: Option<PathBuf>, log_filter: Option<String>) -> Result<()> {
    // eframe and wgpu log through `log`
    let _ = env_logger::try_init();

    let settings = Settings::load();
    let filter = log_filter.or_else(|| settings.log_filter.clone());
    let trace_guard = init_tracing(filter.as_deref());

    // Friendly panic handler for GPU errors
    std::panic::set_hook(Box::new(|info| {
        let msg = info.payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("Unknown error");

        if msg.contains("wgpu") || msg.contains("Buffer") || msg.contains("shader") {
            eprintln!("\n[GPU Error] {}", msg);
            eprintln!("\nThe model preview hit a GPU validation error.");
        } else {
            eprintln!("\n[Error] {}", msg);
            if let Some(loc) = info.location() {
                eprintln!("  at {}:{}:{}", loc.file(), loc.line(), loc.column());
            }
        }
    }));

    let root = settings.resolve_root(root.as_deref());
    tracing::info!(root = %root.display(), "starting viewer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width, settings.window_height])
            .with_title("Monospec"),
        renderer: eframe::Renderer::Wgpu,
        wgpu_options: egui_wgpu::WgpuConfiguration {
            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                device_descriptor: std::sync::Arc::new(|adapter| {
                    let base_limits = if adapter.get_info().backend == wgpu::Backend::Gl {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    };
                    wgpu::DeviceDescriptor {
                        label: Some("monospec device"),
                        // Wireframe needs line polygons; fall back to shaded without them.
                        required_features: adapter.features() & wgpu::Features::POLYGON_MODE_LINE,
                        required_limits: base_limits,
                        ..Default::default()
                    }
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "Monospec",
        options,
        Box::new(move |cc| Ok(Box::new(app::MonospecApp::new(cc, settings, root, trace_guard)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}

/// Install the fmt subscriber, plus a Chrome trace when `MONOSPEC_TRACE=1`.
fn init_tracing(filter: Option<&str>) -> Option<tracing_chrome::FlushGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or("info,wgpu_core=warn,wgpu_hal=warn")));

    let (chrome_layer, guard) = if std::env::var("MONOSPEC_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(chrome_layer)
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }

    guard
}
