// src/main.rs
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cinedex::app::CinedexApp;
use cinedex::config::load_config;

fn pick_renderer() -> eframe::Renderer {
    match env::var("CINEDEX_RENDERER").as_deref() {
        Ok("glow") => eframe::Renderer::Glow,
        Ok("wgpu") => eframe::Renderer::Wgpu,
        _ => {
            // Default: Windows = WGPU (DX12), Others = Glow (GL)
            #[cfg(target_os = "windows")]
            { eframe::Renderer::Wgpu }
            #[cfg(not(target_os = "windows"))]
            { eframe::Renderer::Glow }
        }
    }
}

fn main() -> eframe::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let cfg = load_config();
    info!(
        "Starting Cinedex (search base {}, player {})",
        cfg.search_base_url,
        cfg.player_cmd.as_deref().unwrap_or("system default")
    );

    let options = eframe::NativeOptions {
        renderer: pick_renderer(),
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1180.0, 760.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    match eframe::run_native(
        "Cinedex",
        options,
        Box::new(move |_cc| Ok(Box::new(CinedexApp::new(cfg)?))),
    ) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("eframe failed to start: {e:?}");
            error!("Hint: try CINEDEX_RENDERER=wgpu or CINEDEX_RENDERER=glow.");
            Err(e)
        }
    }
}
