use std::{path::PathBuf, sync::Arc};

use eframe::egui;
use shikake::{
    material_editor::{
        config::EditorConfig,
        io::{DiskFileSystem, FileSystem, MaterialLoader},
        preview::PreviewSlot,
        session::{MaterialEditSession, SessionInfo},
        ui::MaterialEditorApp,
    },
    meta::Material,
    resource::{ResourceManager, ResourceManagerInfo},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> eframe::Result<()> {
    let config = match parse_config_path() {
        Some(path) => match EditorConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load config at {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => EditorConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let fs: Arc<dyn FileSystem> = Arc::new(DiskFileSystem::new(config.root()));
    let manager = match ResourceManager::<Material>::new(
        MaterialLoader::new(Arc::clone(&fs)),
        &ResourceManagerInfo {
            unload_delay: config.unload_delay(),
        },
    ) {
        Ok(manager) => manager,
        Err(err) => {
            error!(error = %err, "could not start the material loader");
            std::process::exit(1);
        }
    };
    info!(root = %config.engine_root.display(), "material editor starting");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(1280.0, 800.0))
            .with_min_inner_size(egui::vec2(960.0, 600.0)),
        ..Default::default()
    };

    eframe::run_native(
        "Shikake Material Editor",
        options,
        Box::new(move |_cc| {
            let preview = Box::new(PreviewSlot::new(config.preview_model.clone()));
            let session =
                MaterialEditSession::new(manager, SessionInfo::from_config(&config, fs, preview));
            Box::new(MaterialEditorApp::new(session, config))
        }),
    )
}

fn parse_config_path() -> Option<PathBuf> {
    std::env::args().nth(1).map(PathBuf::from)
}
