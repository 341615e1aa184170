use eframe::egui::{self, RichText};
use tracing::debug;

use crate::{
    meta::Material,
    resource::{ResourceHandle, ResourcePath},
};

/// Where the edit session shows the material it is working on.
pub trait PreviewSink {
    /// Binds a ready material to the preview model's first mesh.
    fn bind_material(&mut self, material: &ResourceHandle<Material>);

    fn model(&self) -> &ResourcePath;

    fn material(&self) -> Option<&ResourceHandle<Material>>;
}

/// Preview that only records the binding. Drawing the model belongs to the
/// engine viewport.
pub struct PreviewSlot {
    model: ResourcePath,
    material: Option<ResourceHandle<Material>>,
}

impl PreviewSlot {
    pub fn new(model: ResourcePath) -> Self {
        Self {
            model,
            material: None,
        }
    }
}

impl PreviewSink for PreviewSlot {
    fn bind_material(&mut self, material: &ResourceHandle<Material>) {
        debug!(model = %self.model, material = %material.path(), "bound preview material");
        self.material = Some(material.clone());
    }

    fn model(&self) -> &ResourcePath {
        &self.model
    }

    fn material(&self) -> Option<&ResourceHandle<Material>> {
        self.material.as_ref()
    }
}

/// Summary of what the preview model is currently rendered with.
pub fn preview_ui(ui: &mut egui::Ui, preview: &dyn PreviewSink) {
    egui::CollapsingHeader::new("Preview")
        .default_open(true)
        .show(ui, |ui| {
            ui.label(RichText::new(preview.model().as_str()).monospace());
            let Some(handle) = preview.material() else {
                ui.label("No material bound");
                return;
            };
            ui.label(RichText::new(handle.path().as_str()).monospace());
            let Some(material) = handle.get() else {
                return;
            };
            let material = material.borrow();
            ui.label(format!(
                "z test: {} • alpha to coverage: {} • culling: {}",
                material.z_test, material.alpha_to_coverage, material.backface_culling
            ));
            ui.label(format!("{} texture(s)", material.texture_count()));
        });
}
