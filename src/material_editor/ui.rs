use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use eframe::egui::{self, Color32, RichText};

use crate::{
    material_editor::{
        catalog::scan_materials,
        config::EditorConfig,
        preview::preview_ui,
        session::{FieldKey, FieldValue, MaterialEditSession, SessionEvent, SessionPhase},
    },
    meta::Material,
    property::PropertyValue,
    resource::{ResourceManager, ResourcePath},
};

pub type EditorSession = MaterialEditSession<ResourceManager<Material>>;

pub struct MaterialEditorApp {
    session: EditorSession,
    config: EditorConfig,
    catalog: Vec<ResourcePath>,
    filter: String,
    drafts: HashMap<FieldKey, String>,
    status: Option<StatusMessage>,
}

enum InspectorAction {
    SetBool(usize, bool),
    SetShader(String),
    SetTexture(usize, String),
    RemoveTexture(usize),
    AddTexture,
}

impl MaterialEditorApp {
    pub fn new(session: EditorSession, config: EditorConfig) -> Self {
        let mut app = Self {
            session,
            config,
            catalog: Vec::new(),
            filter: String::new(),
            drafts: HashMap::new(),
            status: None,
        };
        app.rescan();
        app
    }

    fn rescan(&mut self) {
        match scan_materials(self.session.root(), &self.config.material_extension) {
            Ok(found) => self.catalog = found,
            Err(err) => self.set_status(StatusKind::Error, format!("Failed to scan: {err}")),
        }
    }

    fn prune_status(&mut self) {
        if let Some(status) = &self.status {
            if status.expired() {
                self.status = None;
            }
        }
    }

    fn set_status(&mut self, kind: StatusKind, message: impl Into<String>) {
        self.status = Some(StatusMessage::new(kind, message));
    }

    fn handle_events(&mut self) {
        for event in self.session.take_events() {
            match event {
                SessionEvent::Populated(_) => self.drafts.clear(),
                SessionEvent::LoadFailed(err) => {
                    self.drafts.clear();
                    self.set_status(StatusKind::Error, err.to_string());
                }
                SessionEvent::Saved(path) => {
                    self.set_status(StatusKind::Info, format!("Saved {path}"));
                }
                SessionEvent::SaveFailed { path, message } => {
                    self.set_status(StatusKind::Error, format!("Could not save {path}: {message}"));
                }
            }
        }
    }

    fn open_material_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Material", &[self.config.material_extension.as_str()])
            .set_directory(self.session.root().path())
            .pick_file();
        if let Some(path) = picked {
            self.session.select_material(&path.to_string_lossy());
        }
    }

    fn draw_top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Material Editor");
            ui.separator();
            ui.label(self.session.root().path().display().to_string());
            ui.separator();
            if ui.button("Open…").clicked() {
                self.open_material_dialog();
            }
            let populated = self.session.phase() == SessionPhase::Populated;
            if ui
                .add_enabled(populated, egui::Button::new("Save"))
                .on_hover_text("Write the material to disk")
                .clicked()
            {
                // Failures arrive as a SaveFailed event.
                let _ = self.session.save();
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(status) = &self.status {
                    let text = RichText::new(&status.text).color(status.color());
                    ui.label(text);
                }
            });
        });
    }

    fn draw_catalog(&mut self, ui: &mut egui::Ui) {
        ui.heading("Materials");
        ui.horizontal(|ui| {
            ui.label("Filter");
            ui.text_edit_singleline(&mut self.filter);
            if ui.button("Rescan").clicked() {
                self.rescan();
            }
        });
        ui.separator();

        let filter = self.filter.to_lowercase();
        let current = self.session.current_path().cloned();
        let mut picked: Option<ResourcePath> = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for path in self
                .catalog
                .iter()
                .filter(|path| filter.is_empty() || path.as_str().contains(&filter))
            {
                let selected = current.as_ref() == Some(path);
                if ui
                    .selectable_label(selected, RichText::new(path.as_str()).monospace())
                    .clicked()
                {
                    picked = Some(path.clone());
                }
            }
        });
        if let Some(path) = picked {
            self.session.select_material(path.spelling());
        }
    }

    fn draw_inspector(&mut self, ui: &mut egui::Ui) {
        ui.heading("Inspector");
        match self.session.phase() {
            SessionPhase::Idle => {
                ui.label("Select a material to edit");
                return;
            }
            SessionPhase::AwaitingLoad => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Loading {}", self.current_label()));
                });
                return;
            }
            SessionPhase::Failed => {
                let message = self
                    .session
                    .load_error()
                    .map(|err| err.to_string())
                    .unwrap_or_default();
                ui.label(RichText::new(message).color(Color32::from_rgb(235, 111, 111)));
                return;
            }
            SessionPhase::Populated => {}
        }

        ui.label(RichText::new(self.current_label()).monospace());
        ui.separator();

        let fields = self.session.fields().to_vec();
        let drafts = &mut self.drafts;
        let mut action: Option<InspectorAction> = None;
        egui::Grid::new("material_properties")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for field in &fields {
                    match (&field.key, &field.value) {
                        (FieldKey::Property(index), FieldValue::Property(PropertyValue::Bool(value))) => {
                            ui.label(field.label);
                            let mut checked = *value;
                            if ui.checkbox(&mut checked, "").changed() {
                                action = Some(InspectorAction::SetBool(*index, checked));
                            }
                        }
                        (FieldKey::Property(_), FieldValue::Property(PropertyValue::Shader(shader))) => {
                            ui.label(field.label);
                            let draft = drafts.entry(field.key).or_insert_with(|| {
                                shader.0.as_ref().map(|path| path.to_string()).unwrap_or_default()
                            });
                            if ui.text_edit_singleline(draft).lost_focus() {
                                action = Some(InspectorAction::SetShader(draft.clone()));
                            }
                        }
                        (FieldKey::Texture(slot), FieldValue::Texture(path)) => {
                            ui.label(field.label);
                            ui.horizontal(|ui| {
                                let draft = drafts
                                    .entry(field.key)
                                    .or_insert_with(|| path.to_string());
                                if ui.text_edit_singleline(draft).lost_focus() {
                                    action = Some(InspectorAction::SetTexture(*slot, draft.clone()));
                                }
                                if ui.button("Remove").clicked() {
                                    action = Some(InspectorAction::RemoveTexture(*slot));
                                }
                            });
                        }
                        (FieldKey::AddTexture, _) => {
                            ui.label("");
                            if ui.button(field.label).clicked() {
                                action = Some(InspectorAction::AddTexture);
                            }
                        }
                        _ => continue,
                    }
                    ui.end_row();
                }
            });

        if let Some(action) = action {
            self.apply(action);
        }

        ui.separator();
        preview_ui(ui, self.session.preview());
    }

    fn apply(&mut self, action: InspectorAction) {
        let result = match action {
            InspectorAction::SetBool(index, value) => {
                self.session.set_property(index, PropertyValue::Bool(value))
            }
            InspectorAction::SetShader(raw) => self.session.set_shader(&raw),
            InspectorAction::SetTexture(slot, raw) => self.session.set_texture(slot, &raw),
            InspectorAction::RemoveTexture(slot) => self.session.remove_texture(slot),
            InspectorAction::AddTexture => self.session.add_texture(),
        };
        if let Err(err) = result {
            self.set_status(StatusKind::Error, err.to_string());
        }
    }

    fn current_label(&self) -> String {
        self.session
            .current_path()
            .map(|path| path.to_string())
            .unwrap_or_default()
    }
}

impl eframe::App for MaterialEditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.session.update();
        self.session.resources_mut().unload_pulse();
        self.handle_events();
        self.prune_status();

        egui::TopBottomPanel::top("material_editor_top").show(ctx, |ui| self.draw_top_bar(ui));

        egui::SidePanel::left("material_catalog")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| self.draw_catalog(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_inspector(ui));

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

struct StatusMessage {
    text: String,
    kind: StatusKind,
    created_at: Instant,
}

impl StatusMessage {
    fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            created_at: Instant::now(),
        }
    }

    fn expired(&self) -> bool {
        self.created_at.elapsed() > Duration::from_secs(6)
    }

    fn color(&self) -> Color32 {
        match self.kind {
            StatusKind::Info => Color32::from_rgb(116, 185, 120),
            StatusKind::Error => Color32::from_rgb(235, 111, 111),
        }
    }
}

#[derive(Clone, Copy)]
enum StatusKind {
    Info,
    Error,
}
