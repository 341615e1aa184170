//! The material edit session.
//!
//! A session follows one material at a time:
//! `Idle -> AwaitingLoad -> Populated` (or `Failed` when the load errors).
//! Selecting a material parks a one-shot observer on its handle; when the
//! handle settles the session builds the material's property set, binds the
//! material to the preview and lays out one [`EditorField`] per property and
//! texture slot. Edits go straight through the descriptors.
//!
//! Readiness notices travel through a channel tagged with the selection they
//! belong to. A superseded selection has its observer revoked, and any notice
//! that still arrives for it is dropped.

use std::{
    cell::{Ref, RefCell},
    fmt,
    rc::Rc,
    sync::Arc,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, error, info, trace};

use crate::{
    material_editor::{
        config::EditorConfig,
        io::{FileSystem, SaveError, save_atomic},
        preview::PreviewSink,
    },
    meta::Material,
    property::{self, PropertyError, PropertySet, PropertyValue, ShaderRef, ValueKind},
    resource::{
        EngineRoot, LoadError, LoadOutcome, ObserverToken, ResourceHandle, ResourcePath,
        ResourceProvider,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingLoad,
    Populated,
    Failed,
}

/// Stable identity of a rendered field. Texture keys carry the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Property(usize),
    Texture(usize),
    AddTexture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Property(PropertyValue),
    Texture(ResourcePath),
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorField {
    pub key: FieldKey,
    pub label: &'static str,
    pub value: FieldValue,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Populated(ResourcePath),
    LoadFailed(LoadError),
    Saved(ResourcePath),
    SaveFailed { path: ResourcePath, message: String },
}

#[derive(Debug)]
pub enum SessionError {
    NotPopulated,
    NoSuchProperty(String),
    NoSuchSlot(usize),
    Property(PropertyError),
    Save(SaveError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotPopulated => write!(f, "no material is loaded"),
            SessionError::NoSuchProperty(name) => write!(f, "no property {}", name),
            SessionError::NoSuchSlot(slot) => write!(f, "no texture in slot {}", slot),
            SessionError::Property(err) => write!(f, "{}", err),
            SessionError::Save(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Property(err) => Some(err),
            SessionError::Save(err) => Some(err),
            _ => None,
        }
    }
}

/// Collaborators a session is built from.
pub struct SessionInfo {
    pub root: EngineRoot,
    pub fs: Arc<dyn FileSystem>,
    pub placeholder_texture: ResourcePath,
    pub preview: Box<dyn PreviewSink>,
}

impl SessionInfo {
    pub fn from_config(
        config: &EditorConfig,
        fs: Arc<dyn FileSystem>,
        preview: Box<dyn PreviewSink>,
    ) -> Self {
        Self {
            root: config.root(),
            fs,
            placeholder_texture: config.placeholder_texture.clone(),
            preview,
        }
    }
}

struct Notice {
    ticket: u64,
    outcome: LoadOutcome<Material>,
}

struct Pending {
    handle: ResourceHandle<Material>,
    token: ObserverToken,
    ticket: u64,
}

struct Populated {
    handle: ResourceHandle<Material>,
    target: Rc<RefCell<Material>>,
    properties: PropertySet<Material>,
    fields: Vec<EditorField>,
}

struct Failed {
    handle: ResourceHandle<Material>,
    error: LoadError,
}

enum SessionState {
    Idle,
    AwaitingLoad(Pending),
    Populated(Populated),
    Failed(Failed),
}

pub struct MaterialEditSession<P: ResourceProvider<Material>> {
    resources: P,
    root: EngineRoot,
    fs: Arc<dyn FileSystem>,
    placeholder_texture: ResourcePath,
    preview: Box<dyn PreviewSink>,
    state: SessionState,
    notice_tx: Sender<Notice>,
    notice_rx: Receiver<Notice>,
    next_ticket: u64,
    events: Vec<SessionEvent>,
}

impl<P: ResourceProvider<Material>> MaterialEditSession<P> {
    pub fn new(resources: P, info: SessionInfo) -> Self {
        let (notice_tx, notice_rx) = unbounded();
        Self {
            resources,
            root: info.root,
            fs: info.fs,
            placeholder_texture: info.placeholder_texture,
            preview: info.preview,
            state: SessionState::Idle,
            notice_tx,
            notice_rx,
            next_ticket: 0,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.state {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::AwaitingLoad(_) => SessionPhase::AwaitingLoad,
            SessionState::Populated(_) => SessionPhase::Populated,
            SessionState::Failed(_) => SessionPhase::Failed,
        }
    }

    pub fn current_path(&self) -> Option<&ResourcePath> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::AwaitingLoad(pending) => Some(pending.handle.path()),
            SessionState::Populated(populated) => Some(populated.handle.path()),
            SessionState::Failed(failed) => Some(failed.handle.path()),
        }
    }

    /// Fields of the populated material, in layout order. Empty in every other
    /// phase.
    pub fn fields(&self) -> &[EditorField] {
        match &self.state {
            SessionState::Populated(populated) => &populated.fields,
            _ => &[],
        }
    }

    pub fn material(&self) -> Option<Ref<'_, Material>> {
        match &self.state {
            SessionState::Populated(populated) => Some(populated.target.borrow()),
            _ => None,
        }
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        match &self.state {
            SessionState::Failed(failed) => Some(&failed.error),
            _ => None,
        }
    }

    pub fn root(&self) -> &EngineRoot {
        &self.root
    }

    pub fn preview(&self) -> &dyn PreviewSink {
        self.preview.as_ref()
    }

    pub fn resources(&self) -> &P {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut P {
        &mut self.resources
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Starts editing the material at `raw`, which may be absolute or
    /// relative to the engine root. Supersedes whatever was selected before.
    pub fn select_material(&mut self, raw: &str) {
        let path = self.root.to_relative_path(raw);
        self.select_path(path);
    }

    /// Delivers finished loads and handles any readiness notices they raised.
    pub fn update(&mut self) {
        self.resources.pump();
        self.drain_notices();
    }

    pub fn set_property(&mut self, index: usize, value: PropertyValue) -> Result<(), SessionError> {
        let populated = self.populated_mut()?;
        let descriptor = populated
            .properties
            .get(index)
            .ok_or_else(|| SessionError::NoSuchProperty(format!("#{index}")))?;

        let applied = descriptor.set(&mut populated.target.borrow_mut(), value);
        debug_assert!(applied.is_ok(), "{:?}", applied);
        applied.map_err(SessionError::Property)?;

        let current = descriptor.get(&populated.target.borrow());
        debug!(property = descriptor.name(), value = ?current, "property edited");
        if let Some(field) = populated.fields.get_mut(index) {
            field.value = FieldValue::Property(current);
        }
        Ok(())
    }

    /// Rebinds the shader from user text. Blank text clears the binding.
    pub fn set_shader(&mut self, raw: &str) -> Result<(), SessionError> {
        let shader = Some(self.root.to_relative_path(raw)).filter(|path| !path.is_empty());
        let index = self
            .populated_mut()?
            .properties
            .iter()
            .position(|descriptor| descriptor.kind() == ValueKind::ShaderRef)
            .ok_or_else(|| SessionError::NoSuchProperty("Shader".to_string()))?;
        self.set_property(index, PropertyValue::Shader(ShaderRef(shader)))
    }

    /// Rebinds an existing texture slot in place.
    pub fn set_texture(&mut self, slot: usize, raw: &str) -> Result<(), SessionError> {
        let texture = self.root.to_relative_path(raw);
        let populated = self.populated_mut()?;
        if !populated.target.borrow_mut().set_texture(slot, texture.clone()) {
            return Err(SessionError::NoSuchSlot(slot));
        }
        debug!(slot, texture = %texture, "texture rebound");
        let field_index = populated.properties.len() + slot;
        if let Some(field) = populated.fields.get_mut(field_index) {
            field.value = FieldValue::Texture(texture);
        }
        Ok(())
    }

    /// Appends the placeholder texture and rebuilds every field.
    pub fn add_texture(&mut self) -> Result<(), SessionError> {
        let placeholder = self.placeholder_texture.clone();
        let populated = self.populated_mut()?;
        populated.target.borrow_mut().add_texture(placeholder);
        let path = populated.handle.path().clone();
        self.select_path(path);
        Ok(())
    }

    /// Removes a texture slot and rebuilds every field, so the surviving
    /// slots are renumbered from zero.
    pub fn remove_texture(&mut self, slot: usize) -> Result<(), SessionError> {
        let populated = self.populated_mut()?;
        if populated.target.borrow_mut().remove_texture(slot).is_none() {
            return Err(SessionError::NoSuchSlot(slot));
        }
        let path = populated.handle.path().clone();
        self.select_path(path);
        Ok(())
    }

    pub fn save(&mut self) -> Result<(), SessionError> {
        let (path, target) = match &self.state {
            SessionState::Populated(populated) => (
                populated.handle.path().clone(),
                Rc::clone(&populated.target),
            ),
            _ => return Err(SessionError::NotPopulated),
        };

        let saved = save_atomic(self.fs.as_ref(), &path, &*target.borrow());
        match saved {
            Ok(()) => {
                self.events.push(SessionEvent::Saved(path));
                Ok(())
            }
            Err(err) => {
                self.events.push(SessionEvent::SaveFailed {
                    path,
                    message: err.to_string(),
                });
                Err(SessionError::Save(err))
            }
        }
    }

    /// Revokes any parked observer, drops the session's reference and
    /// returns to `Idle`.
    pub fn close(&mut self) {
        self.revoke();
        self.drain_notices();
    }

    fn select_path(&mut self, path: ResourcePath) {
        // Failed handles never settle again; release before `get` so the
        // same path loads afresh.
        if matches!(self.state, SessionState::Failed(_)) {
            self.revoke();
        }
        let handle = self.resources.get(&path);
        self.revoke();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let notices = self.notice_tx.clone();
        let token = handle.register_observer(move |outcome| {
            let _ = notices.send(Notice { ticket, outcome });
        });
        debug!(resource = "material", path = %path, ticket, "awaiting material");
        self.state = SessionState::AwaitingLoad(Pending {
            handle,
            token,
            ticket,
        });
        self.drain_notices();
    }

    fn revoke(&mut self) {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Idle => {}
            SessionState::AwaitingLoad(pending) => {
                if pending.handle.unregister_observer(pending.token) {
                    trace!(path = %pending.handle.path(), "revoked readiness observer");
                }
                self.resources.release(pending.handle.path());
            }
            SessionState::Populated(populated) => self.resources.release(populated.handle.path()),
            SessionState::Failed(failed) => self.resources.release(failed.handle.path()),
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notice_rx.try_recv() {
            let current = matches!(
                &self.state,
                SessionState::AwaitingLoad(pending) if pending.ticket == notice.ticket
            );
            if !current {
                trace!(ticket = notice.ticket, "discarding stale readiness notice");
                continue;
            }
            if let SessionState::AwaitingLoad(pending) =
                std::mem::replace(&mut self.state, SessionState::Idle)
            {
                self.on_settled(pending, notice.outcome);
            }
        }
    }

    fn on_settled(&mut self, pending: Pending, outcome: LoadOutcome<Material>) {
        pending.handle.unregister_observer(pending.token);
        match outcome {
            LoadOutcome::Ready(target) => {
                let properties = property::build::<Material>();
                self.preview.bind_material(&pending.handle);
                let fields = layout_fields(&properties, &target.borrow());
                info!(
                    resource = "material",
                    path = %pending.handle.path(),
                    fields = fields.len(),
                    "material ready"
                );
                self.events
                    .push(SessionEvent::Populated(pending.handle.path().clone()));
                self.state = SessionState::Populated(Populated {
                    handle: pending.handle,
                    target,
                    properties,
                    fields,
                });
            }
            LoadOutcome::Failed(err) => {
                error!(resource = "material", path = %err.path, error = %err.reason, "material failed to load");
                self.events.push(SessionEvent::LoadFailed(err.clone()));
                self.state = SessionState::Failed(Failed {
                    handle: pending.handle,
                    error: err,
                });
            }
        }
    }

    fn populated_mut(&mut self) -> Result<&mut Populated, SessionError> {
        match &mut self.state {
            SessionState::Populated(populated) => Ok(populated),
            _ => Err(SessionError::NotPopulated),
        }
    }
}

impl<P: ResourceProvider<Material>> Drop for MaterialEditSession<P> {
    fn drop(&mut self) {
        self.revoke();
    }
}

fn layout_fields(properties: &PropertySet<Material>, material: &Material) -> Vec<EditorField> {
    let mut fields: Vec<EditorField> = properties
        .iter()
        .enumerate()
        .map(|(index, descriptor)| EditorField {
            key: FieldKey::Property(index),
            label: descriptor.name(),
            value: FieldValue::Property(descriptor.get(material)),
        })
        .collect();

    fields.extend(
        material
            .textures
            .iter()
            .enumerate()
            .map(|(slot, texture)| EditorField {
                key: FieldKey::Texture(slot),
                label: "Texture",
                value: FieldValue::Texture(texture.clone()),
            }),
    );

    fields.push(EditorField {
        key: FieldKey::AddTexture,
        label: "Add Texture",
        value: FieldValue::Action,
    });
    fields
}
