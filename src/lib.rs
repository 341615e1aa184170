pub mod material_editor;
pub mod meta;
pub mod property;
pub mod resource;
mod utils;

////////////////////////////////////////////////
/// Shikake
/// * Property reflection for engine objects: named getter/setter pairs over a
///   target type, laid out in a fixed order per type (`property`).
///
/// * Asynchronously loaded, reference-counted resources identified by a
///   normalized engine-relative path (`resource`).
///
/// * A material edit session that waits for a material to load, exposes its
///   properties and texture slots as editable fields and saves it back with a
///   write-then-rename swap (`material_editor`).
////////////////////////////////////////////////

pub use material_editor::session::{MaterialEditSession, SessionInfo};
pub use meta::Material;
