//! Material editing on top of the resource and property layers.
//!
//! The session and persistence code has no GUI dependency; `ui` is a thin
//! egui front end over [`session::MaterialEditSession`].

pub mod catalog;
pub mod config;
pub mod io;
pub mod preview;
pub mod session;
pub mod ui;
