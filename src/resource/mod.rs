//! Path-identified, asynchronously loaded resources.
//!
//! [`ResourceManager`] hands out shared [`ResourceHandle`]s keyed by a
//! normalized [`ResourcePath`]. A handle starts out `Loading` and settles once
//! to `Ready` or `Error`; consumers either poll it or park a one-shot observer.

pub mod handle;
pub mod manager;
pub mod path;

pub use handle::*;
pub use manager::*;
pub use path::*;
