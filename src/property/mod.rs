//! Type-erased property editing.
//!
//! A [`PropertyDescriptor`] binds a name and a value kind to a getter/setter
//! pair over some target type. Types that expose editable state implement
//! [`Reflect`] to list their descriptors in a fixed order, which is what an
//! editor lays its fields out from.

pub mod descriptor;

pub use descriptor::*;

/// Ordered descriptors for one target type.
pub struct PropertySet<T> {
    descriptors: Vec<PropertyDescriptor<T>>,
}

impl<T> PropertySet<T> {
    pub fn new(descriptors: Vec<PropertyDescriptor<T>>) -> Self {
        Self { descriptors }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PropertyDescriptor<T>> {
        self.descriptors.get(index)
    }

    pub fn find(&self, name: &str) -> Option<(usize, &PropertyDescriptor<T>)> {
        self.descriptors
            .iter()
            .enumerate()
            .find(|(_, descriptor)| descriptor.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDescriptor<T>> {
        self.descriptors.iter()
    }
}

/// Implemented by types whose properties can be edited through descriptors.
pub trait Reflect: Sized + 'static {
    /// Builds the descriptors for `Self`. Must return them in the same order
    /// on every call.
    fn properties() -> PropertySet<Self>;
}

pub fn build<T: Reflect>() -> PropertySet<T> {
    T::properties()
}
