use std::fmt;

use crate::resource::ResourcePath;

/// The closed set of value kinds an editor knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    ShaderRef,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "boolean"),
            ValueKind::ShaderRef => write!(f, "shader reference"),
        }
    }
}

/// Reference to a shader resource, by path. `None` means no shader is bound.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderRef(pub Option<ResourcePath>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Bool(bool),
    Shader(ShaderRef),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Bool(_) => ValueKind::Bool,
            PropertyValue::Shader(_) => ValueKind::ShaderRef,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for super::ShaderRef {}
}

/// Rust types that can back a property. Only the kinds in [`ValueKind`]
/// implement this, so describing anything else fails to compile.
pub trait EditableValue: sealed::Sealed + Sized + 'static {
    const KIND: ValueKind;

    fn into_access<T>(accessor: Accessor<Self, T>) -> PropertyAccess<T>;
}

impl EditableValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_access<T>(accessor: Accessor<Self, T>) -> PropertyAccess<T> {
        PropertyAccess::Bool(accessor)
    }
}

impl EditableValue for ShaderRef {
    const KIND: ValueKind = ValueKind::ShaderRef;

    fn into_access<T>(accessor: Accessor<Self, T>) -> PropertyAccess<T> {
        PropertyAccess::Shader(accessor)
    }
}

pub struct Accessor<V, T> {
    get: Box<dyn Fn(&T) -> V>,
    set: Box<dyn Fn(&mut T, V)>,
}

/// Accessor pair tagged by value kind.
pub enum PropertyAccess<T> {
    Bool(Accessor<bool, T>),
    Shader(Accessor<ShaderRef, T>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    KindMismatch {
        property: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyError::KindMismatch {
                property,
                expected,
                found,
            } => write!(
                f,
                "property '{}' holds a {} but was given a {}",
                property, expected, found
            ),
        }
    }
}

impl std::error::Error for PropertyError {}

/// A named, typed getter/setter pair over a property of `T`.
///
/// Descriptors never own the target; they are handed one on every call.
pub struct PropertyDescriptor<T> {
    name: &'static str,
    access: PropertyAccess<T>,
}

pub fn describe<V, T, G, S>(name: &'static str, get: G, set: S) -> PropertyDescriptor<T>
where
    V: EditableValue,
    T: 'static,
    G: Fn(&T) -> V + 'static,
    S: Fn(&mut T, V) + 'static,
{
    PropertyDescriptor {
        name,
        access: V::into_access(Accessor {
            get: Box::new(get),
            set: Box::new(set),
        }),
    }
}

impl<T> PropertyDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ValueKind {
        match &self.access {
            PropertyAccess::Bool(_) => ValueKind::Bool,
            PropertyAccess::Shader(_) => ValueKind::ShaderRef,
        }
    }

    pub fn get(&self, target: &T) -> PropertyValue {
        match &self.access {
            PropertyAccess::Bool(accessor) => PropertyValue::Bool((accessor.get)(target)),
            PropertyAccess::Shader(accessor) => PropertyValue::Shader((accessor.get)(target)),
        }
    }

    pub fn set(&self, target: &mut T, value: PropertyValue) -> Result<(), PropertyError> {
        match (&self.access, value) {
            (PropertyAccess::Bool(accessor), PropertyValue::Bool(value)) => {
                (accessor.set)(target, value);
                Ok(())
            }
            (PropertyAccess::Shader(accessor), PropertyValue::Shader(value)) => {
                (accessor.set)(target, value);
                Ok(())
            }
            (_, value) => Err(PropertyError::KindMismatch {
                property: self.name.to_string(),
                expected: self.kind(),
                found: value.kind(),
            }),
        }
    }
}

impl<T> fmt::Debug for PropertyDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lamp {
        lit: bool,
        shader: Option<ResourcePath>,
    }

    fn lit() -> PropertyDescriptor<Lamp> {
        describe("Lit", |p: &Lamp| p.lit, |p: &mut Lamp, v| p.lit = v)
    }

    fn shader() -> PropertyDescriptor<Lamp> {
        describe(
            "Shader",
            |p: &Lamp| ShaderRef(p.shader.clone()),
            |p: &mut Lamp, v: ShaderRef| p.shader = v.0,
        )
    }

    #[test]
    fn kind_follows_value_type() {
        assert_eq!(lit().kind(), ValueKind::Bool);
        assert_eq!(shader().kind(), ValueKind::ShaderRef);
        assert_eq!(lit().name(), "Lit");
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut lamp = Lamp::default();
        let lit = lit();
        lit.set(&mut lamp, PropertyValue::Bool(true)).unwrap();
        assert_eq!(lit.get(&lamp), PropertyValue::Bool(true));
        lit.set(&mut lamp, PropertyValue::Bool(true)).unwrap();
        assert!(lamp.lit);

        let shader = shader();
        let value = PropertyValue::Shader(ShaderRef(Some(ResourcePath::new("Shaders/Rigid.shd"))));
        shader.set(&mut lamp, value.clone()).unwrap();
        assert_eq!(shader.get(&lamp), value);
        assert_eq!(lamp.shader.as_ref().unwrap().as_str(), "shaders/rigid.shd");
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let mut lamp = Lamp::default();
        let err = lit()
            .set(&mut lamp, PropertyValue::Shader(ShaderRef(None)))
            .unwrap_err();
        assert_eq!(
            err,
            PropertyError::KindMismatch {
                property: "Lit".to_string(),
                expected: ValueKind::Bool,
                found: ValueKind::ShaderRef,
            }
        );
        assert!(!lamp.lit);
    }
}
