use serde::{Deserialize, Serialize};

use crate::{
    property::{PropertySet, Reflect, ShaderRef, describe},
    resource::{Resource, ResourcePath},
};

/// Render state and bindings of a material, as stored in a `.mat` file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub shader: Option<ResourcePath>,
    pub z_test: bool,
    pub alpha_to_coverage: bool,
    pub backface_culling: bool,
    pub textures: Vec<ResourcePath>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shader: None,
            z_test: true,
            alpha_to_coverage: false,
            backface_culling: true,
            textures: Vec::new(),
        }
    }
}

impl Material {
    pub fn is_z_test(&self) -> bool {
        self.z_test
    }

    pub fn enable_z_test(&mut self, enabled: bool) {
        self.z_test = enabled;
    }

    pub fn is_alpha_to_coverage(&self) -> bool {
        self.alpha_to_coverage
    }

    pub fn enable_alpha_to_coverage(&mut self, enabled: bool) {
        self.alpha_to_coverage = enabled;
    }

    pub fn is_backface_culling(&self) -> bool {
        self.backface_culling
    }

    pub fn enable_backface_culling(&mut self, enabled: bool) {
        self.backface_culling = enabled;
    }

    pub fn shader(&self) -> ShaderRef {
        ShaderRef(self.shader.clone())
    }

    pub fn set_shader(&mut self, shader: ShaderRef) {
        self.shader = shader.0;
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, slot: usize) -> Option<&ResourcePath> {
        self.textures.get(slot)
    }

    pub fn add_texture(&mut self, texture: ResourcePath) {
        self.textures.push(texture);
    }

    /// Rebinds an existing slot. Returns `false` when the slot does not exist.
    pub fn set_texture(&mut self, slot: usize, texture: ResourcePath) -> bool {
        match self.textures.get_mut(slot) {
            Some(current) => {
                *current = texture;
                true
            }
            None => false,
        }
    }

    /// Removes a slot; later slots shift down by one.
    pub fn remove_texture(&mut self, slot: usize) -> Option<ResourcePath> {
        if slot < self.textures.len() {
            Some(self.textures.remove(slot))
        } else {
            None
        }
    }
}

impl Resource for Material {
    const KIND: &'static str = "material";
}

impl Reflect for Material {
    fn properties() -> PropertySet<Self> {
        PropertySet::new(vec![
            describe("Z test", Material::is_z_test, Material::enable_z_test),
            describe(
                "Alpha to coverage",
                Material::is_alpha_to_coverage,
                Material::enable_alpha_to_coverage,
            ),
            describe(
                "Backface culling",
                Material::is_backface_culling,
                Material::enable_backface_culling,
            ),
            describe("Shader", Material::shader, Material::set_shader),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyValue, ValueKind, build};

    #[test]
    fn descriptors_come_in_fixed_order() {
        let names: Vec<_> = build::<Material>().iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec!["Z test", "Alpha to coverage", "Backface culling", "Shader"]
        );
        let again: Vec<_> = build::<Material>().iter().map(|d| d.kind()).collect();
        assert_eq!(
            again,
            vec![
                ValueKind::Bool,
                ValueKind::Bool,
                ValueKind::Bool,
                ValueKind::ShaderRef
            ]
        );
    }

    #[test]
    fn descriptors_edit_the_material() {
        let mut material = Material::default();
        let properties = build::<Material>();
        let (index, culling) = properties.find("Backface culling").unwrap();
        assert_eq!(index, 2);
        culling.set(&mut material, PropertyValue::Bool(false)).unwrap();
        assert!(!material.backface_culling);

        let (_, shader) = properties.find("Shader").unwrap();
        let bound = PropertyValue::Shader(ShaderRef(Some(ResourcePath::new("shaders/rigid.shd"))));
        shader.set(&mut material, bound.clone()).unwrap();
        assert_eq!(shader.get(&material), bound);
    }

    #[test]
    fn remove_texture_renumbers_survivors() {
        let mut material = Material {
            textures: vec![
                ResourcePath::new("textures/a.dds"),
                ResourcePath::new("textures/b.dds"),
                ResourcePath::new("textures/c.dds"),
            ],
            ..Material::default()
        };
        assert_eq!(
            material.remove_texture(1),
            Some(ResourcePath::new("textures/b.dds"))
        );
        assert_eq!(material.texture(0).unwrap().as_str(), "textures/a.dds");
        assert_eq!(material.texture(1).unwrap().as_str(), "textures/c.dds");
        assert_eq!(material.texture_count(), 2);
        assert!(material.remove_texture(5).is_none());
    }

    #[test]
    fn file_format_is_keyed_json() {
        let material = Material {
            shader: Some(ResourcePath::new("shaders/rigid.shd")),
            textures: vec![ResourcePath::new("textures/a.dds")],
            ..Material::default()
        };
        let json = serde_json::to_value(&material).unwrap();
        assert_eq!(json["shader"], "shaders/rigid.shd");
        assert_eq!(json["z_test"], true);
        assert_eq!(json["textures"][0], "textures/a.dds");

        let partial: Material = serde_json::from_str(r#"{ "alpha_to_coverage": true }"#).unwrap();
        assert!(partial.alpha_to_coverage);
        assert!(partial.z_test);
    }
}
