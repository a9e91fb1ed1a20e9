/// SPIR-V reflection for shader stages
///
/// Pipelines declare their push constant block on the Rust side. Building a
/// pipeline fails when the reflected block is larger.

use rosy_engine::rosy::Result;
use rosy_engine::{engine_bail, engine_err};
use rustc_hash::FxHashMap;

/// What a set of stages expects from the pipeline layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Largest push constant block across the stages, 0 when unused
    pub push_constant_size: u32,
    /// (set, binding) of every descriptor the stages reference
    pub descriptor_bindings: FxHashMap<(u32, u32), String>,
}

impl ShaderReflection {
    pub fn merge(&mut self, other: ShaderReflection) {
        self.push_constant_size = self.push_constant_size.max(other.push_constant_size);
        self.descriptor_bindings.extend(other.descriptor_bindings);
    }

    /// Highest descriptor set index referenced, if any
    pub fn max_set(&self) -> Option<u32> {
        self.descriptor_bindings.keys().map(|&(set, _)| set).max()
    }
}

/// Reflect one SPIR-V module
pub fn reflect_shader(code: &[u32]) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("rosy::vulkan", ShaderLoad => "SPIR-V reflection failed: {:?}", e))?;

    let mut reflection = ShaderReflection::default();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::PushConstant { ty, .. } => {
                    let size = ty.nbyte().unwrap_or(0) as u32;
                    reflection.push_constant_size = reflection.push_constant_size.max(size);
                }
                spirq::var::Variable::Descriptor { name, desc_bind, .. } => {
                    reflection
                        .descriptor_bindings
                        .insert((desc_bind.set(), desc_bind.bind()), name.clone().unwrap_or_default());
                }
                _ => {}
            }
        }
    }
    Ok(reflection)
}

/// The Rust-side block must cover what the shader reads
pub fn check_push_constant_size(pipeline: &str, declared: u32, reflected: u32) -> Result<()> {
    if reflected > declared {
        engine_bail!("rosy::vulkan", ShaderLoad =>
            "Pipeline '{}' pushes {} bytes of constants but its shaders read {}", pipeline, declared, reflected);
    }
    Ok(())
}

/// Descriptor sets referenced by the shaders must all have a layout
pub fn check_set_count(pipeline: &str, reflection: &ShaderReflection, layouts: usize) -> Result<()> {
    if let Some(max_set) = reflection.max_set() {
        if max_set as usize >= layouts {
            engine_bail!("rosy::vulkan", ShaderLoad =>
                "Pipeline '{}' shaders use descriptor set {} but only {} layouts were given",
                pipeline, max_set, layouts);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosy_engine::rosy::Error;

    #[test]
    fn test_garbage_fails_reflection() {
        let result = reflect_shader(&[0xDEAD_BEEF, 1, 2, 3]);
        assert!(matches!(result, Err(Error::ShaderLoad(_))));
    }

    #[test]
    fn test_push_constant_size_check() {
        assert!(check_push_constant_size("mesh", 48, 48).is_ok());
        assert!(check_push_constant_size("mesh", 64, 48).is_ok());
        assert!(matches!(check_push_constant_size("mesh", 32, 48), Err(Error::ShaderLoad(_))));
    }

    #[test]
    fn test_set_count_check() {
        let mut reflection = ShaderReflection::default();
        assert!(check_set_count("shadow", &reflection, 0).is_ok());

        reflection.descriptor_bindings.insert((1, 0), "shadow_map".to_string());
        assert!(check_set_count("mesh", &reflection, 2).is_ok());
        assert!(check_set_count("mesh", &reflection, 1).is_err());
    }

    #[test]
    fn test_merge_keeps_largest_block() {
        let mut vertex = ShaderReflection { push_constant_size: 48, ..Default::default() };
        let mut fragment = ShaderReflection { push_constant_size: 16, ..Default::default() };
        fragment.descriptor_bindings.insert((0, 1), "color".to_string());
        vertex.merge(fragment);
        assert_eq!(vertex.push_constant_size, 48);
        assert_eq!(vertex.max_set(), Some(0));
    }
}
