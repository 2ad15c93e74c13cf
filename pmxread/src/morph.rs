use crate::{
    common::{Buffer, LanguageType, Status, F128},
    model::{Globals, IndexKind},
    utils::pick_name,
};

/// Panel the morph is listed under in editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelMorphCategory {
    Base,
    Eyebrow,
    Eye,
    Lip,
    Other,
    Unknown(u8),
}

impl From<u8> for ModelMorphCategory {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelMorphCategory::Base,
            1 => ModelMorphCategory::Eyebrow,
            2 => ModelMorphCategory::Eye,
            3 => ModelMorphCategory::Lip,
            4 => ModelMorphCategory::Other,
            other => ModelMorphCategory::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelMorphType {
    Group,
    Vertex,
    Bone,
    Texture,
    Uva1,
    Uva2,
    Uva3,
    Uva4,
    Material,
    Flip,
    Impulse,
}

impl TryFrom<u8> for ModelMorphType {
    type Error = Status;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ModelMorphType::Group),
            1 => Ok(ModelMorphType::Vertex),
            2 => Ok(ModelMorphType::Bone),
            3 => Ok(ModelMorphType::Texture),
            4 => Ok(ModelMorphType::Uva1),
            5 => Ok(ModelMorphType::Uva2),
            6 => Ok(ModelMorphType::Uva3),
            7 => Ok(ModelMorphType::Uva4),
            8 => Ok(ModelMorphType::Material),
            9 => Ok(ModelMorphType::Flip),
            10 => Ok(ModelMorphType::Impulse),
            _ => Err(Status::UnsupportedMorphType(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphGroup {
    pub morph_index: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphVertex {
    pub vertex_index: u32,
    pub position: F128,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphBone {
    pub bone_index: i32,
    pub translation: F128,
    /// Quaternion, xyzw.
    pub orientation: F128,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphUv {
    pub vertex_index: u32,
    pub position: F128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelMorphMaterialOperationType {
    Multiply,
    Add,
    Unknown(u8),
}

impl From<u8> for ModelMorphMaterialOperationType {
    fn from(value: u8) -> Self {
        match value {
            0 => ModelMorphMaterialOperationType::Multiply,
            1 => ModelMorphMaterialOperationType::Add,
            other => ModelMorphMaterialOperationType::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphMaterial {
    /// -1 targets every material.
    pub material_index: i32,
    pub operation: ModelMorphMaterialOperationType,
    pub diffuse_color: F128,
    pub specular_color: F128,
    pub specular_power: f32,
    pub ambient_color: F128,
    pub edge_color: F128,
    pub edge_size: f32,
    pub diffuse_texture_blend: F128,
    pub sphere_map_texture_blend: F128,
    pub toon_texture_blend: F128,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphFlip {
    pub morph_index: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMorphImpulse {
    pub rigid_body_index: i32,
    pub is_local: bool,
    pub velocity: F128,
    pub torque: F128,
}

/// Offsets of one morph. Every element has the shape chosen by the morph type.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelMorphU {
    Groups(Vec<ModelMorphGroup>),
    Vertices(Vec<ModelMorphVertex>),
    Bones(Vec<ModelMorphBone>),
    Uvs(Vec<ModelMorphUv>),
    Materials(Vec<ModelMorphMaterial>),
    Flips(Vec<ModelMorphFlip>),
    Impulses(Vec<ModelMorphImpulse>),
}

impl ModelMorphU {
    fn parse_pmx(
        morph_type: ModelMorphType,
        globals: &Globals,
        buffer: &mut Buffer,
    ) -> Result<ModelMorphU, Status> {
        Ok(match morph_type {
            ModelMorphType::Group => ModelMorphU::Groups(buffer.read_list(|buffer| {
                Ok(ModelMorphGroup {
                    morph_index: globals.read_index(buffer, IndexKind::Morph)?,
                    weight: buffer.read_f32_little_endian()?,
                })
            })?),
            ModelMorphType::Vertex => ModelMorphU::Vertices(buffer.read_list(|buffer| {
                Ok(ModelMorphVertex {
                    vertex_index: globals.read_vertex_index(buffer)?,
                    position: buffer.read_f32_3_little_endian()?,
                })
            })?),
            ModelMorphType::Bone => ModelMorphU::Bones(buffer.read_list(|buffer| {
                Ok(ModelMorphBone {
                    bone_index: globals.read_index(buffer, IndexKind::Bone)?,
                    translation: buffer.read_f32_3_little_endian()?,
                    orientation: buffer.read_f32_4_little_endian()?,
                })
            })?),
            ModelMorphType::Texture
            | ModelMorphType::Uva1
            | ModelMorphType::Uva2
            | ModelMorphType::Uva3
            | ModelMorphType::Uva4 => ModelMorphU::Uvs(buffer.read_list(|buffer| {
                Ok(ModelMorphUv {
                    vertex_index: globals.read_vertex_index(buffer)?,
                    position: buffer.read_f32_4_little_endian()?,
                })
            })?),
            ModelMorphType::Material => ModelMorphU::Materials(buffer.read_list(|buffer| {
                Ok(ModelMorphMaterial {
                    material_index: globals.read_index(buffer, IndexKind::Material)?,
                    operation: ModelMorphMaterialOperationType::from(buffer.read_byte()?),
                    diffuse_color: buffer.read_f32_4_little_endian()?,
                    specular_color: buffer.read_f32_3_little_endian()?,
                    specular_power: buffer.read_f32_little_endian()?,
                    ambient_color: buffer.read_f32_3_little_endian()?,
                    edge_color: buffer.read_f32_4_little_endian()?,
                    edge_size: buffer.read_f32_little_endian()?,
                    diffuse_texture_blend: buffer.read_f32_4_little_endian()?,
                    sphere_map_texture_blend: buffer.read_f32_4_little_endian()?,
                    toon_texture_blend: buffer.read_f32_4_little_endian()?,
                })
            })?),
            ModelMorphType::Flip => ModelMorphU::Flips(buffer.read_list(|buffer| {
                Ok(ModelMorphFlip {
                    morph_index: globals.read_index(buffer, IndexKind::Morph)?,
                    weight: buffer.read_f32_little_endian()?,
                })
            })?),
            ModelMorphType::Impulse => ModelMorphU::Impulses(buffer.read_list(|buffer| {
                Ok(ModelMorphImpulse {
                    rigid_body_index: globals.read_index(buffer, IndexKind::RigidBody)?,
                    is_local: buffer.read_byte()? != 0,
                    velocity: buffer.read_f32_3_little_endian()?,
                    torque: buffer.read_f32_3_little_endian()?,
                })
            })?),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            ModelMorphU::Groups(items) => items.len(),
            ModelMorphU::Vertices(items) => items.len(),
            ModelMorphU::Bones(items) => items.len(),
            ModelMorphU::Uvs(items) => items.len(),
            ModelMorphU::Materials(items) => items.len(),
            ModelMorphU::Flips(items) => items.len(),
            ModelMorphU::Impulses(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMorph {
    pub index: usize,
    pub name_ja: String,
    pub name_en: String,
    pub category: ModelMorphCategory,
    pub morph_type: ModelMorphType,
    pub u: ModelMorphU,
}

impl ModelMorph {
    pub(crate) fn parse_pmx(
        globals: &Globals,
        buffer: &mut Buffer,
        index: usize,
    ) -> Result<ModelMorph, Status> {
        let name_ja = globals.read_string(buffer)?;
        let name_en = globals.read_string(buffer)?;
        let category = ModelMorphCategory::from(buffer.read_byte()?);
        let morph_type = ModelMorphType::try_from(buffer.read_byte()?)?;
        let u = ModelMorphU::parse_pmx(morph_type, globals, buffer)?;
        Ok(ModelMorph {
            index,
            name_ja,
            name_en,
            category,
            morph_type,
            u,
        })
    }

    pub fn name(&self, language: LanguageType) -> &str {
        pick_name(language, &self.name_ja, &self.name_en)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::CodecType, fixture::PmxWriter};

    fn globals() -> Globals {
        Globals::uniform(CodecType::Utf16, 0, 2)
    }

    fn write_morph_prefix(writer: &mut PmxWriter, morph_type: u8, count: usize) {
        writer
            .write_string("表情")
            .write_string("face")
            .write_byte(3)
            .write_byte(morph_type)
            .write_count(count);
    }

    #[test]
    fn test_bone_morph_reads_quaternion() {
        let mut writer = PmxWriter::new(globals());
        write_morph_prefix(&mut writer, 2, 1);
        writer
            .write_index(IndexKind::Bone, 7)
            .write_f32_3([1.0, 2.0, 3.0])
            .write_f32_4([0.0, 0.0, 0.0, 1.0]);
        let mut buffer = writer.into_buffer();
        let morph = ModelMorph::parse_pmx(&globals(), &mut buffer, 0).unwrap();
        assert!(buffer.is_end());
        assert_eq!("表情", morph.name(LanguageType::Japanese));
        assert_eq!(ModelMorphCategory::Lip, morph.category);
        assert_eq!(
            ModelMorphU::Bones(vec![ModelMorphBone {
                bone_index: 7,
                translation: F128([1.0, 2.0, 3.0, 0.0]),
                orientation: F128([0.0, 0.0, 0.0, 1.0]),
            }]),
            morph.u
        );
    }

    #[test]
    fn test_uv_morph_types_share_layout() {
        for morph_type in 3u8..=7 {
            let mut writer = PmxWriter::new(globals());
            write_morph_prefix(&mut writer, morph_type, 2);
            for vertex in [0u32, 65535] {
                writer.write_vertex_index(vertex).write_f32_4([0.5; 4]);
            }
            let mut buffer = writer.into_buffer();
            let morph = ModelMorph::parse_pmx(&globals(), &mut buffer, 0).unwrap();
            assert!(buffer.is_end());
            assert_eq!(2, morph.u.len());
            match morph.u {
                ModelMorphU::Uvs(uvs) => assert_eq!(65535, uvs[1].vertex_index),
                other => panic!("unexpected offsets {:?}", other),
            }
        }
    }

    #[test]
    fn test_material_morph_layout() {
        let mut writer = PmxWriter::new(globals());
        write_morph_prefix(&mut writer, 8, 1);
        writer.write_index(IndexKind::Material, -1).write_byte(1);
        writer.write_f32_4([1.0; 4]).write_f32_3([0.5; 3]).write_f32(5.0);
        writer.write_f32_3([0.25; 3]).write_f32_4([0.0; 4]).write_f32(1.0);
        for _ in 0..3 {
            writer.write_f32_4([1.0; 4]);
        }
        let mut buffer = writer.into_buffer();
        let morph = ModelMorph::parse_pmx(&globals(), &mut buffer, 0).unwrap();
        assert!(buffer.is_end());
        let ModelMorphU::Materials(materials) = morph.u else {
            panic!("expected material offsets");
        };
        assert_eq!(-1, materials[0].material_index);
        assert_eq!(ModelMorphMaterialOperationType::Add, materials[0].operation);
        assert_eq!(5.0, materials[0].specular_power);
    }

    #[test]
    fn test_flip_and_impulse_morphs() {
        let mut writer = PmxWriter::new(globals());
        write_morph_prefix(&mut writer, 9, 1);
        writer.write_index(IndexKind::Morph, 2).write_f32(0.5);
        write_morph_prefix(&mut writer, 10, 1);
        writer
            .write_index(IndexKind::RigidBody, 4)
            .write_byte(1)
            .write_f32_3([0.0, 1.0, 0.0])
            .write_f32_3([0.0; 3]);
        let mut buffer = writer.into_buffer();
        let flip = ModelMorph::parse_pmx(&globals(), &mut buffer, 0).unwrap();
        let impulse = ModelMorph::parse_pmx(&globals(), &mut buffer, 1).unwrap();
        assert!(buffer.is_end());
        assert_eq!(ModelMorphType::Flip, flip.morph_type);
        assert_eq!(
            ModelMorphU::Impulses(vec![ModelMorphImpulse {
                rigid_body_index: 4,
                is_local: true,
                velocity: F128([0.0, 1.0, 0.0, 0.0]),
                torque: F128::default(),
            }]),
            impulse.u
        );
    }

    #[test]
    fn test_unsupported_morph_type() {
        let mut writer = PmxWriter::new(globals());
        write_morph_prefix(&mut writer, 11, 0);
        assert_eq!(
            Err(Status::UnsupportedMorphType(11)),
            ModelMorph::parse_pmx(&globals(), &mut writer.into_buffer(), 0)
        );
    }
}
