//! Byte builder for synthetic PMX streams in tests. It writes exactly what
//! the decoder reads and performs no validation.

use crate::{
    bone::BoneFlags,
    common::{Buffer, CodecType},
    model::{Globals, IndexKind, SIGNATURE},
};

macro_rules! write_primitive {
    ($typ: ty, $write_typ:ident) => {
        pub fn $write_typ(&mut self, value: $typ) -> &mut Self {
            self.write_bytes(&value.to_le_bytes())
        }
    };
}

pub struct PmxWriter {
    globals: Globals,
    data: Vec<u8>,
}

impl PmxWriter {
    pub fn new(globals: Globals) -> PmxWriter {
        PmxWriter {
            globals,
            data: Vec::with_capacity(2 << 12),
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.data.extend_from_slice(data);
        self
    }

    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.write_bytes(&[value])
    }

    write_primitive!(u16, write_u16);
    write_primitive!(i32, write_i32);
    write_primitive!(u32, write_u32);
    write_primitive!(f32, write_f32);

    pub fn write_f32_2(&mut self, value: [f32; 2]) -> &mut Self {
        for component in value {
            self.write_f32(component);
        }
        self
    }

    pub fn write_f32_3(&mut self, value: [f32; 3]) -> &mut Self {
        for component in value {
            self.write_f32(component);
        }
        self
    }

    pub fn write_f32_4(&mut self, value: [f32; 4]) -> &mut Self {
        for component in value {
            self.write_f32(component);
        }
        self
    }

    pub fn write_count(&mut self, count: usize) -> &mut Self {
        self.write_i32(count as i32)
    }

    /// Length-prefixed text in the header's encoding. Unknown encodings are
    /// written as UTF-8.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        let bytes = match self.globals.codec_type {
            CodecType::Utf16 => value
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect::<Vec<_>>(),
            CodecType::Utf8 | CodecType::Unknown(_) => value.as_bytes().to_vec(),
        };
        self.write_count(bytes.len()).write_bytes(&bytes)
    }

    fn write_sized(&mut self, value: i64, width: u8) -> &mut Self {
        let bytes = value.to_le_bytes();
        self.write_bytes(&bytes[..width as usize])
    }

    pub fn write_vertex_index(&mut self, value: u32) -> &mut Self {
        self.write_sized(value as i64, self.globals.vertex_index_size)
    }

    pub fn write_index(&mut self, kind: IndexKind, value: i32) -> &mut Self {
        self.write_sized(value as i64, self.globals.index_width(kind))
    }

    pub fn write_header(&mut self, version: f32) -> &mut Self {
        let globals = self.globals;
        let codec = match globals.codec_type {
            CodecType::Utf16 => 0,
            CodecType::Utf8 => 1,
            CodecType::Unknown(value) => value,
        };
        self.write_u32(SIGNATURE)
            .write_f32(version)
            .write_byte(8)
            .write_byte(codec)
            .write_byte(globals.additional_uv_size)
            .write_bytes(&[
                globals.vertex_index_size,
                globals.texture_index_size,
                globals.material_index_size,
                globals.bone_index_size,
                globals.morph_index_size,
                globals.rigid_body_index_size,
            ])
    }

    pub fn write_model_info(
        &mut self,
        name_ja: &str,
        name_en: &str,
        comment_ja: &str,
        comment_en: &str,
    ) -> &mut Self {
        self.write_string(name_ja)
            .write_string(name_en)
            .write_string(comment_ja)
            .write_string(comment_en)
    }

    /// A vertex at `position` with the given deform kind; every bone index is
    /// 0 and the payload is otherwise filler. Kinds above 4 write only the
    /// tag byte after the attributes.
    pub fn write_deform_vertex(&mut self, kind: u8, position: [f32; 3]) -> &mut Self {
        self.write_f32_3(position)
            .write_f32_3([0.0, 1.0, 0.0])
            .write_f32_2([0.5, 0.5]);
        for _ in 0..self.globals.additional_uv_size {
            self.write_f32_4([0.0; 4]);
        }
        self.write_byte(kind);
        let bone = IndexKind::Bone;
        match kind {
            0 => {
                self.write_index(bone, 0);
            }
            1 => {
                self.write_index(bone, 0).write_index(bone, 0).write_f32(0.25);
            }
            2 | 4 => {
                for _ in 0..4 {
                    self.write_index(bone, 0);
                }
                self.write_f32_4([0.25; 4]);
            }
            3 => {
                self.write_index(bone, 0).write_index(bone, 0).write_f32(0.25);
                self.write_f32_3([0.0; 3])
                    .write_f32_3([0.0; 3])
                    .write_f32_3([0.0; 3]);
            }
            _ => return self,
        }
        self.write_f32(1.0)
    }

    /// A material drawing `vertex_count` face indices, using texture 0 as
    /// diffuse and shared toon 3.
    pub fn write_material(
        &mut self,
        name: &str,
        note: &str,
        flags: u8,
        vertex_count: i32,
    ) -> &mut Self {
        self.write_string(name)
            .write_string("")
            .write_f32_4([1.0, 1.0, 1.0, 1.0])
            .write_f32_3([0.0, 0.0, 0.0])
            .write_f32(5.0)
            .write_f32_3([0.5, 0.5, 0.5])
            .write_byte(flags)
            .write_f32_4([0.0, 0.0, 0.0, 1.0])
            .write_f32(1.0)
            .write_index(IndexKind::Texture, 0)
            .write_index(IndexKind::Texture, -1)
            .write_byte(0)
            .write_byte(1)
            .write_byte(3)
            .write_string(note)
            .write_i32(vertex_count)
    }

    /// A bone at (1, 2, 3) with every optional field `flags` asks for.
    /// Index tails point at bone 1; position tails are (0, 1, 0). The IK block
    /// targets bone 1 with two links, the first one limited.
    pub fn write_bone(&mut self, name_ja: &str, name_en: &str, parent: i32, flags: BoneFlags) -> &mut Self {
        let bone = IndexKind::Bone;
        self.write_string(name_ja)
            .write_string(name_en)
            .write_f32_3([1.0, 2.0, 3.0])
            .write_index(bone, parent)
            .write_i32(0)
            .write_u16(flags.bits());
        if flags.contains(BoneFlags::TAIL_IS_INDEX) {
            self.write_index(bone, 1);
        } else {
            self.write_f32_3([0.0, 1.0, 0.0]);
        }
        if flags.intersects(BoneFlags::INHERIT_ROTATION | BoneFlags::INHERIT_TRANSLATION) {
            self.write_index(bone, 0).write_f32(0.5);
        }
        if flags.contains(BoneFlags::FIXED_AXIS) {
            self.write_f32_3([1.0, 0.0, 0.0]);
        }
        if flags.contains(BoneFlags::LOCAL_AXES) {
            self.write_f32_3([1.0, 0.0, 0.0]).write_f32_3([0.0, 0.0, 1.0]);
        }
        if flags.contains(BoneFlags::EXTERNAL_PARENT) {
            self.write_i32(0);
        }
        if flags.contains(BoneFlags::IK) {
            self.write_index(bone, 1)
                .write_i32(40)
                .write_f32(0.5)
                .write_count(2)
                .write_index(bone, 0)
                .write_byte(1)
                .write_f32_3([-1.0, 0.0, 0.0])
                .write_f32_3([0.0, 0.0, 0.0])
                .write_index(bone, 0)
                .write_byte(0);
        }
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn into_buffer(self) -> Buffer {
        Buffer::create(self.data)
    }
}
