use bitflags::bitflags;

use crate::{
    bone::ModelBone,
    common::{Buffer, CodecType, DecodeError, LanguageType, Section, Status, F128},
    directive::{parse_directives, Directive, DirectiveError},
    hierarchy::{self, BoneNode},
    morph::ModelMorph,
    utils::{fourcc, pick_name},
};

pub const SIGNATURE: u32 = fourcc(b'P', b'M', b'X', b' ');

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelFormatType {
    Pmx2_0,
    Pmx2_1,
    Unknown(f32),
}

impl From<f32> for ModelFormatType {
    fn from(version: f32) -> Self {
        if version == 2.0f32 {
            ModelFormatType::Pmx2_0
        } else if version == 2.1f32 {
            ModelFormatType::Pmx2_1
        } else {
            ModelFormatType::Unknown(version)
        }
    }
}

/// Index kinds that share the signed encoding. Vertex indices are unsigned
/// and go through [`Globals::read_vertex_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Texture,
    Material,
    Bone,
    Morph,
    RigidBody,
}

/// Header values that govern how every later section is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Globals {
    pub codec_type: CodecType,
    pub additional_uv_size: u8,
    pub vertex_index_size: u8,
    pub texture_index_size: u8,
    pub material_index_size: u8,
    pub bone_index_size: u8,
    pub morph_index_size: u8,
    pub rigid_body_index_size: u8,
}

impl Globals {
    /// Globals using the same width for all six index kinds.
    pub fn uniform(codec_type: CodecType, additional_uv_size: u8, index_size: u8) -> Self {
        Self {
            codec_type,
            additional_uv_size,
            vertex_index_size: index_size,
            texture_index_size: index_size,
            material_index_size: index_size,
            bone_index_size: index_size,
            morph_index_size: index_size,
            rigid_body_index_size: index_size,
        }
    }

    fn parse_pmx(buffer: &mut Buffer) -> Result<Globals, Status> {
        let _num_globals = buffer.read_byte()?;
        Ok(Globals {
            codec_type: CodecType::from(buffer.read_byte()?),
            additional_uv_size: buffer.read_byte()?,
            vertex_index_size: buffer.read_byte()?,
            texture_index_size: buffer.read_byte()?,
            material_index_size: buffer.read_byte()?,
            bone_index_size: buffer.read_byte()?,
            morph_index_size: buffer.read_byte()?,
            rigid_body_index_size: buffer.read_byte()?,
        })
    }

    pub fn index_width(&self, kind: IndexKind) -> u8 {
        match kind {
            IndexKind::Texture => self.texture_index_size,
            IndexKind::Material => self.material_index_size,
            IndexKind::Bone => self.bone_index_size,
            IndexKind::Morph => self.morph_index_size,
            IndexKind::RigidBody => self.rigid_body_index_size,
        }
    }

    pub fn read_vertex_index(&self, buffer: &mut Buffer) -> Result<u32, Status> {
        buffer.read_unsigned_index(self.vertex_index_size)
    }

    pub fn read_index(&self, buffer: &mut Buffer, kind: IndexKind) -> Result<i32, Status> {
        buffer.read_signed_index(self.index_width(kind))
    }

    pub fn read_string(&self, buffer: &mut Buffer) -> Result<String, Status> {
        buffer.read_string(self.codec_type)
    }
}

/// Skinning payload of a vertex. Weights are kept exactly as stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deform {
    Bdef1 {
        bone: i32,
    },
    Bdef2 {
        bones: [i32; 2],
        weight: f32,
    },
    Bdef4 {
        bones: [i32; 4],
        weights: [f32; 4],
    },
    Sdef {
        bones: [i32; 2],
        weight: f32,
        c: F128,
        r0: F128,
        r1: F128,
    },
    Qdef {
        bones: [i32; 4],
        weights: [f32; 4],
    },
}

impl Deform {
    fn parse_pmx(globals: &Globals, buffer: &mut Buffer) -> Result<Deform, Status> {
        let kind = buffer.read_byte()?;
        let bone = IndexKind::Bone;
        match kind {
            0 => Ok(Deform::Bdef1 {
                bone: globals.read_index(buffer, bone)?,
            }),
            1 => Ok(Deform::Bdef2 {
                bones: [
                    globals.read_index(buffer, bone)?,
                    globals.read_index(buffer, bone)?,
                ],
                weight: buffer.read_f32_little_endian()?,
            }),
            2 | 4 => {
                let bones = [
                    globals.read_index(buffer, bone)?,
                    globals.read_index(buffer, bone)?,
                    globals.read_index(buffer, bone)?,
                    globals.read_index(buffer, bone)?,
                ];
                let weights = [
                    buffer.read_f32_little_endian()?,
                    buffer.read_f32_little_endian()?,
                    buffer.read_f32_little_endian()?,
                    buffer.read_f32_little_endian()?,
                ];
                if kind == 2 {
                    Ok(Deform::Bdef4 { bones, weights })
                } else {
                    Ok(Deform::Qdef { bones, weights })
                }
            }
            3 => Ok(Deform::Sdef {
                bones: [
                    globals.read_index(buffer, bone)?,
                    globals.read_index(buffer, bone)?,
                ],
                weight: buffer.read_f32_little_endian()?,
                c: buffer.read_f32_3_little_endian()?,
                r0: buffer.read_f32_3_little_endian()?,
                r1: buffer.read_f32_3_little_endian()?,
            }),
            _ => Err(Status::UnknownDeformKind(kind)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Deform::Bdef1 { .. } => "BDEF1",
            Deform::Bdef2 { .. } => "BDEF2",
            Deform::Bdef4 { .. } => "BDEF4",
            Deform::Sdef { .. } => "SDEF",
            Deform::Qdef { .. } => "QDEF",
        }
    }

    /// (bone, weight) pairs; the second BDEF2/SDEF weight is `1 - weight`.
    pub fn bone_weights(&self) -> Vec<(i32, f32)> {
        match *self {
            Deform::Bdef1 { bone } => vec![(bone, 1.0f32)],
            Deform::Bdef2 { bones, weight } | Deform::Sdef { bones, weight, .. } => {
                vec![(bones[0], weight), (bones[1], 1.0f32 - weight)]
            }
            Deform::Bdef4 { bones, weights } | Deform::Qdef { bones, weights } => {
                bones.into_iter().zip(weights).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelVertex {
    pub origin: F128,
    pub normal: F128,
    pub uv: F128,
    pub additional_uv: Vec<F128>,
    pub deform: Deform,
    pub edge_size: f32,
}

impl ModelVertex {
    fn parse_pmx(globals: &Globals, buffer: &mut Buffer) -> Result<ModelVertex, Status> {
        let origin = buffer.read_f32_3_little_endian()?;
        let normal = buffer.read_f32_3_little_endian()?;
        let uv = buffer.read_f32_2_little_endian()?;
        let additional_uv = (0..globals.additional_uv_size)
            .map(|_| buffer.read_f32_4_little_endian())
            .collect::<Result<Vec<_>, _>>()?;
        let deform = Deform::parse_pmx(globals, buffer)?;
        let edge_size = buffer.read_f32_little_endian()?;
        Ok(ModelVertex {
            origin,
            normal,
            uv,
            additional_uv,
            deform,
            edge_size,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triangle(pub [u32; 3]);

impl Triangle {
    pub fn vertex_indices(&self) -> [u32; 3] {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTexture {
    pub path: String,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct MaterialFlags: u8 {
        const TWO_SIDED = 0x01;
        const GROUND_SHADOW = 0x02;
        const CAST_SHADOW = 0x04;
        const RECEIVE_SHADOW = 0x08;
        const EDGE = 0x10;
        const VERTEX_COLOR = 0x20;
        const POINT_DRAW = 0x40;
        const LINE_DRAW = 0x80;
    }
}

impl MaterialFlags {
    pub fn is_two_sided(self) -> bool {
        self.contains(MaterialFlags::TWO_SIDED)
    }

    pub fn casts_shadow(self) -> bool {
        self.intersects(MaterialFlags::GROUND_SHADOW | MaterialFlags::CAST_SHADOW)
    }

    pub fn receives_shadow(self) -> bool {
        self.contains(MaterialFlags::RECEIVE_SHADOW)
    }

    pub fn has_edge(self) -> bool {
        self.contains(MaterialFlags::EDGE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SphereBlendMode {
    Disabled,
    Multiply,
    Add,
    SubTexture,
    Unknown(u8),
}

impl From<u8> for SphereBlendMode {
    fn from(value: u8) -> Self {
        match value {
            0 => SphereBlendMode::Disabled,
            1 => SphereBlendMode::Multiply,
            2 => SphereBlendMode::Add,
            3 => SphereBlendMode::SubTexture,
            other => SphereBlendMode::Unknown(other),
        }
    }
}

/// Toon reference as stored: a texture table index, or one of the ten
/// shared toon textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToonReference {
    Texture(i32),
    Internal(u8),
}

/// Toon reference resolved against the texture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toon<'a> {
    Internal(u8),
    Texture(Option<&'a str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMaterial {
    pub index: usize,
    pub name_ja: String,
    pub name_en: String,
    pub diffuse_color: F128,
    pub specular_color: F128,
    pub specular_power: f32,
    pub ambient_color: F128,
    pub flags: MaterialFlags,
    pub edge_color: F128,
    pub edge_size: f32,
    pub diffuse_texture_index: i32,
    pub sphere_map_texture_index: i32,
    pub sphere_map_texture_type: SphereBlendMode,
    pub toon: ToonReference,
    /// Offset of this material's run in the flat face index stream.
    pub first_vertex: usize,
    pub num_vertex_indices: usize,
    note: String,
    directives: Vec<Directive>,
    directive_error: Option<DirectiveError>,
}

impl ModelMaterial {
    fn parse_pmx(
        globals: &Globals,
        buffer: &mut Buffer,
        index: usize,
        first_vertex: usize,
    ) -> Result<ModelMaterial, Status> {
        let name_ja = globals.read_string(buffer)?;
        let name_en = globals.read_string(buffer)?;
        let diffuse_color = buffer.read_f32_4_little_endian()?;
        let specular_color = buffer.read_f32_3_little_endian()?;
        let specular_power = buffer.read_f32_little_endian()?;
        let ambient_color = buffer.read_f32_3_little_endian()?;
        let flags = MaterialFlags::from_bits_retain(buffer.read_byte()?);
        let edge_color = buffer.read_f32_4_little_endian()?;
        let edge_size = buffer.read_f32_little_endian()?;
        let diffuse_texture_index = globals.read_index(buffer, IndexKind::Texture)?;
        let sphere_map_texture_index = globals.read_index(buffer, IndexKind::Texture)?;
        let sphere_map_texture_type = SphereBlendMode::from(buffer.read_byte()?);
        if let SphereBlendMode::Unknown(value) = sphere_map_texture_type {
            log::warn!("Material {}: unknown sphere blend mode {}", index, value);
        }
        let toon = if buffer.read_byte()? == 0 {
            ToonReference::Texture(globals.read_index(buffer, IndexKind::Texture)?)
        } else {
            ToonReference::Internal(buffer.read_byte()?)
        };
        let note = globals.read_string(buffer)?;
        let vertex_count = buffer.read_i32_little_endian()?;
        let num_vertex_indices = usize::try_from(vertex_count).unwrap_or_else(|_| {
            log::warn!(
                "Material {}: negative vertex count {}, treated as 0",
                index,
                vertex_count
            );
            0
        });
        let mut material = ModelMaterial {
            index,
            name_ja,
            name_en,
            diffuse_color,
            specular_color,
            specular_power,
            ambient_color,
            flags,
            edge_color,
            edge_size,
            diffuse_texture_index,
            sphere_map_texture_index,
            sphere_map_texture_type,
            toon,
            first_vertex,
            num_vertex_indices,
            note: String::new(),
            directives: vec![],
            directive_error: None,
        };
        material.set_note(note);
        Ok(material)
    }

    pub fn name(&self, language: LanguageType) -> &str {
        pick_name(language, &self.name_ja, &self.name_en)
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Replaces the note and re-parses its directives. A parse failure leaves
    /// the material with no directives and records the error.
    pub fn set_note(&mut self, note: String) {
        self.note = note;
        match parse_directives(&self.note, self.flags) {
            Ok(directives) => {
                self.directives = directives;
                self.directive_error = None;
            }
            Err(error) => {
                log::warn!(
                    "Material {} ({}): ignoring directives: {}",
                    self.index,
                    self.name(LanguageType::default()),
                    error
                );
                self.directives.clear();
                self.directive_error = Some(error);
            }
        }
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn directive_error(&self) -> Option<&DirectiveError> {
        self.directive_error.as_ref()
    }

    pub fn diffuse_texture_path<'a>(&self, textures: &'a [ModelTexture]) -> Option<&'a str> {
        texture_path(textures, self.diffuse_texture_index)
    }

    pub fn sphere_texture_path<'a>(&self, textures: &'a [ModelTexture]) -> Option<&'a str> {
        match self.sphere_map_texture_type {
            SphereBlendMode::Disabled => None,
            _ => texture_path(textures, self.sphere_map_texture_index),
        }
    }

    pub fn toon<'a>(&self, textures: &'a [ModelTexture]) -> Toon<'a> {
        match self.toon {
            ToonReference::Internal(value) => Toon::Internal(value),
            ToonReference::Texture(index) => Toon::Texture(texture_path(textures, index)),
        }
    }

    pub fn first_triangle(&self) -> usize {
        self.first_vertex / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.num_vertex_indices / 3
    }

    /// The triangles drawn with this material, or an empty slice when the run
    /// falls outside `triangles`.
    pub fn triangles<'a>(&self, triangles: &'a [Triangle]) -> &'a [Triangle] {
        let start = self.first_triangle();
        start
            .checked_add(self.triangle_count())
            .and_then(|end| triangles.get(start..end))
            .unwrap_or(&[])
    }
}

fn texture_path(textures: &[ModelTexture], index: i32) -> Option<&str> {
    usize::try_from(index)
        .ok()
        .and_then(|index| textures.get(index))
        .map(|texture| texture.path.as_str())
}

fn read_record<T>(
    buffer: &mut Buffer,
    section: Section,
    read: impl FnOnce(&mut Buffer) -> Result<T, Status>,
) -> Result<T, DecodeError> {
    let start = buffer.offset();
    read(buffer).map_err(|status| DecodeError::new(status, section, start))
}

fn read_section<T>(
    buffer: &mut Buffer,
    section: Section,
    mut read: impl FnMut(&mut Buffer, usize) -> Result<T, Status>,
) -> Result<Vec<T>, DecodeError> {
    let count = read_record(buffer, section, Buffer::read_len)?;
    log::trace!("Len({}): {} at offset {}", section, count, buffer.offset());
    let mut items = Vec::with_capacity(buffer.capacity_hint(count, 1));
    for index in 0..count {
        items.push(read_record(buffer, section, |buffer| read(buffer, index))?);
    }
    Ok(items)
}

/// A decoded PMX model, up to and including the morph section.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    version: f32,
    globals: Globals,
    name_ja: String,
    name_en: String,
    comment_ja: String,
    comment_en: String,
    vertices: Vec<ModelVertex>,
    triangles: Vec<Triangle>,
    textures: Vec<ModelTexture>,
    materials: Vec<ModelMaterial>,
    bones: Vec<ModelBone>,
    morphs: Vec<ModelMorph>,
}

impl Model {
    pub fn load_from_bytes(data: Vec<u8>) -> Result<Model, DecodeError> {
        Self::load_from_buffer(&mut Buffer::create(data))
    }

    /// Decodes the stream in file order. Sections after the morph table are
    /// left unread.
    pub fn load_from_buffer(buffer: &mut Buffer) -> Result<Model, DecodeError> {
        let (version, globals) = read_record(buffer, Section::Header, Self::parse_header_pmx)?;
        let [name_ja, name_en, comment_ja, comment_en] =
            read_record(buffer, Section::ModelInfo, |buffer| {
                Ok([
                    globals.read_string(buffer)?,
                    globals.read_string(buffer)?,
                    globals.read_string(buffer)?,
                    globals.read_string(buffer)?,
                ])
            })?;
        let vertices = read_section(buffer, Section::Vertex, |buffer, _| {
            ModelVertex::parse_pmx(&globals, buffer)
        })?;
        let triangles = read_record(buffer, Section::Face, |buffer| {
            Self::parse_face_block_pmx(&globals, buffer)
        })?;
        log::trace!("Len(triangles): {}", triangles.len());
        let textures = read_section(buffer, Section::Texture, |buffer, _| {
            Ok(ModelTexture {
                path: globals.read_string(buffer)?,
            })
        })?;
        let mut first_vertex = 0usize;
        let materials = read_section(buffer, Section::Material, |buffer, index| {
            let material = ModelMaterial::parse_pmx(&globals, buffer, index, first_vertex)?;
            first_vertex = first_vertex.saturating_add(material.num_vertex_indices);
            Ok(material)
        })?;
        let bones = read_section(buffer, Section::Bone, |buffer, index| {
            ModelBone::parse_pmx(&globals, buffer, index)
        })?;
        let morphs = read_section(buffer, Section::Morph, |buffer, index| {
            ModelMorph::parse_pmx(&globals, buffer, index)
        })?;
        let model = Model {
            version,
            globals,
            name_ja,
            name_en,
            comment_ja,
            comment_en,
            vertices,
            triangles,
            textures,
            materials,
            bones,
            morphs,
        };
        log::info!(
            "Loaded PMX {:?} \"{}\": {} vertices, {} triangles, {} textures, {} materials, {} bones, {} morphs",
            model.format_type(),
            model.name(LanguageType::default()),
            model.vertices.len(),
            model.triangles.len(),
            model.textures.len(),
            model.materials.len(),
            model.bones.len(),
            model.morphs.len()
        );
        Ok(model)
    }

    fn parse_header_pmx(buffer: &mut Buffer) -> Result<(f32, Globals), Status> {
        if buffer.read_u32_little_endian()? != SIGNATURE {
            return Err(Status::BadSignature);
        }
        let version = buffer.read_f32_little_endian()?;
        if let ModelFormatType::Unknown(version) = ModelFormatType::from(version) {
            log::warn!("Unknown PMX version {}, decoding as 2.x", version);
        }
        let globals = Globals::parse_pmx(buffer)?;
        Ok((version, globals))
    }

    fn parse_face_block_pmx(globals: &Globals, buffer: &mut Buffer) -> Result<Vec<Triangle>, Status> {
        let num_vertex_indices = buffer.read_len()?;
        if num_vertex_indices % 3 != 0 {
            return Err(Status::MalformedFaceList(num_vertex_indices));
        }
        let num_triangles = num_vertex_indices / 3;
        let mut triangles = Vec::with_capacity(
            buffer.capacity_hint(num_triangles, 3 * globals.vertex_index_size as usize),
        );
        for _ in 0..num_triangles {
            triangles.push(Triangle([
                globals.read_vertex_index(buffer)?,
                globals.read_vertex_index(buffer)?,
                globals.read_vertex_index(buffer)?,
            ]));
        }
        Ok(triangles)
    }

    pub fn version(&self) -> f32 {
        self.version
    }

    pub fn format_type(&self) -> ModelFormatType {
        ModelFormatType::from(self.version)
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn name(&self, language: LanguageType) -> &str {
        pick_name(language, &self.name_ja, &self.name_en)
    }

    pub fn comment(&self, language: LanguageType) -> &str {
        pick_name(language, &self.comment_ja, &self.comment_en)
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn textures(&self) -> &[ModelTexture] {
        &self.textures
    }

    pub fn materials(&self) -> &[ModelMaterial] {
        &self.materials
    }

    pub fn material_mut(&mut self, index: usize) -> Option<&mut ModelMaterial> {
        self.materials.get_mut(index)
    }

    pub fn bones(&self) -> &[ModelBone] {
        &self.bones
    }

    pub fn morphs(&self) -> &[ModelMorph] {
        &self.morphs
    }

    pub fn material_triangles(&self, material: &ModelMaterial) -> &[Triangle] {
        material.triangles(&self.triangles)
    }

    /// Materials whose note failed to parse, with the failure.
    pub fn directive_warnings(&self) -> impl Iterator<Item = (&ModelMaterial, &DirectiveError)> {
        self.materials
            .iter()
            .filter_map(|material| material.directive_error().map(|error| (material, error)))
    }

    /// Uniformly scales vertex and bone positions.
    pub fn resize(&mut self, factor: f32) {
        for vertex in &mut self.vertices {
            vertex.origin = vertex.origin.scaled(factor);
        }
        for bone in &mut self.bones {
            bone.resize(factor);
        }
    }

    pub fn bone_hierarchy(&self) -> Result<Vec<BoneNode>, Status> {
        hierarchy::build_hierarchy(&self.bones)
    }

    pub fn root_bones(&self) -> impl Iterator<Item = &ModelBone> {
        hierarchy::root_bones(&self.bones)
    }

    pub fn children_of(&self, index: usize) -> impl Iterator<Item = &ModelBone> {
        hierarchy::children_of(&self.bones, index)
    }

    pub fn has_children(&self, index: usize) -> bool {
        hierarchy::has_children(&self.bones, index)
    }
}
