use std::fmt::{self, Write};

use bitflags::bitflags;
use pmxread::{
    bone::{BoneTail, ModelBone},
    model::{ModelMaterial, Toon},
    morph::ModelMorph,
    LanguageType, Model,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReportSections: u8 {
        const HEADER = 0x1;
        const GEOMETRY = 0x2;
        const TEXTURES = 0x4;
        const MATERIALS = 0x8;
        const BONES = 0x10;
        const MORPHS = 0x20;
        const ALL = Self::HEADER.bits()
            | Self::GEOMETRY.bits()
            | Self::TEXTURES.bits()
            | Self::MATERIALS.bits()
            | Self::BONES.bits()
            | Self::MORPHS.bits();
    }
}

impl ReportSections {
    /// Parses a comma separated list such as `header,bones`. Returns `None`
    /// on the first unknown name.
    pub fn parse_list(list: &str) -> Option<ReportSections> {
        let mut sections = ReportSections::empty();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            sections |= match name.to_ascii_lowercase().as_str() {
                "header" => ReportSections::HEADER,
                "geometry" => ReportSections::GEOMETRY,
                "textures" => ReportSections::TEXTURES,
                "materials" => ReportSections::MATERIALS,
                "bones" => ReportSections::BONES,
                "morphs" => ReportSections::MORPHS,
                "all" => ReportSections::ALL,
                _ => return None,
            };
        }
        Some(sections)
    }
}

/// Human readable summary of a decoded model.
pub struct ModelReport<'a> {
    model: &'a Model,
    language: LanguageType,
    sections: ReportSections,
}

impl<'a> ModelReport<'a> {
    pub fn new(model: &'a Model, language: LanguageType, sections: ReportSections) -> Self {
        Self {
            model,
            language,
            sections,
        }
    }

    fn write_header(&self, f: &mut impl Write) -> fmt::Result {
        let globals = self.model.globals();
        writeln!(f, "== Header")?;
        writeln!(f, "name: {}", self.model.name(self.language))?;
        writeln!(f, "comment: {}", self.model.comment(self.language).replace("\r\n", "\n"))?;
        writeln!(
            f,
            "version: {} ({:?})",
            self.model.version(),
            self.model.format_type()
        )?;
        writeln!(f, "encoding: {:?}", globals.codec_type)?;
        writeln!(f, "additional uv: {}", globals.additional_uv_size)?;
        writeln!(
            f,
            "index widths: vertex={} texture={} material={} bone={} morph={} rigid_body={}",
            globals.vertex_index_size,
            globals.texture_index_size,
            globals.material_index_size,
            globals.bone_index_size,
            globals.morph_index_size,
            globals.rigid_body_index_size
        )
    }

    fn write_geometry(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(f, "== Geometry")?;
        writeln!(f, "vertices: {}", self.model.vertices().len())?;
        writeln!(f, "triangles: {}", self.model.triangles().len())
    }

    fn write_textures(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(f, "== Textures ({})", self.model.textures().len())?;
        for (index, texture) in self.model.textures().iter().enumerate() {
            writeln!(f, "[{}] {}", index, texture.path)?;
        }
        Ok(())
    }

    fn write_material(&self, f: &mut impl Write, material: &ModelMaterial) -> fmt::Result {
        let textures = self.model.textures();
        writeln!(
            f,
            "[{}] {} triangles={}+{} flags={:?}",
            material.index,
            material.name(self.language),
            material.first_triangle(),
            material.triangle_count(),
            material.flags
        )?;
        if let Some(path) = material.diffuse_texture_path(textures) {
            writeln!(f, "    diffuse: {}", path)?;
        }
        if let Some(path) = material.sphere_texture_path(textures) {
            writeln!(f, "    sphere: {} ({:?})", path, material.sphere_map_texture_type)?;
        }
        match material.toon(textures) {
            Toon::Internal(index) => writeln!(f, "    toon: shared {}", index)?,
            Toon::Texture(Some(path)) => writeln!(f, "    toon: {}", path)?,
            Toon::Texture(None) => {}
        }
        match material.directive_error() {
            Some(error) => writeln!(f, "    directives: error: {}", error),
            None if material.directives().is_empty() => Ok(()),
            None => writeln!(f, "    directives: {}", material.directives().len()),
        }
    }

    fn write_materials(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(f, "== Materials ({})", self.model.materials().len())?;
        for material in self.model.materials() {
            self.write_material(f, material)?;
        }
        Ok(())
    }

    fn write_bone(&self, f: &mut impl Write, bone: &ModelBone) -> fmt::Result {
        let [x, y, z, _] = bone.origin.0;
        write!(f, "[{}] {} at ({}, {}, {})", bone.index, bone.name(self.language), x, y, z)?;
        if let Some(parent) = bone.parent_index() {
            write!(f, " parent={}", parent)?;
        }
        match bone.tail {
            BoneTail::Bone(index) if index >= 0 => write!(f, " tail=#{}", index)?,
            BoneTail::Bone(_) => {}
            BoneTail::Position(offset) => {
                let [x, y, z, _] = offset.0;
                write!(f, " tail=+({}, {}, {})", x, y, z)?
            }
        }
        writeln!(f)?;
        if let Some(inherent) = &bone.inherent {
            writeln!(
                f,
                "    inherit #{} x{}{}{}",
                inherent.parent_index,
                inherent.coefficient,
                if bone.has_inherent_orientation() { " rotation" } else { "" },
                if bone.has_inherent_translation() { " translation" } else { "" }
            )?;
        }
        if let Some(constraint) = &bone.constraint {
            writeln!(
                f,
                "    ik target=#{} iterations={} limit={} links={}",
                constraint.target_bone_index,
                constraint.num_iterations,
                constraint.angle_limit,
                constraint.joints.len()
            )?;
        }
        Ok(())
    }

    fn write_bones(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(f, "== Bones ({})", self.model.bones().len())?;
        for bone in self.model.bones() {
            self.write_bone(f, bone)?;
        }
        Ok(())
    }

    fn write_morph(&self, f: &mut impl Write, morph: &ModelMorph) -> fmt::Result {
        writeln!(
            f,
            "[{}] {} {:?}/{:?} offsets={}",
            morph.index,
            morph.name(self.language),
            morph.category,
            morph.morph_type,
            morph.u.len()
        )
    }

    fn write_morphs(&self, f: &mut impl Write) -> fmt::Result {
        writeln!(f, "== Morphs ({})", self.model.morphs().len())?;
        for morph in self.model.morphs() {
            self.write_morph(f, morph)?;
        }
        Ok(())
    }
}

impl fmt::Display for ModelReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sections.contains(ReportSections::HEADER) {
            self.write_header(f)?;
        }
        if self.sections.contains(ReportSections::GEOMETRY) {
            self.write_geometry(f)?;
        }
        if self.sections.contains(ReportSections::TEXTURES) {
            self.write_textures(f)?;
        }
        if self.sections.contains(ReportSections::MATERIALS) {
            self.write_materials(f)?;
        }
        if self.sections.contains(ReportSections::BONES) {
            self.write_bones(f)?;
        }
        if self.sections.contains(ReportSections::MORPHS) {
            self.write_morphs(f)?;
        }
        Ok(())
    }
}
