use std::{
    fmt,
    ops::Range,
    path::{Path, PathBuf},
};

use pmxread::{
    directive::{RenderMode, ShadowCasting},
    model::ModelMaterial,
    DirectiveError, LanguageType, Model, Status,
};

use crate::{
    error::ImportError,
    render::{resolve_render_mode, ExecuteDirective, MaterialProperties, RendererSettings},
    skeleton::Skeleton,
    utils::{canonicalize_texture_path, f128_to_vec4},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Uniform scale applied to vertex and bone positions after decoding.
    pub scale: f32,
    pub language: LanguageType,
    /// Base directory for texture paths. Defaults to the model file's directory.
    pub texture_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0f32,
            language: LanguageType::English,
            texture_dir: None,
        }
    }
}

/// A material whose note text failed to parse. The material was imported
/// with no directives.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveWarning {
    pub material_index: usize,
    pub material_name: String,
    pub error: DirectiveError,
}

impl fmt::Display for DirectiveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "material #{} \"{}\": {}",
            self.material_index, self.material_name, self.error
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneMaterial {
    pub index: usize,
    pub name: String,
    pub render_mode: RenderMode,
    pub properties: MaterialProperties,
    pub renderer: RendererSettings,
    /// Triangle indices drawn by this material; empty when the run is out of range.
    pub triangles: Range<usize>,
    pub diffuse_texture: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ImportedModel {
    model: Model,
    language: LanguageType,
    texture_dir: Option<PathBuf>,
    warnings: Vec<DirectiveWarning>,
}

pub fn import_file(path: impl AsRef<Path>, options: &ImportOptions) -> Result<ImportedModel, ImportError> {
    let path = path.as_ref();
    log::debug!("Importing {}", path.display());
    let bytes = std::fs::read(path)?;
    let mut options = options.clone();
    if options.texture_dir.is_none() {
        options.texture_dir = path.parent().map(Path::to_path_buf);
    }
    import_bytes(bytes, &options)
}

pub fn import_bytes(bytes: Vec<u8>, options: &ImportOptions) -> Result<ImportedModel, ImportError> {
    let mut model = Model::load_from_bytes(bytes)?;
    if options.scale != 1.0f32 {
        log::debug!("Resizing model by {}", options.scale);
        model.resize(options.scale);
    }
    let warnings = model
        .directive_warnings()
        .map(|(material, error)| DirectiveWarning {
            material_index: material.index,
            material_name: material.name(options.language).to_owned(),
            error: error.clone(),
        })
        .collect::<Vec<_>>();
    log::info!(
        "Imported \"{}\" with {} directive warning(s)",
        model.name(options.language),
        warnings.len()
    );
    Ok(ImportedModel {
        model,
        language: options.language,
        texture_dir: options.texture_dir.clone(),
        warnings,
    })
}

impl ImportedModel {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn name(&self) -> &str {
        self.model.name(self.language)
    }

    pub fn language(&self) -> LanguageType {
        self.language
    }

    pub fn warnings(&self) -> &[DirectiveWarning] {
        &self.warnings
    }

    /// Filesystem path of texture `index`, joined onto the texture directory.
    pub fn texture_path(&self, index: i32) -> Option<PathBuf> {
        let texture = usize::try_from(index)
            .ok()
            .and_then(|index| self.model.textures().get(index))?;
        Some(self.resolve_path(&texture.path))
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let relative = PathBuf::from(canonicalize_texture_path(path));
        match &self.texture_dir {
            Some(dir) => dir.join(relative),
            None => relative,
        }
    }

    pub fn skeleton(&self) -> Result<Skeleton, Status> {
        Skeleton::from_model(&self.model, self.language)
    }

    /// Builds a render material and renderer state per material.
    /// `texture_alpha` returns alpha samples of a diffuse texture and feeds
    /// render mode auto-detection; return nothing to skip sampling.
    pub fn scene_materials(
        &self,
        mut texture_alpha: impl FnMut(&Path) -> Vec<f32>,
    ) -> Vec<SceneMaterial> {
        self.model
            .materials()
            .iter()
            .map(|material| self.scene_material(material, &mut texture_alpha))
            .collect()
    }

    fn scene_material(
        &self,
        material: &ModelMaterial,
        texture_alpha: &mut impl FnMut(&Path) -> Vec<f32>,
    ) -> SceneMaterial {
        let textures = self.model.textures();
        let diffuse_texture = material
            .diffuse_texture_path(textures)
            .map(|path| self.resolve_path(path));
        let samples = diffuse_texture
            .as_deref()
            .map(|path| texture_alpha(path))
            .unwrap_or_default();
        let main_color = f128_to_vec4(material.diffuse_color);
        let render_mode = resolve_render_mode(material.directives(), main_color.w, &samples);

        let mut properties = MaterialProperties {
            main_color,
            main_texture: material.diffuse_texture_path(textures).map(str::to_owned),
            ..Default::default()
        };
        let mut renderer = RendererSettings {
            shadow_casting: if material.flags.casts_shadow() {
                ShadowCasting::On
            } else {
                ShadowCasting::Off
            },
            receive_shadows: true,
        };
        for directive in material.directives() {
            directive.execute_material(material, textures, &mut properties);
        }
        for directive in material.directives() {
            directive.execute_renderer(&mut renderer);
        }

        let first = material.first_triangle();
        let count = self.model.material_triangles(material).len();
        let mut name = material.name(self.language).to_owned();
        if name.is_empty() {
            name = format!("Material{}", material.index);
        }
        log::trace!(
            "Material \"{}\": {:?}, {} directive(s)",
            name,
            render_mode,
            material.directives().len()
        );
        SceneMaterial {
            index: material.index,
            name,
            render_mode,
            properties,
            renderer,
            triangles: first..first + count,
            diffuse_texture,
        }
    }
}
