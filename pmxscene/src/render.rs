use std::collections::{BTreeMap, BTreeSet};

use cgmath::Vector4;
use pmxread::{
    directive::{CopySource, PropertyValue, RenderMode, ShadowCasting, ShadowSetting},
    model::{ModelMaterial, ModelTexture, SphereBlendMode, Toon},
    Directive,
};

use crate::utils::f128_to_vec4;

/// Render material a directive writes to.
pub trait RenderMaterial {
    fn set_int(&mut self, name: &str, value: i32);
    fn set_float(&mut self, name: &str, value: f32);
    fn set_color(&mut self, name: &str, value: Vector4<f32>);
    fn set_texture(&mut self, name: &str, path: &str);
    fn enable_keyword(&mut self, keyword: &str);
    fn disable_keyword(&mut self, keyword: &str);
    fn set_render_queue(&mut self, queue: i32);
    fn main_color(&self) -> Vector4<f32>;
    fn set_main_color(&mut self, color: Vector4<f32>);
}

/// Per-mesh renderer state a directive writes to.
pub trait Renderer {
    fn set_shadow_casting(&mut self, mode: ShadowCasting);
    fn set_receive_shadows(&mut self, receive: bool);
}

pub trait ExecuteDirective {
    /// Applies a material-level directive. Shadow and render mode directives
    /// are ignored here.
    fn execute_material<M: RenderMaterial + ?Sized>(
        &self,
        source: &ModelMaterial,
        textures: &[ModelTexture],
        target: &mut M,
    );

    /// Applies a renderer-level directive; only shadow settings apply.
    fn execute_renderer<R: Renderer + ?Sized>(&self, target: &mut R);
}

impl ExecuteDirective for Directive {
    fn execute_material<M: RenderMaterial + ?Sized>(
        &self,
        source: &ModelMaterial,
        textures: &[ModelTexture],
        target: &mut M,
    ) {
        match self {
            Directive::SetValue { name, value } => match value {
                PropertyValue::Int(value) => target.set_int(name, *value),
                PropertyValue::Float(value) => target.set_float(name, *value),
                PropertyValue::Color(value) => target.set_color(name, Vector4::from(*value)),
                PropertyValue::Texture(path) => target.set_texture(name, path),
                PropertyValue::Keyword(Some(alpha)) if name.eq_ignore_ascii_case("opacity") => {
                    let mut color = target.main_color();
                    color.w = *alpha;
                    target.set_main_color(color);
                }
                PropertyValue::Keyword(_) => {}
            },
            Directive::CopyValue {
                source: keyword,
                destination,
            } => copy_value(*keyword, source, textures, destination, target),
            Directive::Keyword { name, enable } => {
                if *enable {
                    target.enable_keyword(name)
                } else {
                    target.disable_keyword(name)
                }
            }
            Directive::Queue(queue) => target.set_render_queue(*queue),
            Directive::ShadowMode(_) | Directive::RenderMode { .. } => {}
        }
    }

    fn execute_renderer<R: Renderer + ?Sized>(&self, target: &mut R) {
        match self {
            Directive::ShadowMode(ShadowSetting::Cast(mode)) => target.set_shadow_casting(*mode),
            Directive::ShadowMode(ShadowSetting::Receive(receive)) => {
                target.set_receive_shadows(*receive)
            }
            _ => {}
        }
    }
}

fn copy_value<M: RenderMaterial + ?Sized>(
    keyword: CopySource,
    source: &ModelMaterial,
    textures: &[ModelTexture],
    destination: &str,
    target: &mut M,
) {
    match keyword {
        CopySource::Diffuse => target.set_color(destination, f128_to_vec4(source.diffuse_color)),
        CopySource::Ambient | CopySource::Emissive => {
            target.set_color(destination, opaque_rgb(source.ambient_color.0))
        }
        CopySource::Specular => target.set_color(destination, opaque_rgb(source.specular_color.0)),
        CopySource::Smoothness | CopySource::Exponent => {
            target.set_float(destination, source.specular_power)
        }
        CopySource::Roughness => target.set_float(destination, 1.0f32 - source.specular_power),
        CopySource::Edge => target.set_color(destination, f128_to_vec4(source.edge_color)),
        CopySource::EdgeSize => target.set_float(destination, source.edge_size),
        CopySource::DiffuseTexture => {
            if let Some(path) = source.diffuse_texture_path(textures) {
                target.set_texture(destination, path)
            }
        }
        CopySource::SphereTexture => {
            if let Some(path) = source.sphere_texture_path(textures) {
                target.set_texture(destination, path)
            }
        }
        CopySource::SphereBlend => {
            target.set_int(destination, sphere_blend_value(source))
        }
        CopySource::ToonIndex => {
            if let Toon::Internal(index) = source.toon(textures) {
                target.set_int(destination, index as i32)
            }
        }
        CopySource::ToonTexture => {
            if let Toon::Texture(Some(path)) = source.toon(textures) {
                target.set_texture(destination, path)
            }
        }
    }
}

fn opaque_rgb(rgb: [f32; 4]) -> Vector4<f32> {
    Vector4::new(rgb[0], rgb[1], rgb[2], 1.0f32)
}

fn sphere_blend_value(source: &ModelMaterial) -> i32 {
    match source.sphere_map_texture_type {
        SphereBlendMode::Disabled => 0,
        SphereBlendMode::Multiply => 1,
        SphereBlendMode::Add => 2,
        SphereBlendMode::SubTexture => 3,
        SphereBlendMode::Unknown(value) => value as i32,
    }
}

/// Picks the render mode before the material is built. The last render mode
/// directive wins; with auto-detection the mode falls back to opaque unless
/// the diffuse alpha or one of the texture alpha samples is below the
/// threshold.
pub fn resolve_render_mode(
    directives: &[Directive],
    diffuse_alpha: f32,
    texture_alpha: &[f32],
) -> RenderMode {
    let mut resolved = RenderMode::Opaque;
    for directive in directives {
        if let Directive::RenderMode {
            mode,
            auto_detect,
            threshold,
        } = directive
        {
            resolved = *mode;
            if *auto_detect && !is_transparent(diffuse_alpha, texture_alpha, *threshold) {
                resolved = RenderMode::Opaque;
            }
        }
    }
    resolved
}

pub fn is_transparent(diffuse_alpha: f32, texture_alpha: &[f32], threshold: f32) -> bool {
    diffuse_alpha < threshold || texture_alpha.iter().any(|alpha| *alpha < threshold)
}

/// Property bag implementation of [`RenderMaterial`].
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperties {
    pub main_color: Vector4<f32>,
    pub main_texture: Option<String>,
    pub ints: BTreeMap<String, i32>,
    pub floats: BTreeMap<String, f32>,
    pub colors: BTreeMap<String, Vector4<f32>>,
    pub textures: BTreeMap<String, String>,
    pub keywords: BTreeSet<String>,
    pub render_queue: Option<i32>,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            main_color: Vector4::new(1.0f32, 1.0f32, 1.0f32, 1.0f32),
            main_texture: None,
            ints: BTreeMap::new(),
            floats: BTreeMap::new(),
            colors: BTreeMap::new(),
            textures: BTreeMap::new(),
            keywords: BTreeSet::new(),
            render_queue: None,
        }
    }
}

impl RenderMaterial for MaterialProperties {
    fn set_int(&mut self, name: &str, value: i32) {
        self.ints.insert(name.to_owned(), value);
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.floats.insert(name.to_owned(), value);
    }

    fn set_color(&mut self, name: &str, value: Vector4<f32>) {
        self.colors.insert(name.to_owned(), value);
    }

    fn set_texture(&mut self, name: &str, path: &str) {
        self.textures.insert(name.to_owned(), path.to_owned());
    }

    fn enable_keyword(&mut self, keyword: &str) {
        self.keywords.insert(keyword.to_owned());
    }

    fn disable_keyword(&mut self, keyword: &str) {
        self.keywords.remove(keyword);
    }

    fn set_render_queue(&mut self, queue: i32) {
        self.render_queue = Some(queue);
    }

    fn main_color(&self) -> Vector4<f32> {
        self.main_color
    }

    fn set_main_color(&mut self, color: Vector4<f32>) {
        self.main_color = color;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererSettings {
    pub shadow_casting: ShadowCasting,
    pub receive_shadows: bool,
}

impl Renderer for RendererSettings {
    fn set_shadow_casting(&mut self, mode: ShadowCasting) {
        self.shadow_casting = mode;
    }

    fn set_receive_shadows(&mut self, receive: bool) {
        self.receive_shadows = receive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_mode(mode: RenderMode, auto_detect: bool, threshold: f32) -> Directive {
        Directive::RenderMode {
            mode,
            auto_detect,
            threshold,
        }
    }

    #[test]
    fn test_resolve_render_mode_defaults_to_opaque() {
        assert_eq!(RenderMode::Opaque, resolve_render_mode(&[], 0.0, &[]));
        assert_eq!(
            RenderMode::Opaque,
            resolve_render_mode(&[Directive::Queue(1)], 0.5, &[])
        );
    }

    #[test]
    fn test_resolve_render_mode_last_wins() {
        let directives = [
            render_mode(RenderMode::Fade, false, 1.0),
            render_mode(RenderMode::Transparent, false, 1.0),
        ];
        assert_eq!(
            RenderMode::Transparent,
            resolve_render_mode(&directives, 1.0, &[])
        );
    }

    #[test]
    fn test_resolve_render_mode_auto_detect() {
        let directives = [render_mode(RenderMode::Cutout, true, 0.5)];
        assert_eq!(RenderMode::Opaque, resolve_render_mode(&directives, 1.0, &[1.0, 0.5]));
        assert_eq!(RenderMode::Cutout, resolve_render_mode(&directives, 0.4, &[]));
        assert_eq!(RenderMode::Cutout, resolve_render_mode(&directives, 1.0, &[1.0, 0.25]));
    }

    #[test]
    fn test_renderer_directives() {
        let mut settings = RendererSettings {
            shadow_casting: ShadowCasting::On,
            receive_shadows: true,
        };
        Directive::ShadowMode(ShadowSetting::Cast(ShadowCasting::ShadowsOnly))
            .execute_renderer(&mut settings);
        Directive::ShadowMode(ShadowSetting::Receive(false)).execute_renderer(&mut settings);
        Directive::Queue(5).execute_renderer(&mut settings);
        assert_eq!(ShadowCasting::ShadowsOnly, settings.shadow_casting);
        assert!(!settings.receive_shadows);
    }

    #[test]
    fn test_material_properties_keywords() {
        let mut properties = MaterialProperties::default();
        properties.enable_keyword("_A");
        properties.enable_keyword("_B");
        properties.disable_keyword("_A");
        assert!(properties.keywords.contains("_B"));
        assert!(!properties.keywords.contains("_A"));
    }
}
