mod error;
mod importer;
pub mod render;
pub mod report;
pub mod skeleton;
pub mod texture;
mod utils;

pub use error::{ImportError, TextureError};
pub use importer::{
    import_bytes, import_file, DirectiveWarning, ImportOptions, ImportedModel, SceneMaterial,
};
pub use render::{ExecuteDirective, MaterialProperties, RenderMaterial, Renderer, RendererSettings};
pub use report::{ModelReport, ReportSections};
pub use skeleton::{Skeleton, SkeletonBone};
pub use utils::canonicalize_texture_path;
