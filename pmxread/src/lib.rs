pub mod bone;
pub mod common;
pub mod directive;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
pub mod hierarchy;
pub mod model;
pub mod morph;
pub mod utils;

pub use common::{Buffer, CodecType, DecodeError, LanguageType, Section, Status, F128};
pub use directive::{Directive, DirectiveError};
pub use model::Model;
