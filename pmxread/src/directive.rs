//! Material note directives.
//!
//! A note may embed a block of bracketed instructions that tweak the render
//! material derived from the PMX material:
//!
//! ```text
//! [begin][set float _Glossiness 0.5][shadow cast doubleauto][end]
//! ```
//!
//! The block starts at the first `[begin]` (case-insensitive) and runs until
//! `[end]` or the end of the note. A note without `[begin]` has no directives.

use std::str::FromStr;

use thiserror::Error;

use crate::model::MaterialFlags;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("unbalanced brackets in \"[{0}]\"")]
    UnbalancedBrackets(String),
    #[error("unknown directive \"{0}\"")]
    UnknownDirective(String),
    #[error("unknown copy keyword \"{0}\"")]
    UnknownDirectiveKeyword(String),
    #[error("\"{directive}\" expects at least {expected} arguments, got {got}")]
    DirectiveArityMismatch {
        directive: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid argument \"{argument}\" for \"{directive}\"")]
    InvalidDirectiveArgument { directive: String, argument: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Int,
    Float,
    Color,
    Texture,
    Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    /// RGBA; alpha defaults to 1 when omitted.
    Color([f32; 4]),
    Texture(String),
    Keyword(Option<f32>),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Color(_) => PropertyType::Color,
            PropertyValue::Texture(_) => PropertyType::Texture,
            PropertyValue::Keyword(_) => PropertyType::Keyword,
        }
    }
}

/// Material attribute that `copy` reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopySource {
    Diffuse,
    Ambient,
    Emissive,
    Specular,
    Smoothness,
    Exponent,
    Roughness,
    Edge,
    EdgeSize,
    DiffuseTexture,
    SphereTexture,
    SphereBlend,
    ToonIndex,
    ToonTexture,
}

impl CopySource {
    pub fn from_keyword(keyword: &str) -> Option<CopySource> {
        Some(match keyword.to_ascii_lowercase().as_str() {
            "diffuse" => CopySource::Diffuse,
            "ambient" => CopySource::Ambient,
            "emissive" => CopySource::Emissive,
            "specular" => CopySource::Specular,
            "smoothness" => CopySource::Smoothness,
            "exponent" => CopySource::Exponent,
            "roughness" => CopySource::Roughness,
            "edge" => CopySource::Edge,
            "edgesize" => CopySource::EdgeSize,
            "diffusepath" | "diffusetex" => CopySource::DiffuseTexture,
            "spherepath" | "spheretex" => CopySource::SphereTexture,
            "sphereblend" => CopySource::SphereBlend,
            "toonindex" => CopySource::ToonIndex,
            "toonpath" | "toontex" => CopySource::ToonTexture,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowCasting {
    Off,
    On,
    TwoSided,
    ShadowsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowSetting {
    Cast(ShadowCasting),
    Receive(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Opaque,
    Cutout,
    Fade,
    Transparent,
}

/// One parsed instruction. Directives are data; applying them is up to the
/// render adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    SetValue {
        name: String,
        value: PropertyValue,
    },
    CopyValue {
        source: CopySource,
        destination: String,
    },
    Keyword {
        name: String,
        enable: bool,
    },
    ShadowMode(ShadowSetting),
    Queue(i32),
    RenderMode {
        mode: RenderMode,
        auto_detect: bool,
        threshold: f32,
    },
}

const BEGIN_TOKEN: &str = "[begin]";

/// Names that are accepted. `rename`, `delete` and `visible` produce no
/// directive.
const DIRECTIVE_NAMES: [&str; 9] = [
    "set",
    "copy",
    "keyword",
    "shadow",
    "queue",
    "rendermode",
    "rename",
    "delete",
    "visible",
];

struct Token<'a> {
    name: String,
    args: Vec<&'a str>,
}

/// Parses the directive block of a material note. Either every directive in
/// the block parses, or none are returned.
pub fn parse_directives(note: &str, flags: MaterialFlags) -> Result<Vec<Directive>, DirectiveError> {
    let block = match note.to_ascii_lowercase().find(BEGIN_TOKEN) {
        Some(position) => &note[position + BEGIN_TOKEN.len()..],
        None => return Ok(vec![]),
    };
    let tokens = scan_tokens(block)?;
    let mut directives = Vec::with_capacity(tokens.len());
    for token in &tokens {
        if let Some(directive) = parse_token(token, flags)? {
            directives.push(directive);
        }
    }
    Ok(directives)
}

/// Collects `[...]` tokens up to `[end]`, checking bracket balance and names
/// before any arguments are looked at. A token never spans a line break.
fn scan_tokens(block: &str) -> Result<Vec<Token<'_>>, DirectiveError> {
    let mut tokens = vec![];
    let mut rest = block;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = match after.find(|c: char| c == ']' || c == '\n') {
            Some(close) => close,
            None => break,
        };
        if !after[close..].starts_with(']') {
            rest = after;
            continue;
        }
        let content = &after[..close];
        rest = &after[close + 1..];
        if content.trim().eq_ignore_ascii_case("end") {
            break;
        }
        if content.contains('[') {
            return Err(DirectiveError::UnbalancedBrackets(content.to_owned()));
        }
        let mut parts = content.split_whitespace();
        let raw_name = parts.next().unwrap_or_default();
        let name = raw_name.to_ascii_lowercase();
        if !DIRECTIVE_NAMES.contains(&name.as_str()) {
            return Err(DirectiveError::UnknownDirective(raw_name.to_owned()));
        }
        tokens.push(Token {
            name,
            args: parts.collect(),
        });
    }
    Ok(tokens)
}

fn parse_token(token: &Token, flags: MaterialFlags) -> Result<Option<Directive>, DirectiveError> {
    let args = token.args.as_slice();
    let directive = match token.name.as_str() {
        "set" => parse_set(args)?,
        "copy" => {
            require("copy", args, 2)?;
            Directive::CopyValue {
                source: CopySource::from_keyword(args[0])
                    .ok_or_else(|| DirectiveError::UnknownDirectiveKeyword(args[0].to_owned()))?,
                destination: args[1].to_owned(),
            }
        }
        "keyword" => {
            require("keyword", args, 2)?;
            let action = args[0].to_ascii_lowercase();
            Directive::Keyword {
                name: args[1].to_owned(),
                enable: action == "enable" || action == "on",
            }
        }
        "shadow" => parse_shadow(args, flags)?,
        "queue" => {
            require("queue", args, 1)?;
            Directive::Queue(parse_number("queue", args[0])?)
        }
        "rendermode" => parse_render_mode(args)?,
        _ => return Ok(None),
    };
    Ok(Some(directive))
}

fn parse_set(args: &[&str]) -> Result<Directive, DirectiveError> {
    require("set", args, 2)?;
    let values = &args[2..];
    let value = match args[0].to_ascii_lowercase().as_str() {
        "int" => {
            require("set", args, 3)?;
            PropertyValue::Int(parse_number("set", values[0])?)
        }
        "float" => {
            require("set", args, 3)?;
            PropertyValue::Float(parse_number("set", values[0])?)
        }
        "color" => {
            require("set", args, 5)?;
            let alpha = match values.get(3) {
                Some(alpha) => parse_number("set", alpha)?,
                None => 1.0f32,
            };
            PropertyValue::Color([
                parse_number("set", values[0])?,
                parse_number("set", values[1])?,
                parse_number("set", values[2])?,
                alpha,
            ])
        }
        "texture" => {
            require("set", args, 3)?;
            PropertyValue::Texture(values.join(" "))
        }
        "keyword" => PropertyValue::Keyword(match values.first() {
            Some(value) => Some(parse_number("set", value)?),
            None => None,
        }),
        _ => return Err(invalid("set", args[0])),
    };
    Ok(Directive::SetValue {
        name: args[1].to_owned(),
        value,
    })
}

fn parse_shadow(args: &[&str], flags: MaterialFlags) -> Result<Directive, DirectiveError> {
    require("shadow", args, 2)?;
    let mode = args[1].to_ascii_lowercase();
    let setting = match args[0].to_ascii_lowercase().as_str() {
        "cast" => ShadowSetting::Cast(match mode.as_str() {
            "off" => ShadowCasting::Off,
            "on" => ShadowCasting::On,
            "double" => ShadowCasting::TwoSided,
            "doubleauto" if flags.contains(MaterialFlags::CAST_SHADOW) => ShadowCasting::TwoSided,
            "doubleauto" => ShadowCasting::Off,
            "shadowonly" => ShadowCasting::ShadowsOnly,
            _ => return Err(invalid("shadow", args[1])),
        }),
        "receive" => ShadowSetting::Receive(match mode.as_str() {
            "on" => true,
            "off" => false,
            _ => return Err(invalid("shadow", args[1])),
        }),
        _ => return Err(invalid("shadow", args[0])),
    };
    Ok(Directive::ShadowMode(setting))
}

fn parse_render_mode(args: &[&str]) -> Result<Directive, DirectiveError> {
    require("rendermode", args, 1)?;
    let mode = match args[0].to_ascii_lowercase().as_str() {
        "opaque" => RenderMode::Opaque,
        "cutout" => RenderMode::Cutout,
        "fade" => RenderMode::Fade,
        "transparent" => RenderMode::Transparent,
        _ => return Err(invalid("rendermode", args[0])),
    };
    let options = &args[1..];
    let auto_detect = options.iter().any(|arg| arg.eq_ignore_ascii_case("auto"));
    if auto_detect && mode == RenderMode::Opaque {
        return Err(invalid("rendermode", "auto"));
    }
    let threshold = options
        .iter()
        .find_map(|arg| arg.parse::<f32>().ok())
        .unwrap_or(1.0f32);
    Ok(Directive::RenderMode {
        mode,
        auto_detect,
        threshold,
    })
}

fn require(directive: &str, args: &[&str], expected: usize) -> Result<(), DirectiveError> {
    if args.len() < expected {
        Err(DirectiveError::DirectiveArityMismatch {
            directive: directive.to_owned(),
            expected,
            got: args.len(),
        })
    } else {
        Ok(())
    }
}

fn parse_number<T: FromStr>(directive: &str, argument: &str) -> Result<T, DirectiveError> {
    argument.parse().map_err(|_| invalid(directive, argument))
}

fn invalid(directive: &str, argument: &str) -> DirectiveError {
    DirectiveError::InvalidDirectiveArgument {
        directive: directive.to_owned(),
        argument: argument.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(note: &str) -> Result<Vec<Directive>, DirectiveError> {
        parse_directives(note, MaterialFlags::empty())
    }

    #[test]
    fn test_single_float() {
        assert_eq!(
            Ok(vec![Directive::SetValue {
                name: "_Glossiness".to_owned(),
                value: PropertyValue::Float(0.5),
            }]),
            parse("[begin][set float _Glossiness 0.5][end]")
        );
    }

    #[test]
    fn test_unknown_directive_discards_all() {
        assert_eq!(
            Err(DirectiveError::UnknownDirective("unknown".to_owned())),
            parse("[begin][set float x][unknown][end]")
        );
    }

    #[test]
    fn test_without_begin_is_empty() {
        assert_eq!(Ok(vec![]), parse("just a comment [set float x 1]"));
        assert_eq!(Ok(vec![]), parse(""));
    }

    #[test]
    fn test_begin_is_case_insensitive_and_end_stops() {
        assert_eq!(
            Ok(vec![Directive::Queue(2450)]),
            parse("note text\n[BEGIN][queue 2450][End][bogus]")
        );
    }

    #[test]
    fn test_missing_end_runs_to_text_end() {
        assert_eq!(
            Ok(vec![Directive::Queue(1), Directive::Queue(2)]),
            parse("[begin][queue 1]\n[queue 2]")
        );
    }

    #[test]
    fn test_token_does_not_span_lines() {
        assert_eq!(Ok(vec![Directive::Queue(5)]), parse("[begin][queue\n[queue 5]"));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert_eq!(
            Err(DirectiveError::UnbalancedBrackets("[set float x 1".to_owned())),
            parse("[begin][[set float x 1][end]")
        );
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            Err(DirectiveError::DirectiveArityMismatch {
                directive: "set".to_owned(),
                expected: 3,
                got: 2,
            }),
            parse("[begin][set float x][end]")
        );
        assert_eq!(
            Err(DirectiveError::DirectiveArityMismatch {
                directive: "queue".to_owned(),
                expected: 1,
                got: 0,
            }),
            parse("[begin][queue][end]")
        );
    }

    #[test]
    fn test_set_values() {
        let directives = parse(
            "[begin][set int _Mode 2][set color _Color 1 0.5 0][set color _Tint 1 1 1 0.25]\
             [set texture _MainTex tex/with space.png][set keyword opacity 0.5][set keyword _FLAG][end]",
        )
        .unwrap();
        let values = directives
            .into_iter()
            .map(|directive| match directive {
                Directive::SetValue { value, .. } => value,
                other => panic!("unexpected {:?}", other),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                PropertyValue::Int(2),
                PropertyValue::Color([1.0, 0.5, 0.0, 1.0]),
                PropertyValue::Color([1.0, 1.0, 1.0, 0.25]),
                PropertyValue::Texture("tex/with space.png".to_owned()),
                PropertyValue::Keyword(Some(0.5)),
                PropertyValue::Keyword(None),
            ],
            values
        );
    }

    #[test]
    fn test_invalid_set_arguments() {
        assert_eq!(
            Err(invalid("set", "abc")),
            parse("[begin][set int _Mode abc][end]")
        );
        assert_eq!(
            Err(invalid("set", "vector")),
            parse("[begin][set vector _V 1][end]")
        );
    }

    #[test]
    fn test_copy_keywords() {
        assert_eq!(
            Ok(vec![
                Directive::CopyValue {
                    source: CopySource::Diffuse,
                    destination: "_Color".to_owned(),
                },
                Directive::CopyValue {
                    source: CopySource::ToonTexture,
                    destination: "_ToonTex".to_owned(),
                },
            ]),
            parse("[begin][copy diffuse _Color][copy toonpath _ToonTex][end]")
        );
        assert_eq!(
            Err(DirectiveError::UnknownDirectiveKeyword("glow".to_owned())),
            parse("[begin][copy glow _Color][end]")
        );
    }

    #[test]
    fn test_keyword_and_noops() {
        assert_eq!(
            Ok(vec![
                Directive::Keyword {
                    name: "_EMISSION".to_owned(),
                    enable: true,
                },
                Directive::Keyword {
                    name: "_ALPHATEST_ON".to_owned(),
                    enable: false,
                },
            ]),
            parse("[begin][keyword on _EMISSION][rename x][delete][visible off][keyword disable _ALPHATEST_ON][end]")
        );
    }

    #[test]
    fn test_shadow_double_auto_uses_flags() {
        let note = "[begin][shadow cast doubleauto][shadow receive off][end]";
        assert_eq!(
            Ok(vec![
                Directive::ShadowMode(ShadowSetting::Cast(ShadowCasting::TwoSided)),
                Directive::ShadowMode(ShadowSetting::Receive(false)),
            ]),
            parse_directives(note, MaterialFlags::CAST_SHADOW)
        );
        assert_eq!(
            Ok(vec![
                Directive::ShadowMode(ShadowSetting::Cast(ShadowCasting::Off)),
                Directive::ShadowMode(ShadowSetting::Receive(false)),
            ]),
            parse_directives(note, MaterialFlags::TWO_SIDED)
        );
        assert_eq!(
            Err(invalid("shadow", "sometimes")),
            parse("[begin][shadow cast sometimes][end]")
        );
    }

    #[test]
    fn test_render_mode() {
        assert_eq!(
            Ok(vec![
                Directive::RenderMode {
                    mode: RenderMode::Cutout,
                    auto_detect: true,
                    threshold: 0.5,
                },
                Directive::RenderMode {
                    mode: RenderMode::Fade,
                    auto_detect: false,
                    threshold: 1.0,
                },
            ]),
            parse("[begin][rendermode cutout auto 0.5][rendermode fade][end]")
        );
        assert_eq!(
            Err(invalid("rendermode", "auto")),
            parse("[begin][rendermode opaque auto][end]")
        );
        assert_eq!(
            Err(invalid("rendermode", "glass")),
            parse("[begin][rendermode glass][end]")
        );
    }
}
