use crate::common::LanguageType;

pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_le_bytes([a, b, c, d])
}

/// Returns the name in the preferred language, or the other one when the
/// preferred name is empty.
pub fn pick_name<'a>(language: LanguageType, name_ja: &'a str, name_en: &'a str) -> &'a str {
    let (first, second) = match language {
        LanguageType::Japanese => (name_ja, name_en),
        LanguageType::English => (name_en, name_ja),
    };
    if first.is_empty() {
        second
    } else {
        first
    }
}

#[test]
fn test_fourcc() {
    assert_eq!(1u32, fourcc(1u8, 0u8, 0u8, 0u8));
    assert_eq!(
        u32::from_le_bytes(*b"PMX "),
        fourcc(b'P', b'M', b'X', b' ')
    );
}

#[test]
fn test_pick_name_falls_back() {
    assert_eq!("ja", pick_name(LanguageType::Japanese, "ja", "en"));
    assert_eq!("en", pick_name(LanguageType::English, "ja", "en"));
    assert_eq!("ja", pick_name(LanguageType::English, "ja", ""));
    assert_eq!("en", pick_name(LanguageType::Japanese, "", "en"));
}
