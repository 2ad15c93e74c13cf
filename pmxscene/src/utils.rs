use cgmath::{Vector3, Vector4};
use pmxread::F128;

pub fn f128_to_vec3(v: F128) -> Vector3<f32> {
    Vector3::new(v.0[0], v.0[1], v.0[2])
}

pub fn f128_to_vec4(v: F128) -> Vector4<f32> {
    Vector4::new(v.0[0], v.0[1], v.0[2], v.0[3])
}

/// PMX stores texture paths with Windows separators.
pub fn canonicalize_texture_path(path: &str) -> String {
    path.replace('\\', "/")
}

#[test]
fn test_f128_conversion() {
    let v = F128([1.0, 2.0, 3.0, 4.0]);
    assert_eq!(Vector3::new(1.0, 2.0, 3.0), f128_to_vec3(v));
    assert_eq!(Vector4::new(1.0, 2.0, 3.0, 4.0), f128_to_vec4(v));
}

#[test]
fn test_canonicalize_texture_path() {
    assert_eq!("tex/body.png", canonicalize_texture_path("tex\\body.png"));
}
