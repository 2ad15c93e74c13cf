use std::{fmt, mem::size_of};

use thiserror::Error;

/// Failure kinds raised while reading a PMX byte stream.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Status {
    #[error("invalid signature, expected \"PMX \"")]
    BadSignature,
    #[error("unsupported text encoding {0}")]
    UnsupportedEncoding(u8),
    #[error("unsupported index width {0}, expected 1, 2 or 4")]
    UnsupportedIndexWidth(u8),
    #[error("unexpected end of input")]
    TruncatedInput,
    #[error("unknown deform kind {0}")]
    UnknownDeformKind(u8),
    #[error("face index count {0} is not divisible by 3")]
    MalformedFaceList(usize),
    #[error("unsupported morph type {0}")]
    UnsupportedMorphType(u8),
    #[error("negative element count {0}")]
    NegativeCount(i32),
    #[error("bone {0} is part of a parent cycle")]
    CyclicBoneGraph(usize),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Section {
    Header,
    ModelInfo,
    Vertex,
    Face,
    Texture,
    Material,
    Bone,
    Morph,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Header => "header",
            Section::ModelInfo => "model info",
            Section::Vertex => "vertex",
            Section::Face => "face",
            Section::Texture => "texture",
            Section::Material => "material",
            Section::Bone => "bone",
            Section::Morph => "morph",
        };
        f.write_str(name)
    }
}

/// Fatal decode failure, tagged with the section being read and the offset
/// of the record that failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("{status} in {section} section at offset {offset}")]
pub struct DecodeError {
    pub status: Status,
    pub section: Section,
    pub offset: usize,
}

impl DecodeError {
    pub fn new(status: Status, section: Section, offset: usize) -> Self {
        Self {
            status,
            section,
            offset,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub enum LanguageType {
    #[default]
    Japanese,
    English,
}

/// Text encoding declared by the header.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CodecType {
    Utf16,
    Utf8,
    Unknown(u8),
}

impl From<u8> for CodecType {
    fn from(value: u8) -> Self {
        match value {
            0 => CodecType::Utf16,
            1 => CodecType::Utf8,
            other => CodecType::Unknown(other),
        }
    }
}

impl CodecType {
    pub fn encoding(self) -> Result<&'static encoding_rs::Encoding, Status> {
        match self {
            CodecType::Utf16 => Ok(encoding_rs::UTF_16LE),
            CodecType::Utf8 => Ok(encoding_rs::UTF_8),
            CodecType::Unknown(value) => Err(Status::UnsupportedEncoding(value)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[repr(align(16))]
pub struct F128(pub [f32; 4]);

impl F128 {
    /// Scales the xyz components, leaving w untouched.
    pub fn scaled(self, factor: f32) -> F128 {
        let [x, y, z, w] = self.0;
        F128([x * factor, y * factor, z * factor, w])
    }
}

#[macro_export]
macro_rules! read_primitive {
    ($typ: ty, $read_typ:ident) => {
        pub fn $read_typ(&mut self) -> Result<$typ, Status> {
            let typ_len = size_of::<$typ>();
            let mut bytes = [0u8; size_of::<$typ>()];
            bytes.copy_from_slice(self.read_buffer(typ_len)?);
            Ok(<$typ>::from_le_bytes(bytes))
        }
    };
}

/// Most elements one count prefix may pre-allocate; longer lists grow as they
/// are read.
const MAX_RESERVED_ITEMS: usize = 1 << 12;

/// Forward-only cursor over an in-memory PMX stream. A failed single-primitive
/// read leaves the cursor where it was; strings, lists and vectors may have
/// consumed their prefix or leading components before failing.
pub struct Buffer {
    data: Vec<u8>,
    offset: usize,
}

impl Buffer {
    pub fn create(data: Vec<u8>) -> Buffer {
        Buffer { data, offset: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.offset)
    }

    pub fn can_read_len(&self, len: usize) -> bool {
        self.remaining() >= len
    }

    pub fn is_end(&self) -> bool {
        self.len() <= self.offset
    }

    pub fn skip(&mut self, skip: usize) -> Result<(), Status> {
        self.read_buffer(skip).map(|_| ())
    }

    pub fn read_byte(&mut self) -> Result<u8, Status> {
        if self.can_read_len(1) {
            let result = self.data[self.offset];
            self.offset += 1;
            Ok(result)
        } else {
            Err(Status::TruncatedInput)
        }
    }

    read_primitive!(u16, read_u16_little_endian);
    read_primitive!(i16, read_i16_little_endian);
    read_primitive!(u32, read_u32_little_endian);
    read_primitive!(i32, read_i32_little_endian);
    read_primitive!(f32, read_f32_little_endian);

    /// Reads a signed 32-bit element count.
    pub fn read_len(&mut self) -> Result<usize, Status> {
        let len = self.read_i32_little_endian()?;
        usize::try_from(len).map_err(|_| Status::NegativeCount(len))
    }

    pub fn read_f32_2_little_endian(&mut self) -> Result<F128, Status> {
        Ok(F128([
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            0.0f32,
            0.0f32,
        ]))
    }

    pub fn read_f32_3_little_endian(&mut self) -> Result<F128, Status> {
        Ok(F128([
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            0.0f32,
        ]))
    }

    pub fn read_f32_4_little_endian(&mut self) -> Result<F128, Status> {
        Ok(F128([
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
        ]))
    }

    /// Unsigned index of 1, 2 or 4 bytes. Used for vertex references.
    pub fn read_unsigned_index(&mut self, width: u8) -> Result<u32, Status> {
        match width {
            1 => Ok(self.read_byte()? as u32),
            2 => Ok(self.read_u16_little_endian()? as u32),
            4 => self.read_u32_little_endian(),
            _ => Err(Status::UnsupportedIndexWidth(width)),
        }
    }

    /// Signed index of 1, 2 or 4 bytes, where -1 means no reference.
    pub fn read_signed_index(&mut self, width: u8) -> Result<i32, Status> {
        match width {
            1 => Ok(self.read_byte()? as i8 as i32),
            2 => Ok(self.read_i16_little_endian()? as i32),
            4 => self.read_i32_little_endian(),
            _ => Err(Status::UnsupportedIndexWidth(width)),
        }
    }

    pub fn read_buffer(&mut self, len: usize) -> Result<&[u8], Status> {
        if self.can_read_len(len) {
            let result = &self.data[self.offset..self.offset + len];
            self.offset += len;
            Ok(result)
        } else {
            Err(Status::TruncatedInput)
        }
    }

    /// Reads a length-prefixed string. Invalid sequences are replaced rather
    /// than rejected.
    pub fn read_string(&mut self, codec: CodecType) -> Result<String, Status> {
        let encoding = codec.encoding()?;
        let len = self.read_len()?;
        let src = self.read_buffer(len)?;
        let (cow, had_errors) = encoding.decode_without_bom_handling(src);
        if had_errors {
            log::warn!(
                "Replaced invalid {} sequence in {} byte string",
                encoding.name(),
                len
            );
        }
        Ok(cow.into_owned())
    }

    /// Capacity to reserve for `count` records of at least `record_size` bytes,
    /// bounded by what the remaining bytes can hold.
    pub fn capacity_hint(&self, count: usize, record_size: usize) -> usize {
        count
            .min(self.remaining() / record_size.max(1))
            .min(MAX_RESERVED_ITEMS)
    }

    /// Reads a count-prefixed list, applying `read` once per element.
    pub fn read_list<T>(
        &mut self,
        mut read: impl FnMut(&mut Buffer) -> Result<T, Status>,
    ) -> Result<Vec<T>, Status> {
        let count = self.read_len()?;
        let mut items = Vec::with_capacity(self.capacity_hint(count, 1));
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}

#[test]
fn test_from_le_to_u16() {
    let data: [u8; 2] = [20, 16];
    assert_eq!(2, size_of::<u16>());
    assert_eq!(
        ((data[1] as u16) << 8) | data[0] as u16,
        u16::from_le_bytes(data)
    );
}

#[test]
fn test_buffer_read_primitive() {
    let mut buffer = Buffer::create(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert_eq!(Ok(1), buffer.read_byte());
    assert_eq!(Ok((3 << 8) | 2), buffer.read_u16_little_endian());
    assert_eq!(Ok(0x0706_0504), buffer.read_i32_little_endian());
    assert_eq!(7, buffer.offset());
    assert_eq!(Err(Status::TruncatedInput), buffer.read_u32_little_endian());
    assert_eq!(7, buffer.offset());
}

#[test]
fn test_buffer_read_len_negative() {
    let mut buffer = Buffer::create((-2i32).to_le_bytes().to_vec());
    assert_eq!(Err(Status::NegativeCount(-2)), buffer.read_len());
}

#[test]
fn test_read_list_huge_count_is_truncated() {
    let mut data = i32::MAX.to_le_bytes().to_vec();
    data.extend_from_slice(&[0u8; 64]);
    let mut buffer = Buffer::create(data);
    assert_eq!(
        Err(Status::TruncatedInput),
        buffer.read_list(|buffer| buffer.read_f32_4_little_endian())
    );
}

#[test]
fn test_capacity_hint() {
    let buffer = Buffer::create(vec![0u8; 100]);
    assert_eq!(10, buffer.capacity_hint(10, 4));
    assert_eq!(25, buffer.capacity_hint(usize::MAX, 4));
    assert_eq!(100, buffer.capacity_hint(usize::MAX, 0));
    let large = Buffer::create(vec![0u8; 1 << 16]);
    assert_eq!(MAX_RESERVED_ITEMS, large.capacity_hint(usize::MAX, 1));
}

#[test]
fn test_index_round_trip_all_widths() {
    for width in [1u8, 2, 4] {
        let bits = 8 * width as u32;
        let unsigned_max = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let signed_min = i32::MIN >> (32 - bits);
        let signed_max = i32::MAX >> (32 - bits);
        for value in [0u32, 1, unsigned_max / 2, unsigned_max] {
            let bytes = value.to_le_bytes()[..width as usize].to_vec();
            let mut buffer = Buffer::create(bytes);
            assert_eq!(Ok(value), buffer.read_unsigned_index(width));
            assert!(buffer.is_end());
        }
        for value in [signed_min, -1, 0, 1, signed_max] {
            let bytes = value.to_le_bytes()[..width as usize].to_vec();
            let mut buffer = Buffer::create(bytes);
            assert_eq!(Ok(value), buffer.read_signed_index(width));
            assert!(buffer.is_end());
        }
    }
}

#[test]
fn test_vertex_index_never_negative() {
    for width in [1u8, 2, 4] {
        let mut buffer = Buffer::create(vec![0xff; width as usize]);
        let value = buffer.read_unsigned_index(width).unwrap();
        assert!(value > 0);
        let mut buffer = Buffer::create(vec![0xff; width as usize]);
        assert_eq!(Ok(-1), buffer.read_signed_index(width));
    }
}

#[test]
fn test_index_width_three_rejected() {
    let mut buffer = Buffer::create(vec![0; 8]);
    assert_eq!(
        Err(Status::UnsupportedIndexWidth(3)),
        buffer.read_signed_index(3)
    );
    assert_eq!(
        Err(Status::UnsupportedIndexWidth(3)),
        buffer.read_unsigned_index(3)
    );
    assert_eq!(0, buffer.offset());
}

#[test]
fn test_read_string_utf8_and_utf16() {
    let mut data = 3i32.to_le_bytes().to_vec();
    data.extend_from_slice(b"abc");
    data.extend_from_slice(&4i32.to_le_bytes());
    data.extend_from_slice(&[0x42, 0x30, 0x44, 0x30]);
    let mut buffer = Buffer::create(data);
    assert_eq!(Ok("abc".to_owned()), buffer.read_string(CodecType::Utf8));
    assert_eq!(
        Ok("\u{3042}\u{3044}".to_owned()),
        buffer.read_string(CodecType::Utf16)
    );
}

#[test]
fn test_read_string_unknown_encoding_consumes_nothing() {
    let mut buffer = Buffer::create(vec![1, 0, 0, 0, b'a']);
    assert_eq!(
        Err(Status::UnsupportedEncoding(2)),
        buffer.read_string(CodecType::from(2))
    );
    assert_eq!(0, buffer.offset());
}

#[test]
fn test_read_string_lossy() {
    let mut buffer = Buffer::create(vec![2, 0, 0, 0, b'a', 0xff]);
    assert_eq!(
        Ok("a\u{fffd}".to_owned()),
        buffer.read_string(CodecType::Utf8)
    );
}
