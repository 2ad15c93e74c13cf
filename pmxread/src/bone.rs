use bitflags::bitflags;

use crate::{
    common::{Buffer, LanguageType, Status, F128},
    model::{Globals, IndexKind},
    utils::pick_name,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct BoneFlags: u16 {
        const TAIL_IS_INDEX = 0x0001;
        const ROTATABLE = 0x0002;
        const MOVABLE = 0x0004;
        const VISIBLE = 0x0008;
        const ENABLED = 0x0010;
        const IK = 0x0020;
        const LOCAL_INHERIT = 0x0080;
        const INHERIT_ROTATION = 0x0100;
        const INHERIT_TRANSLATION = 0x0200;
        const FIXED_AXIS = 0x0400;
        const LOCAL_AXES = 0x0800;
        const TRANSFORM_AFTER_PHYSICS = 0x1000;
        const EXTERNAL_PARENT = 0x2000;
    }
}

/// Where the bone points: another bone, or an offset from its own origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoneTail {
    Bone(i32),
    Position(F128),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBoneInherent {
    pub parent_index: i32,
    pub coefficient: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBoneLocalAxes {
    pub x: F128,
    pub z: F128,
}

/// Euler angle bounds of an IK link, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleLimit {
    pub lower: F128,
    pub upper: F128,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConstraintJoint {
    pub bone_index: i32,
    pub angle_limit: Option<AngleLimit>,
}

impl ModelConstraintJoint {
    fn parse_pmx(globals: &Globals, buffer: &mut Buffer) -> Result<ModelConstraintJoint, Status> {
        let bone_index = globals.read_index(buffer, IndexKind::Bone)?;
        let angle_limit = if buffer.read_byte()? != 0 {
            Some(AngleLimit {
                lower: buffer.read_f32_3_little_endian()?,
                upper: buffer.read_f32_3_little_endian()?,
            })
        } else {
            None
        };
        Ok(ModelConstraintJoint {
            bone_index,
            angle_limit,
        })
    }
}

/// IK block of a bone: the bone it drives toward, and the chain solved to
/// get there.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConstraint {
    pub target_bone_index: i32,
    pub num_iterations: i32,
    pub angle_limit: f32,
    pub joints: Vec<ModelConstraintJoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelBone {
    pub index: usize,
    pub name_ja: String,
    pub name_en: String,
    pub origin: F128,
    pub parent_bone_index: i32,
    pub stage_index: i32,
    pub flags: BoneFlags,
    pub tail: BoneTail,
    pub inherent: Option<ModelBoneInherent>,
    pub fixed_axis: Option<F128>,
    pub local_axes: Option<ModelBoneLocalAxes>,
    pub external_parent: Option<i32>,
    pub constraint: Option<ModelConstraint>,
}

type OptionalFieldReader = fn(&mut ModelBone, &Globals, &mut Buffer) -> Result<(), Status>;

/// Flag-gated trailing fields, in stream order. Each present field shifts the
/// offset of every field after it, so the order must not change.
const OPTIONAL_FIELDS: [(BoneFlags, OptionalFieldReader); 5] = [
    (
        BoneFlags::INHERIT_ROTATION.union(BoneFlags::INHERIT_TRANSLATION),
        read_inherent,
    ),
    (BoneFlags::FIXED_AXIS, read_fixed_axis),
    (BoneFlags::LOCAL_AXES, read_local_axes),
    (BoneFlags::EXTERNAL_PARENT, read_external_parent),
    (BoneFlags::IK, read_constraint),
];

fn read_inherent(bone: &mut ModelBone, globals: &Globals, buffer: &mut Buffer) -> Result<(), Status> {
    bone.inherent = Some(ModelBoneInherent {
        parent_index: globals.read_index(buffer, IndexKind::Bone)?,
        coefficient: buffer.read_f32_little_endian()?,
    });
    Ok(())
}

fn read_fixed_axis(bone: &mut ModelBone, _: &Globals, buffer: &mut Buffer) -> Result<(), Status> {
    bone.fixed_axis = Some(buffer.read_f32_3_little_endian()?);
    Ok(())
}

fn read_local_axes(bone: &mut ModelBone, _: &Globals, buffer: &mut Buffer) -> Result<(), Status> {
    bone.local_axes = Some(ModelBoneLocalAxes {
        x: buffer.read_f32_3_little_endian()?,
        z: buffer.read_f32_3_little_endian()?,
    });
    Ok(())
}

fn read_external_parent(
    bone: &mut ModelBone,
    _: &Globals,
    buffer: &mut Buffer,
) -> Result<(), Status> {
    bone.external_parent = Some(buffer.read_i32_little_endian()?);
    Ok(())
}

fn read_constraint(bone: &mut ModelBone, globals: &Globals, buffer: &mut Buffer) -> Result<(), Status> {
    let target_bone_index = globals.read_index(buffer, IndexKind::Bone)?;
    let num_iterations = buffer.read_i32_little_endian()?;
    let angle_limit = buffer.read_f32_little_endian()?;
    let joints = buffer.read_list(|buffer| ModelConstraintJoint::parse_pmx(globals, buffer))?;
    bone.constraint = Some(ModelConstraint {
        target_bone_index,
        num_iterations,
        angle_limit,
        joints,
    });
    Ok(())
}

impl ModelBone {
    pub(crate) fn parse_pmx(
        globals: &Globals,
        buffer: &mut Buffer,
        index: usize,
    ) -> Result<ModelBone, Status> {
        let name_ja = globals.read_string(buffer)?;
        let name_en = globals.read_string(buffer)?;
        let origin = buffer.read_f32_3_little_endian()?;
        let parent_bone_index = globals.read_index(buffer, IndexKind::Bone)?;
        let stage_index = buffer.read_i32_little_endian()?;
        let flags = BoneFlags::from_bits_retain(buffer.read_u16_little_endian()?);
        let tail = if flags.contains(BoneFlags::TAIL_IS_INDEX) {
            BoneTail::Bone(globals.read_index(buffer, IndexKind::Bone)?)
        } else {
            BoneTail::Position(buffer.read_f32_3_little_endian()?)
        };
        let mut bone = ModelBone {
            index,
            name_ja,
            name_en,
            origin,
            parent_bone_index,
            stage_index,
            flags,
            tail,
            inherent: None,
            fixed_axis: None,
            local_axes: None,
            external_parent: None,
            constraint: None,
        };
        for (mask, read) in OPTIONAL_FIELDS {
            if flags.intersects(mask) {
                read(&mut bone, globals, buffer)?;
            }
        }
        Ok(bone)
    }

    pub fn name(&self, language: LanguageType) -> &str {
        pick_name(language, &self.name_ja, &self.name_en)
    }

    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent_bone_index).ok()
    }

    pub fn is_rotatable(&self) -> bool {
        self.flags.contains(BoneFlags::ROTATABLE)
    }

    pub fn is_movable(&self) -> bool {
        self.flags.contains(BoneFlags::MOVABLE)
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(BoneFlags::VISIBLE)
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(BoneFlags::ENABLED)
    }

    pub fn has_inherent_orientation(&self) -> bool {
        self.flags.contains(BoneFlags::INHERIT_ROTATION)
    }

    pub fn has_inherent_translation(&self) -> bool {
        self.flags.contains(BoneFlags::INHERIT_TRANSLATION)
    }

    pub(crate) fn resize(&mut self, factor: f32) {
        self.origin = self.origin.scaled(factor);
        if let BoneTail::Position(position) = self.tail {
            self.tail = BoneTail::Position(position.scaled(factor));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::CodecType, fixture::PmxWriter};

    const OPTIONAL_FLAG_BITS: [BoneFlags; 7] = [
        BoneFlags::TAIL_IS_INDEX,
        BoneFlags::INHERIT_ROTATION,
        BoneFlags::INHERIT_TRANSLATION,
        BoneFlags::FIXED_AXIS,
        BoneFlags::LOCAL_AXES,
        BoneFlags::EXTERNAL_PARENT,
        BoneFlags::IK,
    ];

    #[test]
    fn test_model_bone_flags_from_value() {
        let flags = BoneFlags::from_bits_retain(0x001f);
        assert!(flags.contains(BoneFlags::TAIL_IS_INDEX));
        assert!(flags.contains(BoneFlags::ROTATABLE | BoneFlags::MOVABLE));
        assert!(flags.contains(BoneFlags::VISIBLE | BoneFlags::ENABLED));
        assert!(!flags.contains(BoneFlags::IK));
        assert_eq!(0x4000, BoneFlags::from_bits_retain(0x4000).bits());
    }

    #[test]
    fn test_optional_fields_follow_flags() {
        let globals = Globals::uniform(CodecType::Utf8, 0, 2);
        for combination in 0u32..(1 << OPTIONAL_FLAG_BITS.len()) {
            let mut flags = BoneFlags::ROTATABLE;
            for (bit, flag) in OPTIONAL_FLAG_BITS.iter().enumerate() {
                if combination & (1 << bit) != 0 {
                    flags |= *flag;
                }
            }
            let mut writer = PmxWriter::new(globals);
            writer.write_bone("bone", "", -1, flags);
            writer.write_bone("next", "", 0, BoneFlags::empty());
            let mut buffer = writer.into_buffer();
            let bone = ModelBone::parse_pmx(&globals, &mut buffer, 0).unwrap();
            assert_eq!(flags, bone.flags);
            assert_eq!(
                flags.contains(BoneFlags::TAIL_IS_INDEX),
                matches!(bone.tail, BoneTail::Bone(1))
            );
            assert_eq!(
                flags.intersects(BoneFlags::INHERIT_ROTATION | BoneFlags::INHERIT_TRANSLATION),
                bone.inherent.is_some()
            );
            assert_eq!(flags.contains(BoneFlags::FIXED_AXIS), bone.fixed_axis.is_some());
            assert_eq!(flags.contains(BoneFlags::LOCAL_AXES), bone.local_axes.is_some());
            assert_eq!(
                flags.contains(BoneFlags::EXTERNAL_PARENT),
                bone.external_parent.is_some()
            );
            assert_eq!(flags.contains(BoneFlags::IK), bone.constraint.is_some());
            if let Some(constraint) = &bone.constraint {
                assert_eq!(1, constraint.target_bone_index);
                assert_eq!(2, constraint.joints.len());
                assert!(constraint.joints[0].angle_limit.is_some());
                assert!(constraint.joints[1].angle_limit.is_none());
            }
            let next = ModelBone::parse_pmx(&globals, &mut buffer, 1).unwrap();
            assert_eq!("next", next.name_ja);
            assert_eq!(0, next.parent_bone_index);
            assert!(buffer.is_end(), "flags {:?}", flags);
        }
    }

    #[test]
    fn test_constraint_links_read_limits_only_when_flagged() {
        let globals = Globals::uniform(CodecType::Utf8, 0, 1);
        let mut writer = PmxWriter::new(globals);
        writer.write_bone("ik", "IK", -1, BoneFlags::IK | BoneFlags::TAIL_IS_INDEX);
        let bone = ModelBone::parse_pmx(&globals, &mut writer.into_buffer(), 3).unwrap();
        assert_eq!(3, bone.index);
        assert_eq!("IK", bone.name(LanguageType::English));
        let constraint = bone.constraint.unwrap();
        assert_eq!(1, constraint.target_bone_index);
        assert_eq!(40, constraint.num_iterations);
        assert_eq!(2, constraint.joints.len());
        assert_eq!(
            Some(AngleLimit {
                lower: F128([-1.0, 0.0, 0.0, 0.0]),
                upper: F128([0.0, 0.0, 0.0, 0.0]),
            }),
            constraint.joints[0].angle_limit
        );
        assert_eq!(None, constraint.joints[1].angle_limit);
    }

    #[test]
    fn test_resize_scales_position_tail_only() {
        let globals = Globals::uniform(CodecType::Utf8, 0, 1);
        let mut writer = PmxWriter::new(globals);
        writer.write_bone("a", "", -1, BoneFlags::FIXED_AXIS);
        let mut bone = ModelBone::parse_pmx(&globals, &mut writer.into_buffer(), 0).unwrap();
        bone.resize(10.0);
        assert_eq!([10.0, 20.0, 30.0, 0.0], bone.origin.0);
        assert_eq!(BoneTail::Position(F128([0.0, 10.0, 0.0, 0.0])), bone.tail);
        assert_eq!(Some(F128([1.0, 0.0, 0.0, 0.0])), bone.fixed_axis);
    }
}
