use cgmath::{Vector3, Zero};
use pmxread::{
    bone::{BoneTail, ModelBone},
    hierarchy::BoneNode,
    LanguageType, Model, Status,
};

use crate::utils::f128_to_vec3;

pub type BoneIndex = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBone {
    pub index: BoneIndex,
    pub name: String,
    pub canonical_name: String,
    /// Model-space position.
    pub origin: Vector3<f32>,
    /// Position relative to the parent bone, or to the model origin for roots.
    pub local_translation: Vector3<f32>,
    /// Model-space position the bone points at, if any.
    pub destination: Option<Vector3<f32>>,
    pub children: Vec<SkeletonBone>,
}

impl SkeletonBone {
    fn new(
        index: BoneIndex,
        bones: &[ModelBone],
        parent_origin: Vector3<f32>,
        language_type: LanguageType,
    ) -> Self {
        let bone = &bones[index];
        let mut canonical_name = bone.name(LanguageType::default()).to_owned();
        if canonical_name.is_empty() {
            canonical_name = format!("Bone{}", index);
        }
        let mut name = bone.name(language_type).to_owned();
        if name.is_empty() {
            name = canonical_name.clone();
        }
        let origin = f128_to_vec3(bone.origin);
        let destination = match bone.tail {
            BoneTail::Bone(target) => usize::try_from(target)
                .ok()
                .and_then(|target| bones.get(target))
                .map(|target| f128_to_vec3(target.origin)),
            BoneTail::Position(offset) => {
                let offset = f128_to_vec3(offset);
                if offset.is_zero() {
                    None
                } else {
                    Some(origin + offset)
                }
            }
        };
        Self {
            index,
            name,
            canonical_name,
            origin,
            local_translation: origin - parent_origin,
            destination,
            children: vec![],
        }
    }

    /// This bone and its descendants in depth-first order.
    pub fn walk(&self) -> Vec<&SkeletonBone> {
        let mut out = vec![];
        let mut pending = vec![self];
        while let Some(bone) = pending.pop() {
            out.push(bone);
            pending.extend(bone.children.iter().rev());
        }
        out
    }

    pub fn find(&self, name: &str) -> Option<&SkeletonBone> {
        self.walk()
            .into_iter()
            .find(|bone| bone.name == name || bone.canonical_name == name)
    }

    /// Number of bones on the longest path down from this one.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1usize)];
        while let Some((bone, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(bone.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }
}

impl Drop for SkeletonBone {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut bone) = pending.pop() {
            pending.append(&mut bone.children);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub roots: Vec<SkeletonBone>,
}

impl Skeleton {
    pub fn from_model(model: &Model, language_type: LanguageType) -> Result<Self, Status> {
        let bones = model.bones();
        let hierarchy = model.bone_hierarchy()?;
        // depth-first, so each bone is followed by its subtree
        let mut order: Vec<(&BoneNode, Vector3<f32>)> = vec![];
        let mut pending = hierarchy
            .iter()
            .rev()
            .map(|node| (node, Vector3::zero()))
            .collect::<Vec<_>>();
        while let Some((node, parent_origin)) = pending.pop() {
            let origin = f128_to_vec3(bones[node.index].origin);
            pending.extend(node.children.iter().rev().map(|child| (child, origin)));
            order.push((node, parent_origin));
        }
        let mut built: Vec<SkeletonBone> = Vec::with_capacity(order.len());
        for (node, parent_origin) in order.into_iter().rev() {
            let mut bone = SkeletonBone::new(node.index, bones, parent_origin, language_type);
            let first_child = built.len() - node.children.len();
            bone.children = built.split_off(first_child);
            bone.children.reverse();
            built.push(bone);
        }
        built.reverse();
        log::debug!("Len(skeleton roots): {}", built.len());
        Ok(Self { roots: built })
    }

    pub fn find(&self, name: &str) -> Option<&SkeletonBone> {
        self.bones()
            .into_iter()
            .find(|bone| bone.name == name || bone.canonical_name == name)
    }

    /// Bones in depth-first order.
    pub fn bones(&self) -> Vec<&SkeletonBone> {
        self.roots.iter().flat_map(SkeletonBone::walk).collect()
    }

    pub fn len(&self) -> usize {
        self.bones().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
