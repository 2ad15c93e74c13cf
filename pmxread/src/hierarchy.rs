use std::collections::{HashMap, HashSet};

use crate::{bone::ModelBone, common::Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoneNode {
    pub index: usize,
    pub children: Vec<BoneNode>,
}

impl BoneNode {
    /// Number of bones in this subtree, including this one.
    pub fn count(&self) -> usize {
        self.walk().len()
    }

    /// This node and its descendants in depth-first order.
    pub fn walk(&self) -> Vec<&BoneNode> {
        let mut out = vec![];
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            out.push(node);
            pending.extend(node.children.iter().rev());
        }
        out
    }
}

// Parent chains can be as long as the bone list, so nested nodes are released
// without recursing.
impl Drop for BoneNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub fn root_bones(bones: &[ModelBone]) -> impl Iterator<Item = &ModelBone> {
    bones.iter().filter(|bone| bone.parent_bone_index < 0)
}

pub fn children_of(bones: &[ModelBone], index: usize) -> impl Iterator<Item = &ModelBone> {
    bones
        .iter()
        .filter(move |bone| bone.parent_index() == Some(index))
}

pub fn has_children(bones: &[ModelBone], index: usize) -> bool {
    children_of(bones, index).next().is_some()
}

/// Rebuilds the parent-to-children forest. Bones whose parent is outside the
/// list are left out with a warning; a parent cycle fails with
/// [`Status::CyclicBoneGraph`] naming the first bone seen twice.
pub fn build_hierarchy(bones: &[ModelBone]) -> Result<Vec<BoneNode>, Status> {
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for (position, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent_index() {
            children.entry(parent).or_default().push(position);
        }
    }
    let mut placed = vec![false; bones.len()];
    let order = visit_order(bones, &children, &mut placed)?;
    for (position, bone) in bones.iter().enumerate() {
        if !placed[position] {
            check_parent_chain(bones, position)?;
            log::warn!(
                "Bone {} has no path to a root bone, parent {} is out of range",
                position,
                bone.parent_bone_index
            );
        }
    }
    Ok(assemble(&order))
}

struct Visit {
    position: usize,
    num_children: usize,
}

/// Depth-first order from every root. Fails on the first bone reached twice.
fn visit_order(
    bones: &[ModelBone],
    children: &HashMap<usize, Vec<usize>>,
    placed: &mut [bool],
) -> Result<Vec<Visit>, Status> {
    let mut order = vec![];
    for (root, bone) in bones.iter().enumerate() {
        if bone.parent_bone_index >= 0 {
            continue;
        }
        let mut pending = vec![root];
        while let Some(position) = pending.pop() {
            if placed[position] {
                return Err(Status::CyclicBoneGraph(position));
            }
            placed[position] = true;
            let child_positions = children
                .get(&bones[position].index)
                .map(Vec::as_slice)
                .unwrap_or_default();
            pending.extend(child_positions.iter().rev());
            order.push(Visit {
                position,
                num_children: child_positions.len(),
            });
        }
    }
    Ok(order)
}

/// Builds nodes from the deepest visit upward. Every node's children were
/// visited right after it, so they sit on top of `built`, last child on top.
fn assemble(order: &[Visit]) -> Vec<BoneNode> {
    let mut built: Vec<BoneNode> = Vec::with_capacity(order.len());
    for visit in order.iter().rev() {
        let first_child = built.len() - visit.num_children;
        let mut children = built.split_off(first_child);
        children.reverse();
        built.push(BoneNode {
            index: visit.position,
            children,
        });
    }
    built.reverse();
    built
}

/// Follows parents from an unplaced bone until it leaves the list or repeats.
fn check_parent_chain(bones: &[ModelBone], start: usize) -> Result<(), Status> {
    let mut seen = HashSet::new();
    let mut current = start;
    loop {
        if !seen.insert(current) {
            return Err(Status::CyclicBoneGraph(current));
        }
        match bones[current].parent_index() {
            Some(parent) if parent < bones.len() => current = parent,
            _ => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bone::{BoneFlags, BoneTail},
        common::F128,
    };

    fn bone(index: usize, parent: i32) -> ModelBone {
        ModelBone {
            index,
            name_ja: format!("bone{}", index),
            name_en: String::new(),
            origin: F128::default(),
            parent_bone_index: parent,
            stage_index: 0,
            flags: BoneFlags::empty(),
            tail: BoneTail::Position(F128::default()),
            inherent: None,
            fixed_axis: None,
            local_axes: None,
            external_parent: None,
            constraint: None,
        }
    }

    #[test]
    fn test_build_hierarchy() {
        let bones = vec![bone(0, -1), bone(1, 0), bone(2, 0), bone(3, 2), bone(4, -1)];
        let roots = build_hierarchy(&bones).unwrap();
        assert_eq!(2, roots.len());
        assert_eq!(4, roots[0].count());
        assert_eq!(vec![1, 2], roots[0].children.iter().map(|n| n.index).collect::<Vec<_>>());
        assert_eq!(3, roots[0].children[1].children[0].index);
        assert_eq!(4, roots[1].index);
        assert!(roots[1].children.is_empty());
        assert_eq!(2, root_bones(&bones).count());
        assert_eq!(2, children_of(&bones, 0).count());
        assert!(has_children(&bones, 2));
        assert!(!has_children(&bones, 3));
    }

    #[test]
    fn test_long_parent_chain() {
        let bones = (0..100_000)
            .map(|index| bone(index, index as i32 - 1))
            .collect::<Vec<_>>();
        let roots = build_hierarchy(&bones).unwrap();
        assert_eq!(1, roots.len());
        assert_eq!(100_000, roots[0].count());
        let last = roots[0].walk().last().map(|node| node.index);
        assert_eq!(Some(99_999), last);
        drop(roots);

        let mut cyclic = bones;
        cyclic[0].parent_bone_index = 99_999;
        assert_eq!(Err(Status::CyclicBoneGraph(0)), build_hierarchy(&cyclic));
    }

    #[test]
    fn test_two_bone_cycle() {
        let bones = vec![bone(0, 1), bone(1, 0)];
        assert_eq!(Err(Status::CyclicBoneGraph(0)), build_hierarchy(&bones));
    }

    #[test]
    fn test_self_parent_cycle_below_root() {
        let bones = vec![bone(0, -1), bone(1, 1), bone(2, 1)];
        assert_eq!(Err(Status::CyclicBoneGraph(1)), build_hierarchy(&bones));
    }

    #[test]
    fn test_out_of_range_parent_is_skipped() {
        let bones = vec![bone(0, -1), bone(1, 9)];
        let roots = build_hierarchy(&bones).unwrap();
        assert_eq!(1, roots.len());
        assert!(roots[0].children.is_empty());
    }

    #[test]
    fn test_duplicate_index_detected() {
        let mut bones = vec![bone(0, -1), bone(1, 0), bone(2, -1)];
        // a second root that claims the first bone's index adopts the same children
        bones[2].index = 0;
        assert_eq!(Err(Status::CyclicBoneGraph(1)), build_hierarchy(&bones));
    }
}
