use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::ports::Device;
use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// One dof, rotation about `axis` in the joint frame.
    Revolute { axis: [f64; 3] },
    /// One dof, translation along `axis` in the joint frame.
    Prismatic { axis: [f64; 3] },
    /// Three dofs, free translation in x, y and z.
    Translation,
    /// No dof; only carries an offset and a mass.
    Fixed,
}

impl JointKind {
    fn dof_count(&self) -> usize {
        match self {
            JointKind::Revolute { .. } | JointKind::Prismatic { .. } => 1,
            JointKind::Translation => 3,
            JointKind::Fixed => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,
    pub kind: JointKind,
    /// Pose of this joint relative to its parent at zero motion, `[x, y, z, roll, pitch, yaw]`.
    #[serde(default)]
    pub offset: [f64; 6],
    /// One `(lower, upper)` pair per dof.
    #[serde(default)]
    pub bounds: Vec<(f64, f64)>,
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Center of mass of the link in the joint frame.
    #[serde(default)]
    pub local_com: [f64; 3],
}

fn default_mass() -> f64 {
    1.0
}

impl JointSpec {
    pub fn revolute(name: &str, axis: [f64; 3], bounds: (f64, f64)) -> Self {
        Self::with_kind(name, JointKind::Revolute { axis }, vec![bounds])
    }

    pub fn prismatic(name: &str, axis: [f64; 3], bounds: (f64, f64)) -> Self {
        Self::with_kind(name, JointKind::Prismatic { axis }, vec![bounds])
    }

    pub fn translation(name: &str, bounds: [(f64, f64); 3]) -> Self {
        Self::with_kind(name, JointKind::Translation, bounds.to_vec())
    }

    pub fn fixed(name: &str) -> Self {
        Self::with_kind(name, JointKind::Fixed, Vec::new())
    }

    fn with_kind(name: &str, kind: JointKind, bounds: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            offset: [0.0; 6],
            bounds,
            mass: default_mass(),
            local_com: [0.0; 3],
        }
    }

    pub fn with_offset(mut self, offset: [f64; 6]) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_mass(mut self, mass: f64, local_com: [f64; 3]) -> Self {
        self.mass = mass;
        self.local_com = local_com;
        self
    }

    fn offset_transform(&self) -> Isometry3<f64> {
        let [x, y, z, roll, pitch, yaw] = self.offset;
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    fn motion(&self, dofs: &[f64]) -> Isometry3<f64> {
        match &self.kind {
            JointKind::Revolute { axis } => {
                let axis = Unit::new_normalize(Vector3::from(*axis));
                Isometry3::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(&axis, dofs[0]))
            }
            JointKind::Prismatic { axis } => {
                let direction = Vector3::from(*axis).normalize();
                Isometry3::from_parts(Translation3::from(direction * dofs[0]), UnitQuaternion::identity())
            }
            JointKind::Translation => Isometry3::translation(dofs[0], dofs[1], dofs[2]),
            JointKind::Fixed => Isometry3::identity(),
        }
    }
}

/// Serial chain of joints, each the child of the previous one.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    name: String,
    joints: Vec<JointSpec>,
    /// First configuration index of each joint.
    dof_starts: Vec<usize>,
    config_size: usize,
}

impl KinematicChain {
    pub fn new(name: &str, joints: Vec<JointSpec>) -> DomainResult<Self> {
        let mut dof_starts = Vec::with_capacity(joints.len());
        let mut config_size = 0;
        for (i, joint) in joints.iter().enumerate() {
            if joint.name.is_empty() {
                return Err(DomainError::invalid_argument("joint names must not be empty"));
            }
            if joints[..i].iter().any(|other| other.name == joint.name) {
                return Err(DomainError::DuplicateName {
                    name: joint.name.clone(),
                });
            }
            if joint.bounds.len() != joint.kind.dof_count() {
                return Err(DomainError::invalid_argument(format!(
                    "joint {} needs {} bounds, got {}",
                    joint.name,
                    joint.kind.dof_count(),
                    joint.bounds.len()
                )));
            }
            if joint.bounds.iter().any(|(lo, hi)| lo > hi) {
                return Err(DomainError::invalid_argument(format!("joint {} has inverted bounds", joint.name)));
            }
            if matches!(joint.kind, JointKind::Revolute { axis } | JointKind::Prismatic { axis } if Vector3::from(axis).norm() == 0.0)
            {
                return Err(DomainError::invalid_argument(format!("joint {} has a zero axis", joint.name)));
            }
            dof_starts.push(config_size);
            config_size += joint.kind.dof_count();
        }
        Ok(Self {
            name: name.to_string(),
            joints,
            dof_starts,
            config_size,
        })
    }

    /// A point moving in the plane: prismatic joints `x` and `y` within `extent`.
    pub fn planar_point(name: &str, extent: f64) -> DomainResult<Self> {
        Self::new(
            name,
            vec![
                JointSpec::prismatic("x", [1.0, 0.0, 0.0], (-extent, extent)),
                JointSpec::prismatic("y", [0.0, 1.0, 0.0], (-extent, extent)),
            ],
        )
    }

    /// Planar arm of revolute joints about z, links of the given lengths.
    pub fn planar_arm(name: &str, link_lengths: &[f64]) -> DomainResult<Self> {
        let mut joints = Vec::with_capacity(link_lengths.len() + 1);
        let mut previous = 0.0;
        for (i, length) in link_lengths.iter().enumerate() {
            joints.push(
                JointSpec::revolute(&format!("joint{}", i + 1), [0.0, 0.0, 1.0], (-std::f64::consts::PI, std::f64::consts::PI))
                    .with_offset([previous, 0.0, 0.0, 0.0, 0.0, 0.0])
                    .with_mass(1.0, [length / 2.0, 0.0, 0.0]),
            );
            previous = *length;
        }
        joints.push(JointSpec::fixed("tool").with_offset([previous, 0.0, 0.0, 0.0, 0.0, 0.0]).with_mass(0.0, [0.0; 3]));
        Self::new(name, joints)
    }

    fn joint_index(&self, joint: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == joint)
    }

    /// World pose of every joint up to and including `last`.
    fn frames(&self, q: &Configuration, last: usize) -> Vec<Isometry3<f64>> {
        let mut frames = Vec::with_capacity(last + 1);
        let mut pose = Isometry3::identity();
        for (joint, start) in self.joints.iter().zip(&self.dof_starts).take(last + 1) {
            let dofs = &q.as_slice()[*start..*start + joint.kind.dof_count()];
            pose = pose * joint.offset_transform() * joint.motion(dofs);
            frames.push(pose);
        }
        frames
    }
}

impl Device for KinematicChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn config_size(&self) -> usize {
        self.config_size
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        self.joints.iter().flat_map(|j| j.bounds.iter().copied()).collect()
    }

    fn joint_names(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name.clone()).collect()
    }

    fn joint_dofs(&self, joint: &str) -> Option<Range<usize>> {
        let i = self.joint_index(joint)?;
        let start = self.dof_starts[i];
        Some(start..start + self.joints[i].kind.dof_count())
    }

    /// Single-dof joints name their dof after themselves; translation
    /// joints expose `<joint>_x`, `<joint>_y` and `<joint>_z`.
    fn dof_index(&self, dof_name: &str) -> Option<usize> {
        if let Some(i) = self.joint_index(dof_name) {
            if self.joints[i].kind.dof_count() == 1 {
                return Some(self.dof_starts[i]);
            }
        }
        let (joint, axis) = dof_name.rsplit_once('_')?;
        let i = self.joint_index(joint)?;
        if self.joints[i].kind != JointKind::Translation {
            return None;
        }
        let offset = ["x", "y", "z"].iter().position(|a| *a == axis)?;
        Some(self.dof_starts[i] + offset)
    }

    fn joint_transform(&self, joint: &str, q: &Configuration) -> Option<Isometry3<f64>> {
        if q.dim() != self.config_size {
            return None;
        }
        let i = self.joint_index(joint)?;
        self.frames(q, i).pop()
    }

    fn center_of_mass(&self, com: &str, q: &Configuration) -> Option<Vector3<f64>> {
        if q.dim() != self.config_size || self.joints.is_empty() {
            return None;
        }
        let first = if com.is_empty() { 0 } else { self.joint_index(com)? };
        let frames = self.frames(q, self.joints.len() - 1);
        let mut total = 0.0;
        let mut weighted = Vector3::zeros();
        for (joint, frame) in self.joints.iter().zip(&frames).skip(first) {
            let local = Vector3::from(joint.local_com);
            weighted += (frame * nalgebra::Point3::from(local)).coords * joint.mass;
            total += joint.mass;
        }
        if total > 0.0 {
            Some(weighted / total)
        } else {
            Some(frames[first].translation.vector)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_planar_arm_forward_kinematics() {
        let arm = KinematicChain::planar_arm("arm", &[1.0, 1.0]).unwrap();
        assert_eq!(arm.config_size(), 2);
        let q = Configuration::new(vec![std::f64::consts::FRAC_PI_2, 0.0]);
        let tool = arm.joint_transform("tool", &q).unwrap();
        assert_relative_eq!(tool.translation.vector.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(tool.translation.vector.y, 2.0, epsilon = 1e-12);
        assert!(arm.joint_transform("elbow", &q).is_none());
    }

    #[test]
    fn test_dof_names() {
        let chain = KinematicChain::new(
            "base",
            vec![
                JointSpec::translation("root", [(-1.0, 1.0); 3]),
                JointSpec::revolute("yaw", [0.0, 0.0, 1.0], (-3.0, 3.0)),
            ],
        )
        .unwrap();
        assert_eq!(chain.config_size(), 4);
        assert_eq!(chain.dof_index("root_y"), Some(1));
        assert_eq!(chain.dof_index("yaw"), Some(3));
        assert_eq!(chain.dof_index("yaw_x"), None);
        assert_eq!(chain.joint_dofs("root"), Some(0..3));
    }

    #[test]
    fn test_center_of_mass_of_subtree() {
        let arm = KinematicChain::planar_arm("arm", &[2.0, 2.0]).unwrap();
        let q = Configuration::zeros(2);
        let whole = arm.center_of_mass("", &q).unwrap();
        assert_relative_eq!(whole.x, 2.0, epsilon = 1e-12);
        let distal = arm.center_of_mass("joint2", &q).unwrap();
        assert_relative_eq!(distal.x, 3.0, epsilon = 1e-12);
        assert!(arm.center_of_mass("nope", &q).is_none());
    }

    #[test]
    fn test_rejects_malformed_chains() {
        let duplicate = KinematicChain::new(
            "bad",
            vec![JointSpec::fixed("a"), JointSpec::fixed("a")],
        );
        assert!(matches!(duplicate, Err(DomainError::DuplicateName { .. })));
        let missing_bounds = KinematicChain::new(
            "bad",
            vec![JointSpec::with_kind("a", JointKind::Translation, vec![(0.0, 1.0)])],
        );
        assert!(matches!(missing_bounds, Err(DomainError::InvalidArgument { .. })));
    }
}
