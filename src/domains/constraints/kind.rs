use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::ports::{CollisionChecker, Device};
use nalgebra::{DVector, Isometry3, Point3, UnitQuaternion, Vector3};

pub type Point = [f64; 3];

/// Everything a constraint needs to evaluate itself.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub device: &'a dyn Device,
    pub environment: &'a dyn CollisionChecker,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    Orientation {
        joint1: Option<String>,
        joint2: String,
        target: UnitQuaternion<f64>,
        mask: Vec<bool>,
    },
    Transformation {
        joint1: Option<String>,
        joint2: String,
        target: Isometry3<f64>,
        mask: Vec<bool>,
    },
    Position {
        joint1: Option<String>,
        joint2: String,
        point1: Point,
        point2: Point,
        mask: Vec<bool>,
    },
    RelativeCom {
        com: String,
        joint: String,
        point: Point,
        mask: Vec<bool>,
    },
    ComBetweenFeet {
        com: String,
        joint_left: String,
        joint_right: String,
        point_left: Point,
        point_right: Point,
        joint_reference: String,
        mask: Vec<bool>,
    },
    ConvexShapeContact {
        floor_joints: Vec<String>,
        object_joints: Vec<String>,
        points: Vec<Point>,
        object_triangles: Vec<Vec<usize>>,
        floor_triangles: Vec<Vec<usize>>,
    },
    StaticStability {
        joints: Vec<String>,
        points: Vec<Point>,
        normals: Vec<Point>,
        com_root_joint: String,
    },
    Configuration {
        goal: Configuration,
    },
    DistanceBetweenJoints {
        joint1: String,
        joint2: String,
        distance: f64,
    },
    DistanceBetweenJointAndObjects {
        joint: String,
        objects: Vec<String>,
        distance: f64,
    },
    LockedJoint {
        joint: String,
        value: Vec<f64>,
    },
}

impl ConstraintKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstraintKind::Orientation { .. } => "Orientation",
            ConstraintKind::Transformation { .. } => "Transformation",
            ConstraintKind::Position { .. } => "Position",
            ConstraintKind::RelativeCom { .. } => "RelativeCom",
            ConstraintKind::ComBetweenFeet { .. } => "ComBetweenFeet",
            ConstraintKind::ConvexShapeContact { .. } => "ConvexShapeContact",
            ConstraintKind::StaticStability { .. } => "StaticStability",
            ConstraintKind::Configuration { .. } => "Configuration",
            ConstraintKind::DistanceBetweenJoints { .. } => "DistanceBetweenJoints",
            ConstraintKind::DistanceBetweenJointAndObjects { .. } => "DistanceBetweenJointAndObjects",
            ConstraintKind::LockedJoint { .. } => "LockedJoint",
        }
    }

    /// Checks that every referenced joint, COM, object and index exists and
    /// that masks and vectors have the right shape.
    pub fn validate(&self, ctx: &EvaluationContext<'_>) -> DomainResult<()> {
        match self {
            ConstraintKind::Orientation { joint1, joint2, mask, .. } => {
                check_optional_joint(ctx, joint1.as_deref())?;
                check_joint(ctx, joint2)?;
                check_mask(mask, 3)
            }
            ConstraintKind::Transformation { joint1, joint2, mask, .. } => {
                check_optional_joint(ctx, joint1.as_deref())?;
                check_joint(ctx, joint2)?;
                check_mask(mask, 6)
            }
            ConstraintKind::Position { joint1, joint2, mask, .. } => {
                check_optional_joint(ctx, joint1.as_deref())?;
                check_joint(ctx, joint2)?;
                check_mask(mask, 3)
            }
            ConstraintKind::RelativeCom { com, joint, mask, .. } => {
                check_com(ctx, com)?;
                check_joint(ctx, joint)?;
                check_mask(mask, 3)
            }
            ConstraintKind::ComBetweenFeet { com, joint_left, joint_right, joint_reference, mask, .. } => {
                check_com(ctx, com)?;
                check_joint(ctx, joint_left)?;
                check_joint(ctx, joint_right)?;
                check_joint(ctx, joint_reference)?;
                check_mask(mask, 3)
            }
            ConstraintKind::ConvexShapeContact { floor_joints, object_joints, points, object_triangles, floor_triangles } => {
                if floor_joints.len() != floor_triangles.len() || object_joints.len() != object_triangles.len() {
                    return Err(DomainError::invalid_geometry(
                        "each floor/object shape needs exactly one joint",
                    ));
                }
                if floor_triangles.is_empty() || object_triangles.is_empty() {
                    return Err(DomainError::invalid_geometry("contact needs at least one floor and one object shape"));
                }
                for joint in floor_joints.iter().chain(object_joints.iter()) {
                    check_joint(ctx, joint)?;
                }
                for polygon in floor_triangles.iter().chain(object_triangles.iter()) {
                    if polygon.len() < 3 {
                        return Err(DomainError::invalid_geometry("a contact shape needs at least 3 points"));
                    }
                    if let Some(bad) = polygon.iter().find(|&&i| i >= points.len()) {
                        return Err(DomainError::invalid_geometry(format!(
                            "point index {} out of range ({} points)",
                            bad,
                            points.len()
                        )));
                    }
                }
                Ok(())
            }
            ConstraintKind::StaticStability { joints, points, normals, com_root_joint } => {
                if joints.is_empty() || joints.len() != points.len() || joints.len() != normals.len() {
                    return Err(DomainError::invalid_geometry(
                        "static stability needs one point and one normal per contact joint",
                    ));
                }
                for joint in joints {
                    check_joint(ctx, joint)?;
                }
                if normals.iter().any(|n| Vector3::from(*n).norm() < f64::EPSILON) {
                    return Err(DomainError::invalid_geometry("contact normals must be non-zero"));
                }
                check_com(ctx, com_root_joint)
            }
            ConstraintKind::Configuration { goal } => goal.ensure_dim(ctx.device.config_size()),
            ConstraintKind::DistanceBetweenJoints { joint1, joint2, distance } => {
                check_joint(ctx, joint1)?;
                check_joint(ctx, joint2)?;
                check_distance(*distance)
            }
            ConstraintKind::DistanceBetweenJointAndObjects { joint, objects, distance } => {
                check_joint(ctx, joint)?;
                if objects.is_empty() {
                    return Err(DomainError::invalid_geometry("no object given"));
                }
                let known = ctx.environment.object_names();
                if let Some(missing) = objects.iter().find(|o| !known.contains(*o)) {
                    return Err(DomainError::invalid_geometry(format!("unknown object {}", missing)));
                }
                check_distance(*distance)
            }
            ConstraintKind::LockedJoint { joint, value } => {
                let dofs = ctx
                    .device
                    .joint_dofs(joint)
                    .ok_or_else(|| DomainError::invalid_geometry(format!("unknown joint {}", joint)))?;
                if dofs.len() != value.len() {
                    return Err(DomainError::invalid_argument(format!(
                        "joint {} has {} dofs, got {} values",
                        joint,
                        dofs.len(),
                        value.len()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Residual at `q`, masked. Zero means satisfied.
    pub fn value(&self, ctx: &EvaluationContext<'_>, q: &Configuration) -> DVector<f64> {
        let raw = self.raw_value(ctx, q);
        match self.mask() {
            Some(mask) => DVector::from_iterator(
                mask.iter().filter(|m| **m).count(),
                raw.iter().zip(mask.iter()).filter(|(_, m)| **m).map(|(v, _)| *v),
            ),
            None => raw,
        }
    }

    fn mask(&self) -> Option<&[bool]> {
        match self {
            ConstraintKind::Orientation { mask, .. }
            | ConstraintKind::Transformation { mask, .. }
            | ConstraintKind::Position { mask, .. }
            | ConstraintKind::RelativeCom { mask, .. }
            | ConstraintKind::ComBetweenFeet { mask, .. } => Some(mask),
            _ => None,
        }
    }

    fn raw_value(&self, ctx: &EvaluationContext<'_>, q: &Configuration) -> DVector<f64> {
        match self {
            ConstraintKind::Orientation { joint1, joint2, target, .. } => {
                let r1 = frame(ctx, joint1.as_deref(), q).rotation;
                let r2 = joint_frame(ctx, joint2, q).rotation;
                let error = (target.inverse() * r1.inverse() * r2).scaled_axis();
                DVector::from_column_slice(error.as_slice())
            }
            ConstraintKind::Transformation { joint1, joint2, target, .. } => {
                let relative = frame(ctx, joint1.as_deref(), q).inverse() * joint_frame(ctx, joint2, q);
                let translation = relative.translation.vector - target.translation.vector;
                let rotation = (target.rotation.inverse() * relative.rotation).scaled_axis();
                DVector::from_iterator(6, translation.iter().chain(rotation.iter()).copied())
            }
            ConstraintKind::Position { joint1, joint2, point1, point2, .. } => {
                let world = joint_frame(ctx, joint2, q) * Point3::from(*point2);
                let local = frame(ctx, joint1.as_deref(), q).inverse_transform_point(&world);
                let error = local - Point3::from(*point1);
                DVector::from_column_slice(error.as_slice())
            }
            ConstraintKind::RelativeCom { com, joint, point, .. } => {
                let c = Point3::from(center_of_mass(ctx, com, q));
                let local = joint_frame(ctx, joint, q).inverse_transform_point(&c);
                let error = local - Point3::from(*point);
                DVector::from_column_slice(error.as_slice())
            }
            ConstraintKind::ComBetweenFeet { com, joint_left, joint_right, point_left, point_right, joint_reference, .. } => {
                let left = joint_frame(ctx, joint_left, q) * Point3::from(*point_left);
                let right = joint_frame(ctx, joint_right, q) * Point3::from(*point_right);
                let middle = nalgebra::center(&left, &right);
                let reference = joint_frame(ctx, joint_reference, q).rotation;
                let offset = reference.inverse_transform_vector(&(center_of_mass(ctx, com, q) - middle.coords));
                let feet_axis = reference.inverse_transform_vector(&(right - left));
                DVector::from_vec(vec![offset.dot(&feet_axis), feet_axis.cross(&offset).z, offset.z])
            }
            ConstraintKind::ConvexShapeContact { floor_joints, object_joints, points, object_triangles, floor_triangles } => {
                let floors: Vec<Facet> = floor_triangles
                    .iter()
                    .zip(floor_joints.iter())
                    .map(|(polygon, joint)| Facet::new(&joint_frame(ctx, joint, q), points, polygon))
                    .collect();
                let objects: Vec<Facet> = object_triangles
                    .iter()
                    .zip(object_joints.iter())
                    .map(|(polygon, joint)| Facet::new(&joint_frame(ctx, joint, q), points, polygon))
                    .collect();

                // Contact is sought between the closest object/floor facet pair.
                let mut best: Option<(f64, &Facet, &Facet)> = None;
                for object in &objects {
                    for floor in &floors {
                        let d = (object.centroid - floor.centroid).norm();
                        if best.map_or(true, |(bd, _, _)| d < bd) {
                            best = Some((d, object, floor));
                        }
                    }
                }
                match best {
                    Some((_, object, floor)) => {
                        let height = (object.centroid - floor.centroid).dot(&floor.normal);
                        let alignment = object.normal.cross(&floor.normal);
                        DVector::from_vec(vec![height, alignment.x, alignment.y, alignment.z])
                    }
                    None => DVector::zeros(4),
                }
            }
            ConstraintKind::StaticStability { joints, points, normals: _, com_root_joint } => {
                let contacts: Vec<Point3<f64>> = joints
                    .iter()
                    .zip(points.iter())
                    .map(|(joint, p)| joint_frame(ctx, joint, q) * Point3::from(*p))
                    .collect();
                let support = contacts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / contacts.len() as f64;
                let c = center_of_mass(ctx, com_root_joint, q);
                let mut values = vec![c.x - support.x, c.y - support.y];
                values.extend(contacts.iter().map(|p| p.z));
                DVector::from_vec(values)
            }
            ConstraintKind::Configuration { goal } => {
                DVector::from_iterator(q.dim(), q.as_slice().iter().zip(goal.as_slice()).map(|(a, b)| a - b))
            }
            ConstraintKind::DistanceBetweenJoints { joint1, joint2, distance } => {
                let a = joint_frame(ctx, joint1, q).translation.vector;
                let b = joint_frame(ctx, joint2, q).translation.vector;
                DVector::from_element(1, (a - b).norm() - distance)
            }
            ConstraintKind::DistanceBetweenJointAndObjects { joint, objects, distance } => {
                let origin = Point3::from(joint_frame(ctx, joint, q).translation.vector);
                let closest = objects
                    .iter()
                    .filter_map(|o| ctx.environment.distance_to_object(o, &origin))
                    .fold(f64::INFINITY, f64::min);
                let value = if closest.is_finite() { closest - distance } else { 0.0 };
                DVector::from_element(1, value)
            }
            ConstraintKind::LockedJoint { joint, value } => match ctx.device.joint_dofs(joint) {
                Some(dofs) => DVector::from_iterator(
                    value.len(),
                    dofs.zip(value.iter()).map(|(i, v)| q[i] - v),
                ),
                None => DVector::zeros(value.len()),
            },
        }
    }
}

struct Facet {
    centroid: Vector3<f64>,
    normal: Vector3<f64>,
}

impl Facet {
    fn new(pose: &Isometry3<f64>, points: &[Point], polygon: &[usize]) -> Self {
        let world: Vec<Vector3<f64>> = polygon.iter().map(|&i| (pose * Point3::from(points[i])).coords).collect();
        let centroid = world.iter().fold(Vector3::zeros(), |acc, p| acc + p) / world.len() as f64;
        let normal = (world[1] - world[0])
            .cross(&(world[2] - world[0]))
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::z);
        Self { centroid, normal }
    }
}

// Joints are validated at registration; an unknown name falls back to the world frame.
fn frame(ctx: &EvaluationContext<'_>, joint: Option<&str>, q: &Configuration) -> Isometry3<f64> {
    joint
        .and_then(|j| ctx.device.joint_transform(j, q))
        .unwrap_or_else(Isometry3::identity)
}

fn joint_frame(ctx: &EvaluationContext<'_>, joint: &str, q: &Configuration) -> Isometry3<f64> {
    frame(ctx, Some(joint), q)
}

fn center_of_mass(ctx: &EvaluationContext<'_>, com: &str, q: &Configuration) -> Vector3<f64> {
    ctx.device.center_of_mass(com, q).unwrap_or_else(Vector3::zeros)
}

fn check_joint(ctx: &EvaluationContext<'_>, joint: &str) -> DomainResult<()> {
    if ctx.device.joint_dofs(joint).is_none() {
        return Err(DomainError::invalid_geometry(format!("unknown joint {}", joint)));
    }
    Ok(())
}

fn check_optional_joint(ctx: &EvaluationContext<'_>, joint: Option<&str>) -> DomainResult<()> {
    match joint {
        Some(j) => check_joint(ctx, j),
        None => Ok(()),
    }
}

fn check_com(ctx: &EvaluationContext<'_>, com: &str) -> DomainResult<()> {
    let q = Configuration::zeros(ctx.device.config_size());
    if ctx.device.center_of_mass(com, &q).is_none() {
        return Err(DomainError::invalid_geometry(format!("unknown center of mass {}", com)));
    }
    Ok(())
}

fn check_mask(mask: &[bool], expected: usize) -> DomainResult<()> {
    if mask.len() != expected {
        return Err(DomainError::invalid_argument(format!(
            "mask has {} entries, expected {}",
            mask.len(),
            expected
        )));
    }
    Ok(())
}

fn check_distance(distance: f64) -> DomainResult<()> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(DomainError::invalid_argument(format!("invalid distance {}", distance)));
    }
    Ok(())
}
