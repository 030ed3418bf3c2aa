//! 几何判定：只查询，不修改宿主。

use vessel_core::document::{EntityKind, EntityRef, FeatureType};
use vessel_core::geometry::{self, MajorPlane};

use crate::host::HostEngine;

/// 约束分类所依赖的几何判定。测试中可以用合成答案替换宿主。
pub trait GeometryOracle {
    fn is_plane(&self, entity: &EntityRef) -> bool;
    fn is_axis(&self, entity: &EntityRef) -> bool;

    #[inline]
    fn is_in_component(&self, entity: &EntityRef) -> bool {
        entity.is_in_component()
    }

    #[inline]
    fn is_in_specific_component(&self, entity: &EntityRef, component: &str) -> bool {
        entity.owner() == Some(component)
    }

    /// 实体是否为其所属坐标系（装配体或组件）中的指定基准面。
    fn is_major_plane(&self, entity: &EntityRef, plane: MajorPlane) -> bool;
    fn is_parallel_to_major_plane(&self, entity: &EntityRef, plane: MajorPlane) -> bool;
}

pub struct HostOracle<'a> {
    host: &'a dyn HostEngine,
}

impl<'a> HostOracle<'a> {
    pub fn new(host: &'a dyn HostEngine) -> Self {
        Self { host }
    }
}

impl GeometryOracle for HostOracle<'_> {
    fn is_plane(&self, entity: &EntityRef) -> bool {
        self.host.entity_kind(entity) == Some(EntityKind::Plane)
    }

    fn is_axis(&self, entity: &EntityRef) -> bool {
        self.host.entity_kind(entity) == Some(EntityKind::Axis)
    }

    fn is_major_plane(&self, entity: &EntityRef, plane: MajorPlane) -> bool {
        self.host
            .nth_feature_of_type(entity.owner(), FeatureType::RefPlane, plane.ordinal())
            .is_some_and(|major| major.name == entity.name)
    }

    fn is_parallel_to_major_plane(&self, entity: &EntityRef, plane: MajorPlane) -> bool {
        self.is_plane(entity)
            && self
                .host
                .plane_transform(entity)
                .is_some_and(|placement| {
                    geometry::is_parallel_to_major_plane(placement.normal(), plane)
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ASSEMBLY_AXIS_NAME, Scene};
    use crate::segments::shell;

    fn shell_scene() -> (Scene, String) {
        let mut scene = Scene::new();
        let demo = scene
            .populate_shell_demo("C:/parts/Shell.SLDPRT", 1.0)
            .expect("populate shell");
        (scene, demo.head)
    }

    #[test]
    fn major_planes_are_resolved_per_scope() {
        let (scene, head) = shell_scene();
        let oracle = HostOracle::new(&scene);

        assert!(oracle.is_major_plane(&EntityRef::assembly("Front Plane"), MajorPlane::Front));
        assert!(oracle.is_major_plane(
            &EntityRef::in_component(&head, "Right Plane"),
            MajorPlane::Right
        ));
        assert!(!oracle.is_major_plane(
            &EntityRef::in_component(&head, shell::LEFT_PLANE_NAME),
            MajorPlane::Right
        ));
    }

    #[test]
    fn boundary_planes_are_parallel_to_right() {
        let (scene, head) = shell_scene();
        let oracle = HostOracle::new(&scene);
        let left = EntityRef::in_component(&head, shell::LEFT_PLANE_NAME);

        assert!(oracle.is_parallel_to_major_plane(&left, MajorPlane::Right));
        assert!(!oracle.is_parallel_to_major_plane(&left, MajorPlane::Front));
        assert!(!oracle.is_parallel_to_major_plane(
            &EntityRef::assembly(ASSEMBLY_AXIS_NAME),
            MajorPlane::Right
        ));
    }

    #[test]
    fn kinds_and_membership() {
        let (scene, head) = shell_scene();
        let oracle = HostOracle::new(&scene);
        let axis = EntityRef::in_component(&head, shell::CENTER_AXIS_NAME);

        assert!(oracle.is_axis(&axis));
        assert!(!oracle.is_plane(&axis));
        assert!(oracle.is_in_specific_component(&axis, &head));
        assert!(!oracle.is_in_specific_component(&axis, "Cylindrical Shell 2"));
        assert!(!oracle.is_in_component(&EntityRef::assembly(ASSEMBLY_AXIS_NAME)));
        assert!(!oracle.is_plane(&EntityRef::assembly("Nowhere")));
    }
}
