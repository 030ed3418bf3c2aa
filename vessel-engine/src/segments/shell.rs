//! 圆柱壳体段：左端面接前一段右端面，中心轴与装配体中心轴重合，前视面按固定角度定位。

use tracing::{debug, info};
use vessel_core::document::{EntityRef, FeatureId, FeatureType, MateAlignment};

use super::{Segment, constraint_views, delete_features, discard_partial, next_free_name};
use crate::classifier::{
    ClassificationContext, Classification, ConstraintRole, LateralKind, RoleBindings, RoleSlot,
    SegmentFamily, classify_segment,
};
use crate::errors::EngineError;
use crate::handles::{AngleMate, CoincidentMate};
use crate::host::{HostEngine, Selectable, Session};
use crate::predicates::HostOracle;

pub const SHELL_NAME: &str = "Cylindrical Shell";
pub const LEFT_PLANE_NAME: &str = "Left Plane";
pub const FRONT_PLANE_NAME: &str = "Front Plane";
pub const CENTER_AXIS_NAME: &str = "Center Axis";
/// 驱动壳体长度的尺寸。
pub const LENGTH_DIMENSION: &str = "D3@Sketch1";
/// 相邻壳体前视面之间的角度（45°）。
pub const CLOCKING_ANGLE: f64 = std::f64::consts::FRAC_PI_4;
pub const LEFT_PLANE_ORDINAL: usize = 4;
pub const RIGHT_PLANE_ORDINAL: usize = 5;

#[derive(Debug, Clone)]
pub struct ShellSegment {
    component: String,
    left_plane: EntityRef,
    right_plane: EntityRef,
    lateral: CoincidentMate,
    axial: CoincidentMate,
    clocking: AngleMate,
}

impl ShellSegment {
    /// 从文档中已有的组件重建壳体段。`previous` 为链中紧邻的前一个壳体。
    pub fn rehydrate(
        session: &mut Session<'_>,
        component: &str,
        previous: Option<&str>,
    ) -> Result<Self, EngineError> {
        session.ensure_document()?;
        let context = ClassificationContext {
            component,
            previous,
            family: SegmentFamily::Shell,
        };
        let classified = {
            let views = constraint_views(&*session.host, component);
            let oracle = HostOracle::new(&*session.host);
            classify_segment(&context, &views, &oracle)
        };
        let bindings = classified.map_err(|err| session.fail(err))?;

        let lateral = required(session, &bindings, RoleSlot::Lateral, component)?;
        let axial = required(session, &bindings, RoleSlot::Axial, component)?;
        let clocking = required(session, &bindings, RoleSlot::Angular, component)?;
        let right_plane = nth_entity(
            session,
            Some(component),
            FeatureType::RefPlane,
            RIGHT_PLANE_ORDINAL,
        )?;

        debug!(component, role = ?lateral.role, "壳体已重建");
        Ok(Self {
            component: component.to_string(),
            left_plane: lateral.component_entity.clone(),
            right_plane,
            lateral: CoincidentMate::bound(lateral.role, &lateral.constraint),
            axial: CoincidentMate::bound(axial.role, &axial.constraint),
            clocking: AngleMate::bound(&clocking.constraint),
        })
    }

    /// 复制模板组件生成新壳体，接在 `previous` 之后。失败时删除已加入的组件。
    pub fn synthesize(
        session: &mut Session<'_>,
        previous: &ShellSegment,
        template: &str,
        length: f64,
    ) -> Result<Self, EngineError> {
        session.ensure_document()?;
        if session.host.find_feature(&previous.component).is_none()
            || session.host.entity_kind(&previous.right_plane).is_none()
        {
            return Err(session.fail(EngineError::EntityNotFound(previous.right_plane.to_string())));
        }
        let Some(path) = session.host.component_path(template) else {
            return Err(session.fail(EngineError::TemplateMissing(template.to_string())));
        };
        let Some(id) = session.host.add_component(&path) else {
            return Err(session.fail(EngineError::TemplateMissing(path)));
        };

        let segment = match Self::wire(session, id, &path, previous) {
            Ok(segment) => segment,
            Err(err) => {
                discard_partial(session, Some(id), &[]);
                return Err(session.fail(err));
            }
        };
        segment.change_length(session, length);
        info!(shell = %segment.component, previous = %previous.component, length, "已添加圆柱壳体");
        Ok(segment)
    }

    /// 命名新组件并创建侧向、轴向与角度三条配合。
    fn wire(
        session: &mut Session<'_>,
        id: FeatureId,
        path: &str,
        previous: &ShellSegment,
    ) -> Result<Self, EngineError> {
        let count = session.host.top_level_components().len();
        let (_, name) = next_free_name(&*session.host, SHELL_NAME, count);

        session.host.clear_selection();
        let independent = session.host.select(Selectable::Feature(id), false)
            && session.host.make_independent(&independent_path(path, &name));
        session.host.clear_selection();
        if !independent {
            session
                .warnings
                .add_warning(format!("无法将 {name} 另存为独立零件"));
        }
        if !session.host.rename_feature(id, &name) {
            return Err(EngineError::SynthesisFailed(name));
        }

        let host = &*session.host;
        let scope = Some(name.as_str());
        let left_plane = find_entity(host, scope, FeatureType::RefPlane, LEFT_PLANE_ORDINAL)?;
        let right_plane = find_entity(host, scope, FeatureType::RefPlane, RIGHT_PLANE_ORDINAL)?;
        let component_front = find_entity(host, scope, FeatureType::RefPlane, 1)?;
        let component_axis = find_entity(host, scope, FeatureType::RefAxis, 1)?;
        let assembly_front = find_entity(host, None, FeatureType::RefPlane, 1)?;
        let assembly_axis = find_entity(host, None, FeatureType::RefAxis, 1)?;

        let mut segment = Self {
            component: name.clone(),
            left_plane,
            right_plane,
            lateral: CoincidentMate::unset(ConstraintRole::LateralJoin(
                LateralKind::SegmentToSegment,
            )),
            axial: CoincidentMate::unset(ConstraintRole::AxialJoin),
            clocking: AngleMate::unset(),
        };
        let wired = segment.lateral.create(
            session,
            &segment.left_plane,
            &previous.right_plane,
            MateAlignment::AntiAligned,
            &format!("{name} - {LEFT_PLANE_NAME}"),
        ) && segment.axial.create(
            session,
            &component_axis,
            &assembly_axis,
            MateAlignment::AntiAligned,
            &format!("{name} - {CENTER_AXIS_NAME}"),
        ) && segment.clocking.create(
            session,
            &assembly_front,
            &component_front,
            &assembly_axis,
            CLOCKING_ANGLE,
            false,
            &format!("{name} - {FRONT_PLANE_NAME}"),
        );
        if !wired {
            return Err(EngineError::SynthesisFailed(name));
        }
        Ok(segment)
    }

    /// 改写长度尺寸并强制重建。
    pub fn change_length(&self, session: &mut Session<'_>, length: f64) -> bool {
        if !(length.is_finite() && length > 0.0) {
            session
                .warnings
                .add_warning(format!("{} 的长度 {length} 无效", self.component));
            return false;
        }
        if !session
            .host
            .set_dimension(&self.component, LENGTH_DIMENSION, length)
        {
            session
                .warnings
                .add_warning(format!("无法修改 {} 的长度", self.component));
            return false;
        }
        session.host.force_rebuild();
        true
    }

    pub fn length(&self, host: &dyn HostEngine) -> Option<f64> {
        host.dimension(&self.component, LENGTH_DIMENSION)
    }

    /// 让侧向连接改接 `plane`，保留本段一侧的实体。
    pub fn rejoin(&mut self, session: &mut Session<'_>, plane: &EntityRef) -> bool {
        let Some(entities) = self.lateral.entities(&*session.host) else {
            session
                .warnings
                .add_warning(format!("找不到 {} 的侧向连接", self.component));
            return false;
        };
        let rejoined = if entities[0] == self.left_plane {
            self.lateral.edit(session, None, Some(plane))
        } else {
            self.lateral.edit(session, Some(plane), None)
        };
        if rejoined {
            debug!(shell = %self.component, plane = %plane, "侧向连接已改接");
        }
        rejoined
    }

    #[inline]
    pub fn left_plane(&self) -> &EntityRef {
        &self.left_plane
    }

    #[inline]
    pub fn right_plane(&self) -> &EntityRef {
        &self.right_plane
    }

    #[inline]
    pub fn lateral(&self) -> &CoincidentMate {
        &self.lateral
    }

    #[inline]
    pub fn axial(&self) -> &CoincidentMate {
        &self.axial
    }

    #[inline]
    pub fn clocking(&self) -> &AngleMate {
        &self.clocking
    }
}

impl Segment for ShellSegment {
    fn component(&self) -> &str {
        &self.component
    }

    fn boundary_plane(&self) -> &EntityRef {
        &self.right_plane
    }

    /// 删除组件，宿主一并移除其配合。
    fn remove(&mut self, session: &mut Session<'_>) -> bool {
        let removed = delete_features(session, &[&self.component]);
        if removed {
            info!(shell = %self.component, "已移除圆柱壳体");
        } else {
            session
                .warnings
                .add_warning(format!("无法删除 {}", self.component));
        }
        removed
    }
}

fn required<'b>(
    session: &mut Session<'_>,
    bindings: &'b RoleBindings,
    slot: RoleSlot,
    component: &str,
) -> Result<&'b Classification, EngineError> {
    bindings.get(slot).ok_or_else(|| {
        session.fail(EngineError::IncompleteClassification {
            component: component.to_string(),
            missing: vec![slot],
        })
    })
}

fn nth_entity(
    session: &mut Session<'_>,
    scope: Option<&str>,
    feature_type: FeatureType,
    ordinal: usize,
) -> Result<EntityRef, EngineError> {
    find_entity(&*session.host, scope, feature_type, ordinal).map_err(|err| session.fail(err))
}

fn find_entity(
    host: &dyn HostEngine,
    scope: Option<&str>,
    feature_type: FeatureType,
    ordinal: usize,
) -> Result<EntityRef, EngineError> {
    host.nth_feature_of_type(scope, feature_type, ordinal)
        .ok_or_else(|| {
            let owner = scope.unwrap_or("assembly");
            EngineError::EntityNotFound(format!("{feature_type:?} #{ordinal} in {owner}"))
        })
}

/// 新零件与模板放在同一目录，沿用模板扩展名。
fn independent_path(template_path: &str, name: &str) -> String {
    let split = template_path.rfind(['/', '\\']).map_or(0, |index| index + 1);
    let (directory, file) = template_path.split_at(split);
    let extension = file.rfind('.').map_or("", |dot| &file[dot..]);
    format!("{directory}{name}{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::ConstraintHandle;
    use crate::scene::{SHELL_RIGHT_PLANE_NAME, Scene};
    use crate::warnings::WarningService;

    const SHELL_PATH: &str = "C:/parts/Shell.SLDPRT";

    fn fixture() -> (Scene, String, WarningService) {
        let mut scene = Scene::new();
        let demo = scene
            .populate_shell_demo(SHELL_PATH, 1.0)
            .expect("populate shell");
        (scene, demo.head, WarningService::new())
    }

    #[test]
    fn head_rehydrates_with_assembly_join() {
        let (mut scene, head, mut warnings) = fixture();
        let mut session = Session::new(&mut scene, &mut warnings);
        let shell = ShellSegment::rehydrate(&mut session, &head, None).expect("rehydrate");

        assert_eq!(
            shell.lateral().role(),
            ConstraintRole::LateralJoin(LateralKind::SegmentToAssembly)
        );
        assert_eq!(shell.left_plane(), &EntityRef::in_component(&head, LEFT_PLANE_NAME));
        assert_eq!(
            shell.right_plane(),
            &EntityRef::in_component(&head, SHELL_RIGHT_PLANE_NAME)
        );
        assert_eq!(shell.length(&scene), Some(1.0));
    }

    #[test]
    fn synthesized_shell_joins_previous_right_plane() {
        let (mut scene, head, mut warnings) = fixture();
        let mut session = Session::new(&mut scene, &mut warnings);
        let first = ShellSegment::rehydrate(&mut session, &head, None).expect("rehydrate");
        let second =
            ShellSegment::synthesize(&mut session, &first, &head, 2.0).expect("synthesize");

        assert_eq!(second.component(), "Cylindrical Shell 2");
        let entities = second.lateral().entities(&scene).expect("lateral");
        assert_eq!(&entities[1], first.right_plane());
        let (angle, flip) = second.clocking().angle(&scene).expect("clocking");
        assert_eq!(angle, 0.7853981633974483);
        assert!(!flip);
        assert_eq!(second.length(&scene), Some(2.0));
        assert_eq!(
            scene.component_path("Cylindrical Shell 2").as_deref(),
            Some("C:/parts/Cylindrical Shell 2.SLDPRT")
        );
        assert!(warnings.is_error_free());
    }

    #[test]
    fn synthesized_shell_rehydrates_with_segment_join() {
        let (mut scene, head, mut warnings) = fixture();
        let mut session = Session::new(&mut scene, &mut warnings);
        let first = ShellSegment::rehydrate(&mut session, &head, None).expect("rehydrate");
        ShellSegment::synthesize(&mut session, &first, &head, 1.0).expect("synthesize");

        let again = ShellSegment::rehydrate(&mut session, "Cylindrical Shell 2", Some(&head))
            .expect("rehydrate second");
        assert_eq!(
            again.lateral().role(),
            ConstraintRole::LateralJoin(LateralKind::SegmentToSegment)
        );
        assert_eq!(again.lateral().name(), Some("Cylindrical Shell 2 - Left Plane"));

        // 首段的配合集合中包含后继段的侧向连接，应被跳过
        ShellSegment::rehydrate(&mut session, &head, None).expect("head still classifies");
    }

    fn delete_named(scene: &mut Scene, name: &str) {
        let id = scene.find_feature(name).expect("feature to delete");
        scene.clear_selection();
        assert!(scene.select(Selectable::Feature(id), false));
        assert!(scene.delete_selection());
    }

    #[test]
    fn synthesize_refuses_deleted_previous() {
        let (mut scene, head, mut warnings) = fixture();
        let mut session = Session::new(&mut scene, &mut warnings);
        let first = ShellSegment::rehydrate(&mut session, &head, None).expect("rehydrate");
        let second =
            ShellSegment::synthesize(&mut session, &first, &head, 1.0).expect("synthesize");
        drop(session);
        delete_named(&mut scene, second.component());

        let mut session = Session::new(&mut scene, &mut warnings);
        let err = ShellSegment::synthesize(&mut session, &second, &head, 1.0)
            .expect_err("previous is gone");
        assert!(matches!(err, EngineError::EntityNotFound(_)));
        assert_eq!(scene.top_level_components(), vec![head.clone()]);
        assert_eq!(warnings.errors().len(), 1);
    }

    #[test]
    fn failed_wiring_removes_added_component() {
        let (mut scene, head, mut warnings) = fixture();
        let mut session = Session::new(&mut scene, &mut warnings);
        let first = ShellSegment::rehydrate(&mut session, &head, None).expect("rehydrate");
        drop(session);
        delete_named(&mut scene, crate::scene::ASSEMBLY_AXIS_NAME);
        let before: Vec<String> = scene
            .document()
            .expect("document")
            .features()
            .map(|(_, feature)| feature.name().to_string())
            .collect();

        let mut session = Session::new(&mut scene, &mut warnings);
        let err = ShellSegment::synthesize(&mut session, &first, &head, 1.0)
            .expect_err("assembly axis is gone");
        assert!(matches!(err, EngineError::EntityNotFound(_)));
        let after: Vec<String> = scene
            .document()
            .expect("document")
            .features()
            .map(|(_, feature)| feature.name().to_string())
            .collect();
        assert_eq!(after, before);
        assert!(scene.find_feature("Cylindrical Shell 2").is_none());
        assert_eq!(warnings.errors().len(), 1);
    }

    #[test]
    fn invalid_length_is_a_warning() {
        let (mut scene, head, mut warnings) = fixture();
        let mut session = Session::new(&mut scene, &mut warnings);
        let shell = ShellSegment::rehydrate(&mut session, &head, None).expect("rehydrate");

        assert!(!shell.change_length(&mut session, -1.0));
        assert!(warnings.is_error_free());
        assert_eq!(warnings.warnings().len(), 1);
    }

    #[test]
    fn rehydrate_requires_three_constraints() {
        let (mut scene, head, mut warnings) = fixture();
        let clocking = scene
            .find_feature(&format!("{head} - {FRONT_PLANE_NAME}"))
            .expect("clocking");
        scene.select(Selectable::Feature(clocking), false);
        scene.delete_selection();

        let mut session = Session::new(&mut scene, &mut warnings);
        let err = ShellSegment::rehydrate(&mut session, &head, None).expect_err("too few");
        assert!(matches!(err, EngineError::InsufficientConstraints { found: 2, .. }));
        assert!(warnings.has_errors());
    }

    #[test]
    fn closed_document_is_a_precondition_error() {
        let mut scene = Scene::without_document();
        let mut warnings = WarningService::new();
        let mut session = Session::new(&mut scene, &mut warnings);
        let err = ShellSegment::rehydrate(&mut session, "Cylindrical Shell 1", None)
            .expect_err("no document");
        assert_eq!(err, EngineError::DocumentNotInitialized);
    }

    #[test]
    fn independent_path_keeps_directory_and_extension() {
        assert_eq!(
            independent_path("C:\\Parts\\Shell ø1600.SLDPRT", "Cylindrical Shell 3"),
            "C:\\Parts\\Cylindrical Shell 3.SLDPRT"
        );
        assert_eq!(independent_path("shell", "Cylindrical Shell 2"), "Cylindrical Shell 2");
    }
}
