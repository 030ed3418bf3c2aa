//! 端盖段：定位面为偏移参考平面，组件右视面贴合定位面，前视面与中心轴约束决定朝向。

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};
use vessel_core::document::{EntityRef, FeatureId, FeatureType, MateAlignment};
use vessel_core::geometry::DVec3;

use super::{Segment, constraint_views, delete_features, discard_partial, next_free_name};
use crate::classifier::{
    ClassificationContext, ConstraintRole, LateralKind, RoleSlot, SegmentFamily, classify_segment,
};
use crate::errors::EngineError;
use crate::handles::{CoincidentMate, ConstraintHandle, ReferenceOffset};
use crate::host::{HostEngine, Session};
use crate::predicates::HostOracle;

pub const COMPARTMENT_END_NAME: &str = "Compartment End";
pub const POSITION_PLANE_NAME: &str = "Position Plane";
pub const CENTER_AXIS_NAME: &str = "Center Axis";

/// 端盖朝向：探测向量 (1,0,0) 经组件放置后 x 为正即朝左。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndCapAlignment {
    Left,
    Right,
}

impl EndCapAlignment {
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            EndCapAlignment::Left => EndCapAlignment::Right,
            EndCapAlignment::Right => EndCapAlignment::Left,
        }
    }
}

impl fmt::Display for EndCapAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndCapAlignment::Left => f.write_str("left"),
            EndCapAlignment::Right => f.write_str("right"),
        }
    }
}

impl FromStr for EndCapAlignment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "left" => Ok(EndCapAlignment::Left),
            "right" => Ok(EndCapAlignment::Right),
            other => Err(format!("未知的端盖朝向：{other}")),
        }
    }
}

/// 翻转流程的步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipStage {
    SuppressAxial,
    FlipFrontal,
    FlipAxial,
    RestoreAxial,
}

/// 翻转结果。`Indeterminate` 表示流程中途失败且未回滚，调用方需重新查询朝向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipOutcome {
    Unchanged,
    Flipped,
    Indeterminate {
        failed: FlipStage,
        axial_suppressed: bool,
    },
    /// 无法读取当前朝向，未做任何修改。
    Unresolved,
}

#[derive(Debug, Clone)]
pub struct EndCapSegment {
    component: String,
    position_plane: EntityRef,
    position: ReferenceOffset,
    position_join: CoincidentMate,
    frontal: CoincidentMate,
    axial: CoincidentMate,
}

impl EndCapSegment {
    pub fn rehydrate(session: &mut Session<'_>, component: &str) -> Result<Self, EngineError> {
        session.ensure_document()?;
        let context = ClassificationContext {
            component,
            previous: None,
            family: SegmentFamily::EndCap,
        };
        let classified = {
            let views = constraint_views(&*session.host, component);
            let oracle = HostOracle::new(&*session.host);
            classify_segment(&context, &views, &oracle)
        };
        let bindings = classified.map_err(|err| session.fail(err))?;

        let (Some(join), Some(frontal), Some(axial)) = (
            bindings.get(RoleSlot::Offset),
            bindings.get(RoleSlot::Lateral),
            bindings.get(RoleSlot::Axial),
        ) else {
            let missing = bindings.missing(SegmentFamily::EndCap);
            return Err(session.fail(EngineError::IncompleteClassification {
                component: component.to_string(),
                missing,
            }));
        };

        debug!(component, position = %join.other_entity, "端盖已重建");
        Ok(Self {
            component: component.to_string(),
            position_plane: join.other_entity.clone(),
            position: ReferenceOffset::bound(&join.other_entity.name),
            position_join: CoincidentMate::bound(join.role, &join.constraint),
            frontal: CoincidentMate::bound(frontal.role, &frontal.constraint),
            axial: CoincidentMate::bound(axial.role, &axial.constraint),
        })
    }

    /// 在 `reference` 定位面右侧 `distance` 处新建定位面，加入模板组件并连线，最后设置朝向。
    /// 任一步失败时删除已建的定位面与组件。
    pub fn synthesize(
        session: &mut Session<'_>,
        reference: &EntityRef,
        template_path: &str,
        alignment: EndCapAlignment,
        distance: f64,
        number: usize,
    ) -> Result<Self, EngineError> {
        session.ensure_document()?;
        let (_, name) = next_free_name(&*session.host, COMPARTMENT_END_NAME, number);

        let mut position = ReferenceOffset::unset();
        if !position.create(
            session,
            reference,
            distance,
            &format!("{name} {POSITION_PLANE_NAME}"),
        ) {
            return Err(session.fail(EngineError::SynthesisFailed(name)));
        }
        let Some(position_plane) = position.plane() else {
            return Err(session.fail(EngineError::SynthesisFailed(name)));
        };

        let mut added = None;
        let wired = Self::wire(
            session,
            &name,
            position_plane.clone(),
            position,
            template_path,
            &mut added,
        );
        let mut segment = match wired {
            Ok(segment) => segment,
            Err(err) => {
                discard_partial(session, added, &[position_plane.name.as_str()]);
                return Err(session.fail(err));
            }
        };

        let outcome = segment.set_alignment(session, alignment);
        info!(end_cap = %name, reference = %reference, distance, ?outcome, "已添加端盖");
        Ok(segment)
    }

    /// 加入组件、命名并创建三条配合。加入成功的组件标识写入 `added`，供失败时撤销。
    fn wire(
        session: &mut Session<'_>,
        name: &str,
        position_plane: EntityRef,
        position: ReferenceOffset,
        template_path: &str,
        added: &mut Option<FeatureId>,
    ) -> Result<Self, EngineError> {
        let Some(id) = session.host.add_component(template_path) else {
            return Err(EngineError::TemplateMissing(template_path.to_string()));
        };
        *added = Some(id);
        if !session.host.rename_feature(id, name) {
            return Err(EngineError::SynthesisFailed(name.to_string()));
        }

        let lookups = (
            session
                .host
                .nth_feature_of_type(Some(name), FeatureType::RefPlane, 3),
            session
                .host
                .nth_feature_of_type(Some(name), FeatureType::RefPlane, 1),
            session
                .host
                .nth_feature_of_type(Some(name), FeatureType::RefAxis, 1),
            session.host.nth_feature_of_type(None, FeatureType::RefPlane, 1),
            session.host.nth_feature_of_type(None, FeatureType::RefAxis, 1),
        );
        let (
            Some(component_right),
            Some(component_front),
            Some(component_axis),
            Some(assembly_front),
            Some(assembly_axis),
        ) = lookups
        else {
            return Err(EngineError::EntityNotFound(format!(
                "reference geometry for {name}"
            )));
        };

        let mut segment = Self {
            component: name.to_string(),
            position_plane,
            position,
            position_join: CoincidentMate::unset(ConstraintRole::ReferenceOffset),
            frontal: CoincidentMate::unset(ConstraintRole::LateralJoin(LateralKind::Frontal)),
            axial: CoincidentMate::unset(ConstraintRole::AxialJoin),
        };
        let wired = segment.position_join.create(
            session,
            &segment.position_plane,
            &component_right,
            MateAlignment::Aligned,
            &format!("{name} - Right Plane"),
        ) && segment.frontal.create(
            session,
            &assembly_front,
            &component_front,
            MateAlignment::Aligned,
            &format!("{name} - Front Plane"),
        ) && segment.axial.create(
            session,
            &assembly_axis,
            &component_axis,
            MateAlignment::AntiAligned,
            &format!("{name} - {CENTER_AXIS_NAME}"),
        );
        if !wired {
            return Err(EngineError::SynthesisFailed(name.to_string()));
        }
        Ok(segment)
    }

    pub fn alignment(&self, host: &dyn HostEngine) -> Option<EndCapAlignment> {
        let axis = host
            .component_transform(&self.component)?
            .transform_vector(DVec3::X);
        Some(if axis.x > 0.0 {
            EndCapAlignment::Left
        } else {
            EndCapAlignment::Right
        })
    }

    /// 只在当前朝向与目标不同时翻转。
    pub fn set_alignment(
        &mut self,
        session: &mut Session<'_>,
        alignment: EndCapAlignment,
    ) -> FlipOutcome {
        match self.alignment(&*session.host) {
            None => {
                session
                    .warnings
                    .add_warning(format!("无法读取 {} 的朝向", self.component));
                FlipOutcome::Unresolved
            }
            Some(current) if current == alignment => FlipOutcome::Unchanged,
            Some(_) => self.change_alignment(session),
        }
    }

    /// 压缩中心轴配合，翻转前视面与中心轴配合，再解除压缩。任一步失败即停止，不回滚。
    pub fn change_alignment(&mut self, session: &mut Session<'_>) -> FlipOutcome {
        let component = self.component.clone();
        let fail = |session: &mut Session<'_>, failed: FlipStage, axial_suppressed: bool| {
            session.warnings.add_warning(format!(
                "{component} 的朝向未能翻转，停在 {failed:?} 步骤"
            ));
            FlipOutcome::Indeterminate {
                failed,
                axial_suppressed,
            }
        };

        if !self.axial.suppress(session) {
            return fail(session, FlipStage::SuppressAxial, false);
        }
        if !self.frontal.change_alignment(session) {
            return fail(session, FlipStage::FlipFrontal, true);
        }
        if !self.axial.change_alignment(session) {
            return fail(session, FlipStage::FlipAxial, true);
        }
        if !self.axial.unsuppress(session) {
            return fail(session, FlipStage::RestoreAxial, true);
        }
        debug!(end_cap = %self.component, "端盖朝向已翻转");
        FlipOutcome::Flipped
    }

    pub fn change_distance(&mut self, session: &mut Session<'_>, distance: f64) -> bool {
        let changed = self.position.change_distance(session, distance);
        if !changed {
            session
                .warnings
                .add_warning(format!("无法修改 {} 的定位距离", self.component));
        }
        changed
    }

    /// 让定位面改为参照 `reference`。
    pub fn change_reference_end(&mut self, session: &mut Session<'_>, reference: &EntityRef) -> bool {
        let changed = self.position.change_reference(session, reference);
        if changed {
            debug!(end_cap = %self.component, reference = %reference, "定位参考已改接");
        } else {
            session
                .warnings
                .add_warning(format!("无法将 {} 的定位参考改为 {reference}", self.component));
        }
        changed
    }

    pub fn suppress(&mut self, session: &mut Session<'_>) -> bool {
        self.set_suppressed(session, true)
    }

    pub fn unsuppress(&mut self, session: &mut Session<'_>) -> bool {
        self.set_suppressed(session, false)
    }

    fn set_suppressed(&mut self, session: &mut Session<'_>, suppressed: bool) -> bool {
        let mut ok = true;
        for name in [self.component.as_str(), self.position_plane.name.as_str()] {
            let applied = session
                .host
                .find_feature(name)
                .is_some_and(|id| session.host.set_suppression(id, suppressed));
            if !applied {
                session
                    .warnings
                    .add_warning(format!("无法切换 {name} 的压缩状态"));
                ok = false;
            }
        }
        ok
    }

    pub fn distance(&self, host: &dyn HostEngine) -> Option<f64> {
        self.position.distance(host)
    }

    /// 定位面当前参照的平面。
    pub fn reference(&self, host: &dyn HostEngine) -> Option<EntityRef> {
        self.position.reference(host)
    }

    #[inline]
    pub fn position_plane(&self) -> &EntityRef {
        &self.position_plane
    }

    #[inline]
    pub fn position_join(&self) -> &CoincidentMate {
        &self.position_join
    }

    #[inline]
    pub fn frontal(&self) -> &CoincidentMate {
        &self.frontal
    }

    #[inline]
    pub fn axial(&self) -> &CoincidentMate {
        &self.axial
    }
}

impl Segment for EndCapSegment {
    fn component(&self) -> &str {
        &self.component
    }

    fn boundary_plane(&self) -> &EntityRef {
        &self.position_plane
    }

    /// 删除组件及其定位面。
    fn remove(&mut self, session: &mut Session<'_>) -> bool {
        let removed = delete_features(
            session,
            &[self.component.as_str(), self.position_plane.name.as_str()],
        );
        if removed {
            info!(end_cap = %self.component, "已移除端盖");
        } else {
            session
                .warnings
                .add_warning(format!("无法删除 {}", self.component));
        }
        removed
    }
}
