//! 约束句柄：按名称绑定宿主中的一个配合或偏移平面，每次访问时重新解析标识。

use tracing::debug;
use vessel_core::document::{EntityRef, FeatureId, MateAlignment, MateKind, PlaneOffset};

use crate::classifier::ConstraintRole;
use crate::host::{HostEngine, Selectable, Session};

/// 句柄与宿主特征之间的名称绑定。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    name: Option<String>,
}

impl Binding {
    #[inline]
    pub fn unset() -> Self {
        Self::default()
    }

    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.name.is_some()
    }

    pub fn resolve(&self, host: &dyn HostEngine) -> Option<FeatureId> {
        self.name().and_then(|name| host.find_feature(name))
    }
}

pub trait ConstraintHandle {
    fn role(&self) -> ConstraintRole;
    fn binding(&self) -> &Binding;
    fn binding_mut(&mut self) -> &mut Binding;

    /// 切换方向（重合：同向/反向；角度：翻转；偏移：换侧）。返回宿主是否接受。
    fn change_alignment(&mut self, session: &mut Session<'_>) -> bool;

    #[inline]
    fn name(&self) -> Option<&str> {
        self.binding().name()
    }

    #[inline]
    fn is_set(&self) -> bool {
        self.binding().is_set()
    }

    /// 解析当前标识；未绑定或找不到时记录警告。
    fn resolve(&self, session: &mut Session<'_>) -> Option<FeatureId> {
        let Some(name) = self.binding().name() else {
            session
                .warnings
                .add_warning(format!("{:?} 约束尚未创建", self.role()));
            return None;
        };
        let id = session.host.find_feature(name);
        if id.is_none() {
            session.warnings.add_warning(format!("找不到约束 {name}"));
        }
        id
    }

    fn suppress(&self, session: &mut Session<'_>) -> bool {
        self.resolve(session)
            .is_some_and(|id| session.host.set_suppression(id, true))
    }

    fn unsuppress(&self, session: &mut Session<'_>) -> bool {
        self.resolve(session)
            .is_some_and(|id| session.host.set_suppression(id, false))
    }

    fn is_suppressed(&self, host: &dyn HostEngine) -> Option<bool> {
        self.binding()
            .resolve(host)
            .and_then(|id| host.is_suppressed(id))
    }

    /// 删除宿主特征，成功后句柄回到未绑定状态。
    fn delete(&mut self, session: &mut Session<'_>) -> bool {
        let Some(id) = self.resolve(session) else {
            return false;
        };
        session.host.select(Selectable::Feature(id), false);
        let deleted = session.host.delete_selection();
        session.host.clear_selection();
        if deleted {
            *self.binding_mut() = Binding::unset();
        }
        deleted
    }
}

fn select_entities(session: &mut Session<'_>, entities: &[&EntityRef]) -> bool {
    session.host.clear_selection();
    for (index, entity) in entities.iter().enumerate() {
        if !session
            .host
            .select(Selectable::Entity((*entity).clone()), index > 0)
        {
            session.host.clear_selection();
            session
                .warnings
                .add_error(format!("无法选中实体 {entity}"));
            return false;
        }
    }
    true
}

/// 命名新建的特征并绑定到句柄，随后清空选择集。
fn bind_created(
    session: &mut Session<'_>,
    binding: &mut Binding,
    created: Option<FeatureId>,
    name: &str,
) -> bool {
    session.host.clear_selection();
    let Some(id) = created else {
        session.warnings.add_error(format!("宿主未能创建 {name}"));
        return false;
    };
    if !session.host.rename_feature(id, name) {
        session
            .warnings
            .add_warning(format!("无法将新特征命名为 {name}，保留宿主命名"));
    }
    match session.host.feature_name(id) {
        Some(actual) => {
            debug!(feature = %actual, "约束已创建");
            *binding = Binding::named(actual);
            true
        }
        None => {
            session.warnings.add_error(format!("新建的 {name} 无法解析"));
            false
        }
    }
}

/// 选中配合与替换实体后走宿主的重新定义流程；宿主会重新分配标识，因此完成后按名称重新查找。
fn edit_mate_entities(
    session: &mut Session<'_>,
    binding: &Binding,
    first: Option<&EntityRef>,
    second: Option<&EntityRef>,
) -> bool {
    let Some(name) = binding.name() else {
        session.warnings.add_warning("约束尚未创建，无法编辑");
        return false;
    };
    let Some((id, current)) = session
        .host
        .find_feature(name)
        .and_then(|id| session.host.mate_definition(id).map(|mate| (id, mate)))
    else {
        session.warnings.add_warning(format!("找不到约束 {name}"));
        return false;
    };
    let [old_first, old_second] = current.entities;
    let first = first.cloned().unwrap_or(old_first);
    let second = second.cloned().unwrap_or(old_second);

    session.host.clear_selection();
    let edited = session.host.select(Selectable::Feature(id), false)
        && session.host.select(Selectable::Entity(first), true)
        && session.host.select(Selectable::Entity(second), true)
        && session.host.edit_mate();
    session.host.clear_selection();

    if !edited {
        session
            .warnings
            .add_warning(format!("无法重新定义约束 {name}"));
        return false;
    }
    if session.host.find_feature(name).is_none() {
        session
            .warnings
            .add_warning(format!("重新定义后找不到约束 {name}"));
        return false;
    }
    true
}

/// 重合配合：轴向连接或侧向连接。
#[derive(Debug, Clone, PartialEq)]
pub struct CoincidentMate {
    role: ConstraintRole,
    binding: Binding,
}

impl CoincidentMate {
    pub fn unset(role: ConstraintRole) -> Self {
        Self {
            role,
            binding: Binding::unset(),
        }
    }

    pub fn bound(role: ConstraintRole, name: impl Into<String>) -> Self {
        Self {
            role,
            binding: Binding::named(name),
        }
    }

    /// 依次选中两个实体并创建重合配合。实体无法解析时记录错误，句柄保持未绑定。
    pub fn create(
        &mut self,
        session: &mut Session<'_>,
        first: &EntityRef,
        second: &EntityRef,
        alignment: MateAlignment,
        name: &str,
    ) -> bool {
        if self.binding.is_set() {
            session
                .warnings
                .add_warning(format!("{name} 已绑定到现有约束"));
            return false;
        }
        if !select_entities(session, &[first, second]) {
            return false;
        }
        let created = session.host.create_mate(MateKind::Coincident, alignment);
        bind_created(session, &mut self.binding, created, name)
    }

    /// 替换一个或两个实体；`None` 表示保留原实体。
    pub fn edit(
        &mut self,
        session: &mut Session<'_>,
        first: Option<&EntityRef>,
        second: Option<&EntityRef>,
    ) -> bool {
        edit_mate_entities(session, &self.binding, first, second)
    }

    pub fn entities(&self, host: &dyn HostEngine) -> Option<[EntityRef; 2]> {
        let id = self.binding.resolve(host)?;
        host.mate_definition(id).map(|mate| mate.entities)
    }

    pub fn alignment(&self, host: &dyn HostEngine) -> Option<MateAlignment> {
        let id = self.binding.resolve(host)?;
        host.mate_definition(id).map(|mate| mate.alignment)
    }
}

impl ConstraintHandle for CoincidentMate {
    fn role(&self) -> ConstraintRole {
        self.role
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn change_alignment(&mut self, session: &mut Session<'_>) -> bool {
        let Some(id) = self.resolve(session) else {
            return false;
        };
        let Some(mut definition) = session.host.mate_definition(id) else {
            return false;
        };
        definition.alignment = definition.alignment.toggled();
        session.host.modify_mate(id, &definition)
    }
}

/// 角度配合：壳体的周向定位。
#[derive(Debug, Clone, PartialEq)]
pub struct AngleMate {
    binding: Binding,
}

impl AngleMate {
    pub fn unset() -> Self {
        Self {
            binding: Binding::unset(),
        }
    }

    pub fn bound(name: impl Into<String>) -> Self {
        Self {
            binding: Binding::named(name),
        }
    }

    /// 创建角度配合，`reference` 为旋转参考轴。
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        session: &mut Session<'_>,
        first: &EntityRef,
        second: &EntityRef,
        reference: &EntityRef,
        angle: f64,
        flip: bool,
        name: &str,
    ) -> bool {
        if self.binding.is_set() {
            session
                .warnings
                .add_warning(format!("{name} 已绑定到现有约束"));
            return false;
        }
        if session.host.entity_kind(reference).is_none() {
            session
                .warnings
                .add_error(format!("角度配合参考 {reference} 不存在"));
            return false;
        }
        if !select_entities(session, &[first, second]) {
            return false;
        }
        let created = session.host.create_mate(
            MateKind::Angle {
                angle,
                flip,
                reference: Some(reference.clone()),
            },
            MateAlignment::Aligned,
        );
        bind_created(session, &mut self.binding, created, name)
    }

    pub fn edit(
        &mut self,
        session: &mut Session<'_>,
        first: Option<&EntityRef>,
        second: Option<&EntityRef>,
    ) -> bool {
        edit_mate_entities(session, &self.binding, first, second)
    }

    pub fn entities(&self, host: &dyn HostEngine) -> Option<[EntityRef; 2]> {
        let id = self.binding.resolve(host)?;
        host.mate_definition(id).map(|mate| mate.entities)
    }

    /// 角度值（弧度）与翻转标志。
    pub fn angle(&self, host: &dyn HostEngine) -> Option<(f64, bool)> {
        let id = self.binding.resolve(host)?;
        match host.mate_definition(id)?.kind {
            MateKind::Angle { angle, flip, .. } => Some((angle, flip)),
            MateKind::Coincident => None,
        }
    }
}

impl ConstraintHandle for AngleMate {
    fn role(&self) -> ConstraintRole {
        ConstraintRole::AngularClock
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn change_alignment(&mut self, session: &mut Session<'_>) -> bool {
        let Some(id) = self.resolve(session) else {
            return false;
        };
        let Some(mut definition) = session.host.mate_definition(id) else {
            return false;
        };
        let MateKind::Angle { flip, .. } = &mut definition.kind else {
            return false;
        };
        *flip = !*flip;
        session.host.modify_mate(id, &definition)
    }
}

/// 偏移参考平面：端盖的定位面，由参考平面与距离决定。
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOffset {
    binding: Binding,
}

impl ReferenceOffset {
    pub fn unset() -> Self {
        Self {
            binding: Binding::unset(),
        }
    }

    pub fn bound(name: impl Into<String>) -> Self {
        Self {
            binding: Binding::named(name),
        }
    }

    pub fn create(
        &mut self,
        session: &mut Session<'_>,
        reference: &EntityRef,
        distance: f64,
        name: &str,
    ) -> bool {
        if self.binding.is_set() {
            session
                .warnings
                .add_warning(format!("{name} 已绑定到现有平面"));
            return false;
        }
        if !select_entities(session, &[reference]) {
            return false;
        }
        let created = session.host.insert_offset_plane(distance);
        bind_created(session, &mut self.binding, created, name)
    }

    /// 作为装配体实体引用的平面本身。
    pub fn plane(&self) -> Option<EntityRef> {
        self.binding.name().map(EntityRef::assembly)
    }

    pub fn offset(&self, host: &dyn HostEngine) -> Option<PlaneOffset> {
        let id = self.binding.resolve(host)?;
        host.plane_offset(id)
    }

    pub fn distance(&self, host: &dyn HostEngine) -> Option<f64> {
        self.offset(host).map(|offset| offset.distance)
    }

    pub fn reference(&self, host: &dyn HostEngine) -> Option<EntityRef> {
        self.offset(host).map(|offset| offset.reference)
    }

    pub fn change_distance(&mut self, session: &mut Session<'_>, distance: f64) -> bool {
        self.modify(session, |offset| offset.distance = distance)
    }

    pub fn change_reference(&mut self, session: &mut Session<'_>, reference: &EntityRef) -> bool {
        self.modify(session, |offset| offset.reference = reference.clone())
    }

    fn modify(&self, session: &mut Session<'_>, update: impl FnOnce(&mut PlaneOffset)) -> bool {
        let Some(id) = self.resolve(session) else {
            return false;
        };
        let Some(mut offset) = session.host.plane_offset(id) else {
            return false;
        };
        update(&mut offset);
        session.host.modify_plane_offset(id, &offset)
    }
}

impl ConstraintHandle for ReferenceOffset {
    fn role(&self) -> ConstraintRole {
        ConstraintRole::ReferenceOffset
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn change_alignment(&mut self, session: &mut Session<'_>) -> bool {
        self.modify(session, |offset| offset.flip = !offset.flip)
    }
}
