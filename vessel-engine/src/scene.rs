use std::f64::consts::PI;

use tracing::debug;
use vessel_core::document::{
    AssemblyDocument, EntityKind, EntityRef, Feature, FeatureId, FeatureType, Mate, MateAlignment,
    MateKind, PartDefinition, PlaneOffset, RefAxis, RefPlane,
};
use vessel_core::geometry::{DVec3, MajorPlane, Placement};

use crate::errors::EngineError;
use crate::events::{DocumentChange, DocumentEvents, SubscriptionId};
use crate::host::{HostEngine, Selectable};
use crate::segments::{end_cap, shell};

/// 装配体中心轴的名称。
pub const ASSEMBLY_AXIS_NAME: &str = "Center Axis";
/// 壳体零件第 5 个参考平面（右端面）的名称。
pub const SHELL_RIGHT_PLANE_NAME: &str = "Right End Plane";

const MAX_OFFSET_DEPTH: usize = 64;

/// 内存宿主：维护装配体文档、有序选择集与变更订阅。
///
/// 只根据角度配合与前视面重合配合推导组件朝向，不做约束求解。
#[derive(Debug)]
pub struct Scene {
    document: Option<AssemblyDocument>,
    selection: Vec<Selectable>,
    events: DocumentEvents,
    #[cfg(test)]
    component_quota: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ShellDemo {
    pub head: String,
    pub template_path: String,
}

#[derive(Debug, Clone)]
pub struct EndCapDemo {
    pub left: String,
    pub right: String,
    pub left_position_plane: String,
    pub right_position_plane: String,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_document(AssemblyDocument::new("Assembly1"))
    }

    /// 使用现有文档初始化场景。
    pub fn with_document(document: AssemblyDocument) -> Self {
        let mut scene = Self {
            document: Some(document),
            selection: Vec::new(),
            events: DocumentEvents::new(),
            #[cfg(test)]
            component_quota: None,
        };
        scene.solve();
        scene
    }

    /// 没有打开文档的场景，所有宿主操作都会失败。
    pub fn without_document() -> Self {
        Self {
            document: None,
            selection: Vec::new(),
            events: DocumentEvents::new(),
            #[cfg(test)]
            component_quota: None,
        }
    }

    /// 之后只接受 `count` 次加入组件，用于模拟宿主中途拒绝。
    #[cfg(test)]
    pub(crate) fn refuse_components_after(&mut self, count: usize) {
        self.component_quota = Some(count);
    }

    #[inline]
    pub fn document(&self) -> Option<&AssemblyDocument> {
        self.document.as_ref()
    }

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&DocumentChange) + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    #[inline]
    pub fn selection(&self) -> &[Selectable] {
        &self.selection
    }

    #[inline]
    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// 建立只含首段壳体的演示装配体：壳体左端面贴合装配体右视面，中心轴反向重合，前视面成 45° 角。
    pub fn populate_shell_demo(
        &mut self,
        template_path: &str,
        length: f64,
    ) -> Result<ShellDemo, EngineError> {
        self.selection.clear();
        let document = self
            .document
            .get_or_insert_with(|| AssemblyDocument::new("Assembly1"));
        document.register_part(shell_part(template_path, length));
        ensure_assembly_axis(document);

        let id = document
            .add_component(template_path)
            .ok_or_else(|| EngineError::TemplateMissing(template_path.to_string()))?;
        let head = format!("{} 1", shell::SHELL_NAME);
        document.rename(id, &head);

        document.push(Feature::Mate(Mate::coincident(
            format!("{head} - {}", shell::LEFT_PLANE_NAME),
            EntityRef::in_component(&head, shell::LEFT_PLANE_NAME),
            EntityRef::assembly(MajorPlane::Right.label()),
            MateAlignment::AntiAligned,
        )));
        document.push(Feature::Mate(Mate::coincident(
            format!("{head} - {}", shell::CENTER_AXIS_NAME),
            EntityRef::in_component(&head, shell::CENTER_AXIS_NAME),
            EntityRef::assembly(ASSEMBLY_AXIS_NAME),
            MateAlignment::AntiAligned,
        )));
        document.push(Feature::Mate(Mate::angle(
            format!("{head} - {}", shell::FRONT_PLANE_NAME),
            EntityRef::assembly(MajorPlane::Front.label()),
            EntityRef::in_component(&head, MajorPlane::Front.label()),
            Some(EntityRef::assembly(ASSEMBLY_AXIS_NAME)),
            shell::CLOCKING_ANGLE,
            false,
        )));
        self.solve();

        debug!(head = %head, template = template_path, "演示壳体已创建");
        Ok(ShellDemo {
            head,
            template_path: template_path.to_string(),
        })
    }

    /// 建立左右两个端盖的演示装配体。左端盖定位面与右视面重合，右端盖定位面相对左端盖偏移 `distance`。
    pub fn populate_end_cap_demo(
        &mut self,
        template_path: &str,
        distance: f64,
    ) -> Result<EndCapDemo, EngineError> {
        self.selection.clear();
        let document = self
            .document
            .get_or_insert_with(|| AssemblyDocument::new("Assembly1"));
        document.register_part(end_cap_part(template_path));
        ensure_assembly_axis(document);

        let left_position_plane = format!("Left End {}", end_cap::POSITION_PLANE_NAME);
        let right_position_plane = format!("Right End {}", end_cap::POSITION_PLANE_NAME);
        document.push(Feature::RefPlane(RefPlane::offset_from(
            &left_position_plane,
            PlaneOffset {
                reference: EntityRef::assembly(MajorPlane::Right.label()),
                distance: 0.0,
                flip: false,
            },
        )));
        document.push(Feature::RefPlane(RefPlane::offset_from(
            &right_position_plane,
            PlaneOffset {
                reference: EntityRef::assembly(&left_position_plane),
                distance,
                flip: false,
            },
        )));

        let sides = [
            ("Left End", &left_position_plane, MateAlignment::Aligned),
            ("Right End", &right_position_plane, MateAlignment::AntiAligned),
        ];
        for (name, position_plane, frontal) in sides {
            let id = document
                .add_component(template_path)
                .ok_or_else(|| EngineError::TemplateMissing(template_path.to_string()))?;
            document.rename(id, name);
            document.push(Feature::Mate(Mate::coincident(
                format!("{name} - {}", MajorPlane::Right.label()),
                EntityRef::assembly(position_plane.as_str()),
                EntityRef::in_component(name, MajorPlane::Right.label()),
                MateAlignment::Aligned,
            )));
            document.push(Feature::Mate(Mate::coincident(
                format!("{name} - {}", MajorPlane::Front.label()),
                EntityRef::assembly(MajorPlane::Front.label()),
                EntityRef::in_component(name, MajorPlane::Front.label()),
                frontal,
            )));
            document.push(Feature::Mate(Mate::coincident(
                format!("{name} - {}", end_cap::CENTER_AXIS_NAME),
                EntityRef::assembly(ASSEMBLY_AXIS_NAME),
                EntityRef::in_component(name, end_cap::CENTER_AXIS_NAME),
                frontal.toggled(),
            )));
        }
        self.solve();

        debug!(template = template_path, distance, "演示端盖已创建");
        Ok(EndCapDemo {
            left: "Left End".to_string(),
            right: "Right End".to_string(),
            left_position_plane,
            right_position_plane,
        })
    }

    fn emit(&mut self, change: DocumentChange) {
        debug!(?change, "文档变更");
        self.events.emit(change);
    }

    /// 根据未压缩的前视面配合推导各组件朝向。
    fn solve(&mut self) {
        let Some(document) = self.document.as_mut() else {
            return;
        };
        let assembly_front = MajorPlane::Front.label();
        let mut orientations = Vec::new();
        for (_, component) in document.components() {
            let Some(component_front) = component.nth_plane(MajorPlane::Front.ordinal()) else {
                continue;
            };
            let front = EntityRef::in_component(&component.name, &component_front.name);
            let mut rotation = Placement::IDENTITY;
            for (_, mate) in document.mates() {
                if mate.suppressed || !is_frontal(mate, &front, assembly_front) {
                    continue;
                }
                match &mate.kind {
                    MateKind::Angle { angle, flip, .. } => {
                        let angle = if *flip { -angle } else { *angle };
                        rotation = rotation.then(Placement::rotation_x(angle));
                    }
                    MateKind::Coincident if mate.alignment == MateAlignment::AntiAligned => {
                        rotation = rotation.then(Placement::rotation_y(PI));
                    }
                    MateKind::Coincident => {}
                }
            }
            orientations.push((component.name.clone(), rotation));
        }
        for (name, rotation) in orientations {
            if let Some(component) = document.component_mut(&name) {
                component.placement = component.placement.with_rotation_of(rotation);
            }
        }
    }

    /// 前视面重合配合与中心轴配合同时生效且方向一致时无解。
    fn is_over_constrained(&self, component: &str) -> bool {
        let Some(document) = self.document.as_ref() else {
            return false;
        };
        let Some(front) = document
            .component(component)
            .and_then(|c| c.nth_plane(MajorPlane::Front.ordinal()))
            .map(|plane| EntityRef::in_component(component, &plane.name))
        else {
            return false;
        };
        let mut frontal = None;
        let mut axial = None;
        for (_, mate) in document.mates() {
            if mate.suppressed || mate.kind.is_angle() || !mate.touches_component(component) {
                continue;
            }
            if is_frontal(mate, &front, MajorPlane::Front.label()) {
                frontal = Some(mate.alignment);
            } else if mate
                .entities
                .iter()
                .all(|entity| self.entity_kind(entity) == Some(EntityKind::Axis))
            {
                axial = Some(mate.alignment);
            }
        }
        matches!((frontal, axial), (Some(f), Some(a)) if f == a)
    }

    fn selection_entity(&self, target: &Selectable) -> Option<EntityRef> {
        match target {
            Selectable::Entity(entity) => Some(entity.clone()),
            Selectable::Feature(id) => {
                let feature = self.document.as_ref()?.feature(*id)?;
                match feature.feature_type() {
                    FeatureType::RefPlane | FeatureType::RefAxis => {
                        Some(EntityRef::assembly(feature.name()))
                    }
                    _ => None,
                }
            }
        }
    }

    fn selection_feature(&self, target: &Selectable) -> Option<FeatureId> {
        let document = self.document.as_ref()?;
        match target {
            Selectable::Feature(id) => document.feature(*id).map(|_| *id),
            Selectable::Entity(entity) if !entity.is_in_component() => document.find(&entity.name),
            Selectable::Entity(_) => None,
        }
    }

    /// 两个实体可以构成配合：类型一致、至少一个属于组件。
    fn mate_entities(&self, entities: &[EntityRef], angle: bool) -> bool {
        let [first, second] = entities else {
            return false;
        };
        if !first.is_in_component() && !second.is_in_component() {
            return false;
        }
        let (Some(a), Some(b)) = (self.entity_kind(first), self.entity_kind(second)) else {
            return false;
        };
        a == b && a != EntityKind::Other && (!angle || a == EntityKind::Plane)
    }

    fn world_plane(&self, plane: &EntityRef, depth: usize) -> Option<Placement> {
        let document = self.document.as_ref()?;
        match plane.owner() {
            Some(component) => {
                let component = document.component(component)?;
                let local = component.plane(&plane.name)?;
                Some(local.placement.then(component.placement))
            }
            None => {
                let local = document.plane(&plane.name)?;
                match &local.offset {
                    None => Some(local.placement),
                    Some(_) if depth >= MAX_OFFSET_DEPTH => None,
                    Some(offset) => {
                        let base = self.world_plane(&offset.reference, depth + 1)?;
                        let distance = if offset.flip {
                            -offset.distance
                        } else {
                            offset.distance
                        };
                        Some(base.then(Placement::translation(base.normal() * distance)))
                    }
                }
            }
        }
    }

    /// 偏移参考链若回到 `plane` 自身则形成循环。
    fn creates_cycle(&self, plane: &str, reference: &EntityRef) -> bool {
        let Some(document) = self.document.as_ref() else {
            return false;
        };
        let mut current = reference.clone();
        for _ in 0..MAX_OFFSET_DEPTH {
            if current.is_in_component() {
                return false;
            }
            if current.name == plane {
                return true;
            }
            match document.plane(&current.name).and_then(|p| p.offset.as_ref()) {
                Some(offset) => current = offset.reference.clone(),
                None => return false,
            }
        }
        true
    }

    fn mate_components(&self, id: FeatureId) -> Vec<String> {
        self.document
            .as_ref()
            .and_then(|document| document.feature(id))
            .and_then(Feature::as_mate)
            .map(|mate| {
                mate.entities
                    .iter()
                    .filter_map(|entity| entity.component.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn any_over_constrained(&self, components: &[String]) -> bool {
        components
            .iter()
            .any(|component| self.is_over_constrained(component))
    }
}

fn is_frontal(mate: &Mate, component_front: &EntityRef, assembly_front: &str) -> bool {
    let assembly_front = EntityRef::assembly(assembly_front);
    mate.references(component_front) && mate.references(&assembly_front)
}

fn ensure_assembly_axis(document: &mut AssemblyDocument) {
    if document.axis(ASSEMBLY_AXIS_NAME).is_none() {
        document.push(Feature::RefAxis(RefAxis::new(
            ASSEMBLY_AXIS_NAME,
            Placement::IDENTITY,
        )));
    }
}

/// 壳体零件：第 4、5 个参考平面为左右端面，长度由 `D3@Sketch1` 驱动。
pub fn shell_part(path: &str, length: f64) -> PartDefinition {
    let boundary = MajorPlane::Right.local_placement();
    PartDefinition::new(path)
        .with_plane(shell::LEFT_PLANE_NAME, boundary)
        .with_plane(
            SHELL_RIGHT_PLANE_NAME,
            boundary.then(Placement::translation(DVec3::X * length)),
        )
        .with_axis(shell::CENTER_AXIS_NAME, Placement::IDENTITY)
        .with_dimension(shell::LENGTH_DIMENSION, length)
}

pub fn end_cap_part(path: &str) -> PartDefinition {
    PartDefinition::new(path).with_axis(end_cap::CENTER_AXIS_NAME, Placement::IDENTITY)
}

impl HostEngine for Scene {
    fn has_document(&self) -> bool {
        self.document.is_some()
    }

    fn title(&self) -> String {
        self.document
            .as_ref()
            .map(|document| document.title().to_string())
            .unwrap_or_default()
    }

    fn nth_feature_of_type(
        &self,
        scope: Option<&str>,
        feature_type: FeatureType,
        ordinal: usize,
    ) -> Option<EntityRef> {
        let document = self.document.as_ref()?;
        match scope {
            None => document
                .nth_of_type(feature_type, ordinal)
                .map(|(_, feature)| EntityRef::assembly(feature.name())),
            Some(component_name) => {
                let component = document.component(component_name)?;
                let name = match feature_type {
                    FeatureType::RefPlane => &component.nth_plane(ordinal)?.name,
                    FeatureType::RefAxis => &component.nth_axis(ordinal)?.name,
                    FeatureType::Component | FeatureType::Mate => return None,
                };
                Some(EntityRef::in_component(component_name, name.as_str()))
            }
        }
    }

    fn top_level_components(&self) -> Vec<String> {
        self.document
            .as_ref()
            .map(|document| {
                document
                    .components()
                    .map(|(_, component)| component.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn entity_kind(&self, entity: &EntityRef) -> Option<EntityKind> {
        let document = self.document.as_ref()?;
        match entity.owner() {
            Some(component) => {
                let component = document.component(component)?;
                if component.plane(&entity.name).is_some() {
                    Some(EntityKind::Plane)
                } else if component.axis(&entity.name).is_some() {
                    Some(EntityKind::Axis)
                } else {
                    None
                }
            }
            None => {
                let id = document.find(&entity.name)?;
                Some(match document.feature(id)?.feature_type() {
                    FeatureType::RefPlane => EntityKind::Plane,
                    FeatureType::RefAxis => EntityKind::Axis,
                    FeatureType::Component | FeatureType::Mate => EntityKind::Other,
                })
            }
        }
    }

    fn plane_transform(&self, plane: &EntityRef) -> Option<Placement> {
        self.world_plane(plane, 0)
    }

    fn component_transform(&self, component: &str) -> Option<Placement> {
        self.document
            .as_ref()?
            .component(component)
            .map(|component| component.placement)
    }

    fn component_path(&self, component: &str) -> Option<String> {
        self.document
            .as_ref()?
            .component(component)
            .map(|component| component.path.clone())
    }

    fn find_feature(&self, name: &str) -> Option<FeatureId> {
        self.document.as_ref()?.find(name)
    }

    fn feature_name(&self, id: FeatureId) -> Option<String> {
        self.document
            .as_ref()?
            .feature(id)
            .map(|feature| feature.name().to_string())
    }

    fn rename_feature(&mut self, id: FeatureId, name: &str) -> bool {
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        let Some(from) = document.feature(id).map(|f| f.name().to_string()) else {
            return false;
        };
        if !document.rename(id, name) {
            return false;
        }
        if from != name {
            self.selection.clear();
            self.emit(DocumentChange::FeatureRenamed {
                from,
                to: name.to_string(),
            });
        }
        true
    }

    fn set_suppression(&mut self, id: FeatureId, suppressed: bool) -> bool {
        let Some(feature) = self
            .document
            .as_mut()
            .and_then(|document| document.feature_mut(id))
        else {
            return false;
        };
        let previous = feature.is_suppressed();
        let name = feature.name().to_string();
        feature.set_suppressed(suppressed);

        if !suppressed && self.any_over_constrained(&self.mate_components(id)) {
            if let Some(feature) = self.document.as_mut().and_then(|d| d.feature_mut(id)) {
                feature.set_suppressed(previous);
            }
            debug!(feature = %name, "解除压缩后配合无解，已拒绝");
            return false;
        }
        self.solve();
        self.emit(DocumentChange::SuppressionChanged { name, suppressed });
        true
    }

    fn is_suppressed(&self, id: FeatureId) -> Option<bool> {
        self.document
            .as_ref()?
            .feature(id)
            .map(Feature::is_suppressed)
    }

    fn select(&mut self, target: Selectable, append: bool) -> bool {
        let resolvable = match &target {
            Selectable::Entity(entity) => self.entity_kind(entity).is_some(),
            Selectable::Feature(id) => self
                .document
                .as_ref()
                .is_some_and(|document| document.feature(*id).is_some()),
        };
        if !resolvable {
            return false;
        }
        if !append {
            self.selection.clear();
        }
        if !self.selection.contains(&target) {
            self.selection.push(target);
        }
        true
    }

    fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn delete_selection(&mut self) -> bool {
        let targets: Vec<FeatureId> = self
            .selection
            .iter()
            .filter_map(|target| self.selection_feature(target))
            .collect();
        self.selection.clear();
        let Some(document) = self.document.as_mut() else {
            return false;
        };

        let mut removed = Vec::new();
        for id in targets {
            let Some(feature) = document.remove(id) else {
                continue;
            };
            let dependents: Vec<FeatureId> = match &feature {
                Feature::Component(component) => document.mates_of(&component.name),
                Feature::RefPlane(_) | Feature::RefAxis(_) => {
                    let entity = EntityRef::assembly(feature.name());
                    document
                        .mates()
                        .filter(|(_, mate)| mate.references(&entity))
                        .map(|(id, _)| id)
                        .collect()
                }
                Feature::Mate(_) => Vec::new(),
            };
            removed.push(feature.name().to_string());
            for dependent in dependents {
                if let Some(mate) = document.remove(dependent) {
                    removed.push(mate.name().to_string());
                }
            }
        }

        if removed.is_empty() {
            return false;
        }
        self.solve();
        for name in removed {
            self.emit(DocumentChange::FeatureDeleted { name });
        }
        true
    }

    fn add_component(&mut self, path: &str) -> Option<FeatureId> {
        #[cfg(test)]
        if let Some(quota) = self.component_quota.as_mut() {
            if *quota == 0 {
                return None;
            }
            *quota -= 1;
        }
        let document = self.document.as_mut()?;
        let id = document.add_component(path)?;
        let name = document.feature(id)?.name().to_string();
        self.solve();
        self.emit(DocumentChange::ComponentAdded { name });
        Some(id)
    }

    fn make_independent(&mut self, new_path: &str) -> bool {
        let components: Vec<FeatureId> = self
            .selection
            .iter()
            .filter_map(|target| match target {
                Selectable::Feature(id) => Some(*id),
                Selectable::Entity(_) => None,
            })
            .collect();
        let [id] = components.as_slice() else {
            return false;
        };
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        let Some(component) = document.feature(*id).and_then(Feature::as_component) else {
            return false;
        };
        let (name, old_path) = (component.name.clone(), component.path.clone());
        if document.part(new_path).is_none() && !document.copy_part(&old_path, new_path) {
            return false;
        }
        if let Some(component) = document.component_mut(&name) {
            component.path = new_path.to_string();
        }
        self.emit(DocumentChange::ComponentMadeIndependent {
            name,
            path: new_path.to_string(),
        });
        true
    }

    fn mates_of(&self, component: &str) -> Vec<FeatureId> {
        self.document
            .as_ref()
            .map(|document| document.mates_of(component))
            .unwrap_or_default()
    }

    fn mate_definition(&self, id: FeatureId) -> Option<Mate> {
        self.document.as_ref()?.feature(id)?.as_mate().cloned()
    }

    fn create_mate(&mut self, kind: MateKind, alignment: MateAlignment) -> Option<FeatureId> {
        let entities: Vec<EntityRef> = self
            .selection
            .iter()
            .filter_map(|target| self.selection_entity(target))
            .collect();
        if entities.len() != self.selection.len() || !self.mate_entities(&entities, kind.is_angle())
        {
            return None;
        }
        let [first, second] = <[EntityRef; 2]>::try_from(entities).ok()?;
        let document = self.document.as_mut()?;
        let prefix = if kind.is_angle() { "Angle" } else { "Coincident" };
        let name = document.unique_name(prefix);
        let id = document.push(Feature::Mate(Mate {
            name: name.clone(),
            kind,
            entities: [first, second],
            alignment,
            suppressed: false,
        }));
        self.solve();
        self.emit(DocumentChange::MateCreated { name });
        Some(id)
    }

    fn edit_mate(&mut self) -> bool {
        let mut mate_id = None;
        let mut entities = Vec::new();
        for target in &self.selection {
            let is_mate = match target {
                Selectable::Feature(id) => self
                    .document
                    .as_ref()
                    .and_then(|document| document.feature(*id))
                    .is_some_and(|feature| feature.as_mate().is_some()),
                Selectable::Entity(_) => false,
            };
            match (is_mate, target) {
                (true, Selectable::Feature(id)) if mate_id.is_none() => mate_id = Some(*id),
                (true, _) => return false,
                (false, target) => match self.selection_entity(target) {
                    Some(entity) => entities.push(entity),
                    None => return false,
                },
            }
        }
        let Some(id) = mate_id else {
            return false;
        };
        let Some(angle) = self.mate_definition(id).map(|mate| mate.kind.is_angle()) else {
            return false;
        };
        if !self.mate_entities(&entities, angle) {
            return false;
        }
        let Ok(replacement) = <[EntityRef; 2]>::try_from(entities) else {
            return false;
        };
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        let Some(Feature::Mate(mate)) = document.feature_mut(id) else {
            return false;
        };
        mate.entities = replacement;
        let name = mate.name.clone();
        document.reissue(id);
        self.selection.clear();
        self.solve();
        self.emit(DocumentChange::MateEdited { name });
        true
    }

    fn modify_mate(&mut self, id: FeatureId, definition: &Mate) -> bool {
        let Some(current) = self.mate_definition(id) else {
            return false;
        };
        if current.entities != definition.entities {
            return false;
        }
        let updated = Mate {
            name: current.name.clone(),
            ..definition.clone()
        };
        if let Some(Feature::Mate(mate)) = self.document.as_mut().and_then(|d| d.feature_mut(id)) {
            *mate = updated;
        }
        if self.any_over_constrained(&self.mate_components(id)) {
            if let Some(Feature::Mate(mate)) =
                self.document.as_mut().and_then(|d| d.feature_mut(id))
            {
                *mate = current;
            }
            debug!(mate = %definition.name, "配合定义无解，已拒绝");
            return false;
        }
        self.solve();
        self.emit(DocumentChange::MateModified { name: current.name });
        true
    }

    fn insert_offset_plane(&mut self, distance: f64) -> Option<FeatureId> {
        let [target] = self.selection.as_slice() else {
            return None;
        };
        let reference = self.selection_entity(target)?;
        if self.entity_kind(&reference) != Some(EntityKind::Plane) {
            return None;
        }
        let document = self.document.as_mut()?;
        let name = document.unique_name("Plane");
        let id = document.push(Feature::RefPlane(RefPlane::offset_from(
            &name,
            PlaneOffset {
                reference,
                distance,
                flip: false,
            },
        )));
        self.emit(DocumentChange::PlaneCreated { name });
        Some(id)
    }

    fn plane_offset(&self, id: FeatureId) -> Option<PlaneOffset> {
        self.document
            .as_ref()?
            .feature(id)?
            .as_plane()?
            .offset
            .clone()
    }

    fn modify_plane_offset(&mut self, id: FeatureId, offset: &PlaneOffset) -> bool {
        let Some(name) = self
            .document
            .as_ref()
            .and_then(|document| document.feature(id))
            .and_then(Feature::as_plane)
            .filter(|plane| plane.offset.is_some())
            .map(|plane| plane.name.clone())
        else {
            return false;
        };
        if self.entity_kind(&offset.reference) != Some(EntityKind::Plane)
            || self.creates_cycle(&name, &offset.reference)
        {
            return false;
        }
        if let Some(Feature::RefPlane(plane)) =
            self.document.as_mut().and_then(|d| d.feature_mut(id))
        {
            plane.offset = Some(offset.clone());
        }
        self.emit(DocumentChange::PlaneModified { name });
        true
    }

    fn dimension(&self, component: &str, name: &str) -> Option<f64> {
        self.document.as_ref()?.component(component)?.dimension(name)
    }

    fn set_dimension(&mut self, component: &str, name: &str, value: f64) -> bool {
        let Some(target) = self
            .document
            .as_mut()
            .and_then(|document| document.component_mut(component))
        else {
            return false;
        };
        if !target.set_dimension(name, value) {
            return false;
        }
        self.emit(DocumentChange::DimensionChanged {
            component: component.to_string(),
            name: name.to_string(),
            value,
        });
        true
    }

    fn force_rebuild(&mut self) {
        if self.document.is_none() {
            return;
        }
        self.solve();
        self.emit(DocumentChange::Rebuilt);
    }
}
