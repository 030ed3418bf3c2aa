//! 约束角色推断：仅凭几何判定确定组件现有配合各自承担的角色。

use std::fmt;

use tracing::debug;
use vessel_core::document::{EntityRef, Mate, MateKind};
use vessel_core::geometry::MajorPlane;

use crate::errors::EngineError;
use crate::predicates::GeometryOracle;

/// 一个组件至少需要的配合数量。
pub const MIN_CONSTRAINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentFamily {
    Shell,
    EndCap,
}

impl SegmentFamily {
    /// 该类段必须全部绑定的角色槽位。
    pub fn required_slots(self) -> [RoleSlot; 3] {
        match self {
            SegmentFamily::Shell => [RoleSlot::Axial, RoleSlot::Lateral, RoleSlot::Angular],
            SegmentFamily::EndCap => [RoleSlot::Axial, RoleSlot::Lateral, RoleSlot::Offset],
        }
    }

    /// 该类段是否接受此角色；侧向连接还要区分种类。
    fn accepts(self, role: ConstraintRole) -> bool {
        match (self, role) {
            (SegmentFamily::Shell, ConstraintRole::LateralJoin(kind)) => {
                kind != LateralKind::Frontal
            }
            (SegmentFamily::EndCap, ConstraintRole::LateralJoin(kind)) => {
                kind == LateralKind::Frontal
            }
            (family, role) => family.required_slots().contains(&role.slot()),
        }
    }
}

impl fmt::Display for SegmentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentFamily::Shell => f.write_str("cylindrical shell"),
            SegmentFamily::EndCap => f.write_str("end cap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LateralKind {
    SegmentToSegment,
    SegmentToAssembly,
    Frontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintRole {
    AxialJoin,
    LateralJoin(LateralKind),
    AngularClock,
    ReferenceOffset,
}

impl ConstraintRole {
    #[inline]
    pub fn slot(self) -> RoleSlot {
        match self {
            ConstraintRole::AxialJoin => RoleSlot::Axial,
            ConstraintRole::LateralJoin(_) => RoleSlot::Lateral,
            ConstraintRole::AngularClock => RoleSlot::Angular,
            ConstraintRole::ReferenceOffset => RoleSlot::Offset,
        }
    }
}

/// 不区分侧向种类的角色槽位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleSlot {
    Axial,
    Lateral,
    Angular,
    Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintShape {
    Coincident,
    Angle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmbiguityReason {
    BothInAssembly,
    BothInComponent,
    ForeignComponent,
    MultipleMatches(Vec<ConstraintRole>),
    DuplicateRole(RoleSlot),
    RoleNotInFamily(ConstraintRole),
}

impl fmt::Display for AmbiguityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbiguityReason::BothInAssembly => f.write_str("both entities are in the assembly"),
            AmbiguityReason::BothInComponent => f.write_str("both entities are in the component"),
            AmbiguityReason::ForeignComponent => {
                f.write_str("one of the entities is in a different component")
            }
            AmbiguityReason::MultipleMatches(roles) => {
                write!(f, "matches several roles {roles:?}")
            }
            AmbiguityReason::DuplicateRole(slot) => write!(f, "role {slot:?} is already bound"),
            AmbiguityReason::RoleNotInFamily(role) => {
                write!(f, "role {role:?} does not belong to this segment")
            }
        }
    }
}

/// 分类所需的配合信息。
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintView {
    pub name: String,
    pub shape: ConstraintShape,
    pub entities: [EntityRef; 2],
}

impl From<&Mate> for ConstraintView {
    fn from(mate: &Mate) -> Self {
        Self {
            name: mate.name.clone(),
            shape: match mate.kind {
                MateKind::Coincident => ConstraintShape::Coincident,
                MateKind::Angle { .. } => ConstraintShape::Angle,
            },
            entities: mate.entities.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassificationContext<'a> {
    pub component: &'a str,
    /// 同类链中紧邻的前一段。
    pub previous: Option<&'a str>,
    pub family: SegmentFamily,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub constraint: String,
    pub role: ConstraintRole,
    pub component_entity: EntityRef,
    pub other_entity: EntityRef,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleBindings {
    axial: Option<Classification>,
    lateral: Option<Classification>,
    angular: Option<Classification>,
    offset: Option<Classification>,
}

impl RoleBindings {
    pub fn get(&self, slot: RoleSlot) -> Option<&Classification> {
        match slot {
            RoleSlot::Axial => self.axial.as_ref(),
            RoleSlot::Lateral => self.lateral.as_ref(),
            RoleSlot::Angular => self.angular.as_ref(),
            RoleSlot::Offset => self.offset.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: RoleSlot) -> &mut Option<Classification> {
        match slot {
            RoleSlot::Axial => &mut self.axial,
            RoleSlot::Lateral => &mut self.lateral,
            RoleSlot::Angular => &mut self.angular,
            RoleSlot::Offset => &mut self.offset,
        }
    }

    pub fn missing(&self, family: SegmentFamily) -> Vec<RoleSlot> {
        family
            .required_slots()
            .into_iter()
            .filter(|slot| self.get(*slot).is_none())
            .collect()
    }
}

struct RowInput<'a> {
    context: &'a ClassificationContext<'a>,
    component_entity: &'a EntityRef,
    other_entity: &'a EntityRef,
    oracle: &'a dyn GeometryOracle,
}

impl RowInput<'_> {
    fn is_boundary_plane(&self, entity: &EntityRef) -> bool {
        self.oracle.is_plane(entity)
            && self
                .oracle
                .is_parallel_to_major_plane(entity, MajorPlane::Right)
    }

    fn is_front_pair(&self) -> bool {
        self.oracle.is_major_plane(self.component_entity, MajorPlane::Front)
            && !self.oracle.is_in_component(self.other_entity)
            && self.oracle.is_major_plane(self.other_entity, MajorPlane::Front)
    }
}

struct Row {
    shape: ConstraintShape,
    role: ConstraintRole,
    matches: fn(&RowInput<'_>) -> bool,
}

const ROWS: [Row; 6] = [
    Row {
        shape: ConstraintShape::Coincident,
        role: ConstraintRole::LateralJoin(LateralKind::SegmentToSegment),
        matches: |input| {
            let Some(previous) = input.context.previous else {
                return false;
            };
            input.is_boundary_plane(input.component_entity)
                && input
                    .oracle
                    .is_in_specific_component(input.other_entity, previous)
                && input.is_boundary_plane(input.other_entity)
        },
    },
    Row {
        shape: ConstraintShape::Coincident,
        role: ConstraintRole::LateralJoin(LateralKind::SegmentToAssembly),
        matches: |input| {
            input.is_boundary_plane(input.component_entity)
                && !input
                    .oracle
                    .is_major_plane(input.component_entity, MajorPlane::Right)
                && !input.oracle.is_in_component(input.other_entity)
                && input.is_boundary_plane(input.other_entity)
        },
    },
    Row {
        shape: ConstraintShape::Coincident,
        role: ConstraintRole::AxialJoin,
        matches: |input| {
            input.oracle.is_axis(input.component_entity)
                && !input.oracle.is_in_component(input.other_entity)
                && input.oracle.is_axis(input.other_entity)
        },
    },
    Row {
        shape: ConstraintShape::Angle,
        role: ConstraintRole::AngularClock,
        matches: |input| input.is_front_pair(),
    },
    Row {
        shape: ConstraintShape::Coincident,
        role: ConstraintRole::LateralJoin(LateralKind::Frontal),
        matches: |input| input.is_front_pair(),
    },
    Row {
        shape: ConstraintShape::Coincident,
        role: ConstraintRole::ReferenceOffset,
        matches: |input| {
            input.oracle.is_plane(input.component_entity)
                && input
                    .oracle
                    .is_major_plane(input.component_entity, MajorPlane::Right)
                && !input.oracle.is_in_component(input.other_entity)
                && input.is_boundary_plane(input.other_entity)
        },
    },
];

/// 对单个配合分类。不属于本段任何连接（例如后继段的侧向连接）时返回 `Ok(None)`。
pub fn classify_constraint(
    context: &ClassificationContext<'_>,
    constraint: &ConstraintView,
    oracle: &dyn GeometryOracle,
) -> Result<Option<Classification>, EngineError> {
    let ambiguous = |reason| EngineError::AmbiguousConstraint {
        constraint: constraint.name.clone(),
        reason,
    };
    let [first, second] = &constraint.entities;
    let in_target = |entity: &EntityRef| oracle.is_in_specific_component(entity, context.component);

    let (component_entity, other_entity) = match (in_target(first), in_target(second)) {
        (true, true) => return Err(ambiguous(AmbiguityReason::BothInComponent)),
        (true, false) => (first, second),
        (false, true) => (second, first),
        (false, false) if !oracle.is_in_component(first) && !oracle.is_in_component(second) => {
            return Err(ambiguous(AmbiguityReason::BothInAssembly));
        }
        (false, false) => return Err(ambiguous(AmbiguityReason::ForeignComponent)),
    };

    let input = RowInput {
        context,
        component_entity,
        other_entity,
        oracle,
    };
    let matched: Vec<ConstraintRole> = ROWS
        .iter()
        .filter(|row| row.shape == constraint.shape && (row.matches)(&input))
        .map(|row| row.role)
        .collect();

    match matched.as_slice() {
        [] => {
            debug!(
                constraint = %constraint.name,
                component = context.component,
                "配合不属于本段连接，跳过"
            );
            Ok(None)
        }
        [role] => Ok(Some(Classification {
            constraint: constraint.name.clone(),
            role: *role,
            component_entity: component_entity.clone(),
            other_entity: other_entity.clone(),
        })),
        _ => Err(ambiguous(AmbiguityReason::MultipleMatches(matched))),
    }
}

/// 对组件的全部配合分类，并确认该类段所需角色全部绑定。任何错误都会丢弃已有绑定。
pub fn classify_segment(
    context: &ClassificationContext<'_>,
    constraints: &[ConstraintView],
    oracle: &dyn GeometryOracle,
) -> Result<RoleBindings, EngineError> {
    if constraints.len() < MIN_CONSTRAINTS {
        return Err(EngineError::InsufficientConstraints {
            component: context.component.to_string(),
            found: constraints.len(),
        });
    }

    let mut bindings = RoleBindings::default();
    for constraint in constraints {
        let Some(classification) = classify_constraint(context, constraint, oracle)? else {
            continue;
        };
        let role = classification.role;
        let ambiguous = |reason| EngineError::AmbiguousConstraint {
            constraint: constraint.name.clone(),
            reason,
        };
        if !context.family.accepts(role) {
            return Err(ambiguous(AmbiguityReason::RoleNotInFamily(role)));
        }
        let slot = bindings.slot_mut(role.slot());
        if slot.is_some() {
            return Err(ambiguous(AmbiguityReason::DuplicateRole(role.slot())));
        }
        *slot = Some(classification);
    }

    let missing = bindings.missing(context.family);
    if !missing.is_empty() {
        return Err(EngineError::IncompleteClassification {
            component: context.component.to_string(),
            missing,
        });
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default, Clone, Copy)]
    struct Answers {
        plane: bool,
        axis: bool,
        major: Option<MajorPlane>,
        parallel: Option<MajorPlane>,
    }

    /// 按实体逐项给出判定答案的合成判定器。
    #[derive(Default)]
    struct FakeOracle {
        answers: HashMap<EntityRef, Answers>,
    }

    impl FakeOracle {
        fn plane(
            mut self,
            entity: &EntityRef,
            major: Option<MajorPlane>,
            parallel: MajorPlane,
        ) -> Self {
            self.answers.insert(
                entity.clone(),
                Answers {
                    plane: true,
                    major,
                    parallel: Some(parallel),
                    ..Answers::default()
                },
            );
            self
        }

        fn axis(mut self, entity: &EntityRef) -> Self {
            self.answers.insert(
                entity.clone(),
                Answers {
                    axis: true,
                    ..Answers::default()
                },
            );
            self
        }

        fn get(&self, entity: &EntityRef) -> Answers {
            self.answers.get(entity).copied().unwrap_or_default()
        }
    }

    impl GeometryOracle for FakeOracle {
        fn is_plane(&self, entity: &EntityRef) -> bool {
            self.get(entity).plane
        }

        fn is_axis(&self, entity: &EntityRef) -> bool {
            self.get(entity).axis
        }

        fn is_major_plane(&self, entity: &EntityRef, plane: MajorPlane) -> bool {
            self.get(entity).major == Some(plane)
        }

        fn is_parallel_to_major_plane(&self, entity: &EntityRef, plane: MajorPlane) -> bool {
            self.get(entity).parallel == Some(plane)
        }
    }

    const TARGET: &str = "Cylindrical Shell 2";
    const PREVIOUS: &str = "Cylindrical Shell 1";

    fn ce(name: &str) -> EntityRef {
        EntityRef::in_component(TARGET, name)
    }

    fn prev(name: &str) -> EntityRef {
        EntityRef::in_component(PREVIOUS, name)
    }

    fn asm(name: &str) -> EntityRef {
        EntityRef::assembly(name)
    }

    fn oracle() -> FakeOracle {
        FakeOracle::default()
            .plane(&ce("Front Plane"), Some(MajorPlane::Front), MajorPlane::Front)
            .plane(&ce("Right Plane"), Some(MajorPlane::Right), MajorPlane::Right)
            .plane(&ce("Left Plane"), None, MajorPlane::Right)
            .plane(&ce("Right End Plane"), None, MajorPlane::Right)
            .axis(&ce("Center Axis"))
            .plane(&prev("Right End Plane"), None, MajorPlane::Right)
            .plane(&asm("Front Plane"), Some(MajorPlane::Front), MajorPlane::Front)
            .plane(&asm("Right Plane"), Some(MajorPlane::Right), MajorPlane::Right)
            .plane(&asm("Position Plane"), None, MajorPlane::Right)
            .axis(&asm("Center Axis"))
    }

    fn coincident(name: &str, first: EntityRef, second: EntityRef) -> ConstraintView {
        ConstraintView {
            name: name.to_string(),
            shape: ConstraintShape::Coincident,
            entities: [first, second],
        }
    }

    fn angle(name: &str, first: EntityRef, second: EntityRef) -> ConstraintView {
        ConstraintView {
            name: name.to_string(),
            shape: ConstraintShape::Angle,
            entities: [first, second],
        }
    }

    fn context(
        family: SegmentFamily,
        previous: Option<&'static str>,
    ) -> ClassificationContext<'static> {
        ClassificationContext {
            component: TARGET,
            previous,
            family,
        }
    }

    fn role_of(view: &ConstraintView, previous: Option<&'static str>) -> Option<ConstraintRole> {
        classify_constraint(&context(SegmentFamily::Shell, previous), view, &oracle())
            .expect("classification")
            .map(|classification| classification.role)
    }

    #[test]
    fn row_segment_to_segment() {
        let view = coincident("m", ce("Left Plane"), prev("Right End Plane"));
        assert_eq!(
            role_of(&view, Some(PREVIOUS)),
            Some(ConstraintRole::LateralJoin(LateralKind::SegmentToSegment))
        );
        assert_eq!(role_of(&view, None), None);
    }

    #[test]
    fn row_segment_to_assembly() {
        let view = coincident("m", ce("Left Plane"), asm("Right Plane"));
        assert_eq!(
            role_of(&view, None),
            Some(ConstraintRole::LateralJoin(LateralKind::SegmentToAssembly))
        );
    }

    #[test]
    fn row_axial_join_in_either_entity_order() {
        let view = coincident("m", asm("Center Axis"), ce("Center Axis"));
        assert_eq!(role_of(&view, None), Some(ConstraintRole::AxialJoin));
    }

    #[test]
    fn row_angular_clock() {
        let view = angle("m", asm("Front Plane"), ce("Front Plane"));
        assert_eq!(role_of(&view, None), Some(ConstraintRole::AngularClock));
    }

    #[test]
    fn row_frontal() {
        let view = coincident("m", asm("Front Plane"), ce("Front Plane"));
        assert_eq!(
            role_of(&view, None),
            Some(ConstraintRole::LateralJoin(LateralKind::Frontal))
        );
    }

    #[test]
    fn row_reference_offset() {
        let view = coincident("m", asm("Position Plane"), ce("Right Plane"));
        assert_eq!(role_of(&view, None), Some(ConstraintRole::ReferenceOffset));
    }

    #[test]
    fn rows_do_not_overlap() {
        let cases = [
            coincident("1", ce("Left Plane"), prev("Right End Plane")),
            coincident("2", ce("Left Plane"), asm("Right Plane")),
            coincident("3", ce("Center Axis"), asm("Center Axis")),
            angle("4", ce("Front Plane"), asm("Front Plane")),
            coincident("5a", ce("Front Plane"), asm("Front Plane")),
            coincident("5b", ce("Right Plane"), asm("Position Plane")),
        ];
        let oracle = oracle();
        for view in &cases {
            let input = RowInput {
                context: &context(SegmentFamily::Shell, Some(PREVIOUS)),
                component_entity: &view.entities[0],
                other_entity: &view.entities[1],
                oracle: &oracle,
            };
            let hits = ROWS
                .iter()
                .filter(|row| row.shape == view.shape && (row.matches)(&input))
                .count();
            assert_eq!(hits, 1, "constraint {}", view.name);
        }
    }

    #[test]
    fn successor_join_is_skipped() {
        let successor = EntityRef::in_component("Cylindrical Shell 3", "Left Plane");
        let oracle = oracle().plane(&successor, None, MajorPlane::Right);
        let view = coincident("next", successor, ce("Right End Plane"));
        let result =
            classify_constraint(&context(SegmentFamily::Shell, Some(PREVIOUS)), &view, &oracle)
                .expect("classification");
        assert!(result.is_none());
    }

    #[test]
    fn ownership_errors() {
        let cases = [
            (
                coincident("a", asm("Front Plane"), asm("Right Plane")),
                AmbiguityReason::BothInAssembly,
            ),
            (
                coincident("b", ce("Left Plane"), ce("Right Plane")),
                AmbiguityReason::BothInComponent,
            ),
            (
                coincident("c", prev("Right End Plane"), asm("Right Plane")),
                AmbiguityReason::ForeignComponent,
            ),
        ];
        for (view, expected) in cases {
            let err = classify_constraint(&context(SegmentFamily::Shell, None), &view, &oracle())
                .expect_err("ambiguous");
            assert_eq!(
                err,
                EngineError::AmbiguousConstraint {
                    constraint: view.name.clone(),
                    reason: expected,
                }
            );
        }
    }

    #[test]
    fn multiple_matches_are_rejected() {
        // 自相矛盾的判定答案会让同一配合命中两行
        let oracle = oracle()
            .plane(&ce("Odd Plane"), Some(MajorPlane::Front), MajorPlane::Right)
            .plane(&asm("Odd Plane"), Some(MajorPlane::Front), MajorPlane::Right);
        let view = coincident("odd", ce("Odd Plane"), asm("Odd Plane"));
        let err = classify_constraint(&context(SegmentFamily::Shell, None), &view, &oracle)
            .expect_err("ambiguous");
        assert_eq!(
            err,
            EngineError::AmbiguousConstraint {
                constraint: "odd".to_string(),
                reason: AmbiguityReason::MultipleMatches(vec![
                    ConstraintRole::LateralJoin(LateralKind::SegmentToAssembly),
                    ConstraintRole::LateralJoin(LateralKind::Frontal),
                ]),
            }
        );
    }

    fn shell_constraints() -> Vec<ConstraintView> {
        vec![
            coincident("lateral", ce("Left Plane"), prev("Right End Plane")),
            coincident("axial", ce("Center Axis"), asm("Center Axis")),
            angle("clock", asm("Front Plane"), ce("Front Plane")),
        ]
    }

    #[test]
    fn shell_segment_binds_all_roles() {
        let bindings = classify_segment(
            &context(SegmentFamily::Shell, Some(PREVIOUS)),
            &shell_constraints(),
            &oracle(),
        )
        .expect("bindings");
        assert_eq!(bindings.get(RoleSlot::Lateral).map(|c| c.constraint.as_str()), Some("lateral"));
        assert_eq!(bindings.get(RoleSlot::Axial).map(|c| c.constraint.as_str()), Some("axial"));
        assert_eq!(bindings.get(RoleSlot::Angular).map(|c| c.constraint.as_str()), Some("clock"));
        assert!(bindings.get(RoleSlot::Offset).is_none());
        assert_eq!(
            bindings.get(RoleSlot::Lateral).map(|c| c.other_entity.clone()),
            Some(prev("Right End Plane"))
        );
    }

    #[test]
    fn end_cap_segment_binds_all_roles() {
        let constraints = vec![
            coincident("position", asm("Position Plane"), ce("Right Plane")),
            coincident("front", asm("Front Plane"), ce("Front Plane")),
            coincident("axis", asm("Center Axis"), ce("Center Axis")),
        ];
        let bindings =
            classify_segment(&context(SegmentFamily::EndCap, None), &constraints, &oracle())
                .expect("bindings");
        assert_eq!(
            bindings.get(RoleSlot::Lateral).map(|c| c.role),
            Some(ConstraintRole::LateralJoin(LateralKind::Frontal))
        );
        assert_eq!(
            bindings.get(RoleSlot::Offset).map(|c| c.other_entity.clone()),
            Some(asm("Position Plane"))
        );
    }

    #[test]
    fn too_few_constraints() {
        let err = classify_segment(
            &context(SegmentFamily::Shell, Some(PREVIOUS)),
            &shell_constraints()[..2],
            &oracle(),
        )
        .expect_err("insufficient");
        assert_eq!(
            err,
            EngineError::InsufficientConstraints {
                component: TARGET.to_string(),
                found: 2,
            }
        );
    }

    #[test]
    fn missing_role_is_reported() {
        let mut constraints = shell_constraints();
        let successor = EntityRef::in_component("Cylindrical Shell 3", "Left Plane");
        constraints[2] = coincident("stray", ce("Right End Plane"), successor.clone());
        let oracle = oracle().plane(&successor, None, MajorPlane::Right);
        let err = classify_segment(
            &context(SegmentFamily::Shell, Some(PREVIOUS)),
            &constraints,
            &oracle,
        )
        .expect_err("incomplete");
        assert_eq!(
            err,
            EngineError::IncompleteClassification {
                component: TARGET.to_string(),
                missing: vec![RoleSlot::Angular],
            }
        );
    }

    #[test]
    fn duplicate_role_is_rejected() {
        let mut constraints = shell_constraints();
        constraints.push(coincident("axial again", asm("Center Axis"), ce("Center Axis")));
        let err = classify_segment(
            &context(SegmentFamily::Shell, Some(PREVIOUS)),
            &constraints,
            &oracle(),
        )
        .expect_err("duplicate");
        assert_eq!(
            err,
            EngineError::AmbiguousConstraint {
                constraint: "axial again".to_string(),
                reason: AmbiguityReason::DuplicateRole(RoleSlot::Axial),
            }
        );
    }

    #[test]
    fn role_outside_family_is_rejected() {
        let mut constraints = shell_constraints();
        constraints.push(coincident("front", asm("Front Plane"), ce("Front Plane")));
        let err = classify_segment(
            &context(SegmentFamily::Shell, Some(PREVIOUS)),
            &constraints,
            &oracle(),
        )
        .expect_err("foreign role");
        assert_eq!(
            err,
            EngineError::AmbiguousConstraint {
                constraint: "front".to_string(),
                reason: AmbiguityReason::RoleNotInFamily(ConstraintRole::LateralJoin(
                    LateralKind::Frontal
                )),
            }
        );
    }
}
