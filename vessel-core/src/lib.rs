pub mod geometry {
    pub use glam::{DAffine3, DVec3};
    use serde::{Deserialize, Serialize};

    /// 平行判定前对法向量各分量保留的小数位数。
    pub const PARALLEL_ROUNDING_DIGITS: i32 = 13;

    /// 装配体的三个基准面，按参考平面特征中的出现顺序编号。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum MajorPlane {
        Front,
        Top,
        Right,
    }

    impl MajorPlane {
        pub const ALL: [MajorPlane; 3] = [MajorPlane::Front, MajorPlane::Top, MajorPlane::Right];

        /// 在参考平面特征序列中的位置（从 1 开始）。
        #[inline]
        pub fn ordinal(self) -> usize {
            match self {
                MajorPlane::Front => 1,
                MajorPlane::Top => 2,
                MajorPlane::Right => 3,
            }
        }

        /// 基准面法向在世界坐标中的方向。
        #[inline]
        pub fn canonical_axis(self) -> DVec3 {
            match self {
                MajorPlane::Front => DVec3::Z,
                MajorPlane::Top => DVec3::Y,
                MajorPlane::Right => DVec3::X,
            }
        }

        #[inline]
        pub fn label(self) -> &'static str {
            match self {
                MajorPlane::Front => "Front Plane",
                MajorPlane::Top => "Top Plane",
                MajorPlane::Right => "Right Plane",
            }
        }

        /// 基准面相对于所属坐标系的局部放置：法向为局部 Z 轴。
        pub fn local_placement(self) -> Placement {
            match self {
                MajorPlane::Front => Placement::IDENTITY,
                MajorPlane::Top => Placement::rotation_x(-std::f64::consts::FRAC_PI_2),
                MajorPlane::Right => Placement::rotation_y(std::f64::consts::FRAC_PI_2),
            }
        }
    }

    /// 刚体放置（旋转 + 平移），内部以 `glam::DAffine3` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Placement(pub DAffine3);

    impl Placement {
        pub const IDENTITY: Placement = Placement(DAffine3::IDENTITY);

        #[inline]
        pub fn from_affine(affine: DAffine3) -> Self {
            Self(affine)
        }

        #[inline]
        pub fn translation(offset: DVec3) -> Self {
            Self(DAffine3::from_translation(offset))
        }

        #[inline]
        pub fn rotation_x(angle: f64) -> Self {
            Self(DAffine3::from_rotation_x(angle))
        }

        #[inline]
        pub fn rotation_y(angle: f64) -> Self {
            Self(DAffine3::from_rotation_y(angle))
        }

        /// 先应用 `self`，再应用 `outer`。
        #[inline]
        pub fn then(self, outer: Placement) -> Placement {
            Placement(outer.0 * self.0)
        }

        /// 保留平移部分，只替换旋转。
        pub fn with_rotation_of(self, rotation: Placement) -> Placement {
            let mut affine = rotation.0;
            affine.translation = self.0.translation;
            Placement(affine)
        }

        #[inline]
        pub fn transform_vector(self, vector: DVec3) -> DVec3 {
            self.0.transform_vector3(vector)
        }

        #[inline]
        pub fn transform_point(self, point: DVec3) -> DVec3 {
            self.0.transform_point3(point)
        }

        /// 平面法向：局部 (0,0,1) 经放置变换后的方向。
        #[inline]
        pub fn normal(self) -> DVec3 {
            self.transform_vector(DVec3::Z)
        }

        #[inline]
        pub fn origin(self) -> DVec3 {
            self.0.translation
        }

        #[inline]
        pub fn as_affine(self) -> DAffine3 {
            self.0
        }
    }

    impl Default for Placement {
        fn default() -> Self {
            Self::IDENTITY
        }
    }

    impl From<DAffine3> for Placement {
        fn from(value: DAffine3) -> Self {
            Self::from_affine(value)
        }
    }

    #[inline]
    pub fn round_to_digits(value: f64, digits: i32) -> f64 {
        let scale = 10f64.powi(digits);
        (value * scale).round() / scale
    }

    pub fn round_vector(vector: DVec3) -> DVec3 {
        DVec3::new(
            round_to_digits(vector.x, PARALLEL_ROUNDING_DIGITS),
            round_to_digits(vector.y, PARALLEL_ROUNDING_DIGITS),
            round_to_digits(vector.z, PARALLEL_ROUNDING_DIGITS),
        )
    }

    /// 法向经 13 位小数舍入后等于基准轴的正向或反向时，视为与该基准面平行。
    pub fn is_parallel_to_major_plane(normal: DVec3, plane: MajorPlane) -> bool {
        let rounded = round_vector(normal);
        let axis = plane.canonical_axis();
        rounded == axis || rounded == -axis
    }

}

pub mod document {
    use std::collections::HashMap;
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{MajorPlane, Placement};

    /// 特征标识。宿主在编辑特征后可能重新分配标识，调用方不应长期持有。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct FeatureId(u64);

    impl FeatureId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for FeatureId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    /// 几何实体引用：`component` 为空表示属于装配体本身。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityRef {
        pub component: Option<String>,
        pub name: String,
    }

    impl EntityRef {
        #[inline]
        pub fn assembly(name: impl Into<String>) -> Self {
            Self {
                component: None,
                name: name.into(),
            }
        }

        #[inline]
        pub fn in_component(component: impl Into<String>, name: impl Into<String>) -> Self {
            Self {
                component: Some(component.into()),
                name: name.into(),
            }
        }

        #[inline]
        pub fn owner(&self) -> Option<&str> {
            self.component.as_deref()
        }

        #[inline]
        pub fn is_in_component(&self) -> bool {
            self.component.is_some()
        }
    }

    impl fmt::Display for EntityRef {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match &self.component {
                Some(component) => write!(f, "{}@{}", self.name, component),
                None => f.write_str(&self.name),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum EntityKind {
        Plane,
        Axis,
        Other,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum FeatureType {
        RefPlane,
        RefAxis,
        Component,
        Mate,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum MateAlignment {
        Aligned,
        AntiAligned,
    }

    impl MateAlignment {
        #[inline]
        pub fn toggled(self) -> Self {
            match self {
                MateAlignment::Aligned => MateAlignment::AntiAligned,
                MateAlignment::AntiAligned => MateAlignment::Aligned,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum MateKind {
        Coincident,
        Angle {
            angle: f64,
            flip: bool,
            reference: Option<EntityRef>,
        },
    }

    impl MateKind {
        #[inline]
        pub fn is_angle(&self) -> bool {
            matches!(self, MateKind::Angle { .. })
        }
    }

    /// 配合约束。`entities` 的顺序即创建时的选择顺序。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Mate {
        pub name: String,
        pub kind: MateKind,
        pub entities: [EntityRef; 2],
        pub alignment: MateAlignment,
        pub suppressed: bool,
    }

    impl Mate {
        pub fn coincident(
            name: impl Into<String>,
            first: EntityRef,
            second: EntityRef,
            alignment: MateAlignment,
        ) -> Self {
            Self {
                name: name.into(),
                kind: MateKind::Coincident,
                entities: [first, second],
                alignment,
                suppressed: false,
            }
        }

        pub fn angle(
            name: impl Into<String>,
            first: EntityRef,
            second: EntityRef,
            reference: Option<EntityRef>,
            angle: f64,
            flip: bool,
        ) -> Self {
            Self {
                name: name.into(),
                kind: MateKind::Angle {
                    angle,
                    flip,
                    reference,
                },
                entities: [first, second],
                alignment: MateAlignment::Aligned,
                suppressed: false,
            }
        }

        pub fn touches_component(&self, component: &str) -> bool {
            self.entities
                .iter()
                .any(|entity| entity.owner() == Some(component))
        }

        pub fn references(&self, entity: &EntityRef) -> bool {
            self.entities.iter().any(|candidate| candidate == entity)
        }

        fn references_mut(&mut self) -> impl Iterator<Item = &mut EntityRef> {
            let reference = match &mut self.kind {
                MateKind::Angle { reference, .. } => reference.as_mut(),
                MateKind::Coincident => None,
            };
            self.entities.iter_mut().chain(reference)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PlaneOffset {
        pub reference: EntityRef,
        pub distance: f64,
        pub flip: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RefPlane {
        pub name: String,
        pub placement: Placement,
        pub offset: Option<PlaneOffset>,
        pub suppressed: bool,
    }

    impl RefPlane {
        pub fn new(name: impl Into<String>, placement: Placement) -> Self {
            Self {
                name: name.into(),
                placement,
                offset: None,
                suppressed: false,
            }
        }

        pub fn offset_from(name: impl Into<String>, offset: PlaneOffset) -> Self {
            Self {
                name: name.into(),
                placement: Placement::IDENTITY,
                offset: Some(offset),
                suppressed: false,
            }
        }
    }

    /// 参考轴，方向为局部 X 轴经放置变换后的方向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RefAxis {
        pub name: String,
        pub placement: Placement,
        pub suppressed: bool,
    }

    impl RefAxis {
        pub fn new(name: impl Into<String>, placement: Placement) -> Self {
            Self {
                name: name.into(),
                placement,
                suppressed: false,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Dimension {
        pub name: String,
        pub value: f64,
    }

    /// 零件模板：装配体按路径实例化组件时复制其平面、轴与尺寸。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PartDefinition {
        pub path: String,
        pub planes: Vec<RefPlane>,
        pub axes: Vec<RefAxis>,
        pub dimensions: Vec<Dimension>,
    }

    impl PartDefinition {
        /// 新建零件模板，自动包含三个基准面。
        pub fn new(path: impl Into<String>) -> Self {
            Self {
                path: path.into(),
                planes: MajorPlane::ALL
                    .iter()
                    .map(|plane| RefPlane::new(plane.label(), plane.local_placement()))
                    .collect(),
                axes: Vec::new(),
                dimensions: Vec::new(),
            }
        }

        pub fn with_plane(mut self, name: impl Into<String>, placement: Placement) -> Self {
            self.planes.push(RefPlane::new(name, placement));
            self
        }

        pub fn with_axis(mut self, name: impl Into<String>, placement: Placement) -> Self {
            self.axes.push(RefAxis::new(name, placement));
            self
        }

        pub fn with_dimension(mut self, name: impl Into<String>, value: f64) -> Self {
            self.dimensions.push(Dimension {
                name: name.into(),
                value,
            });
            self
        }

        /// 路径中的文件名（不含扩展名）。
        pub fn file_stem(&self) -> &str {
            let file = self
                .path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(self.path.as_str());
            match file.rfind('.') {
                Some(dot) if dot > 0 => &file[..dot],
                _ => file,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Component {
        pub name: String,
        pub path: String,
        pub placement: Placement,
        pub planes: Vec<RefPlane>,
        pub axes: Vec<RefAxis>,
        pub dimensions: Vec<Dimension>,
        pub suppressed: bool,
    }

    impl Component {
        pub fn from_definition(name: impl Into<String>, definition: &PartDefinition) -> Self {
            Self {
                name: name.into(),
                path: definition.path.clone(),
                placement: Placement::IDENTITY,
                planes: definition.planes.clone(),
                axes: definition.axes.clone(),
                dimensions: definition.dimensions.clone(),
                suppressed: false,
            }
        }

        pub fn plane(&self, name: &str) -> Option<&RefPlane> {
            self.planes.iter().find(|plane| plane.name == name)
        }

        pub fn axis(&self, name: &str) -> Option<&RefAxis> {
            self.axes.iter().find(|axis| axis.name == name)
        }

        /// 按序号（从 1 开始）取参考平面。
        pub fn nth_plane(&self, ordinal: usize) -> Option<&RefPlane> {
            ordinal.checked_sub(1).and_then(|index| self.planes.get(index))
        }

        pub fn nth_axis(&self, ordinal: usize) -> Option<&RefAxis> {
            ordinal.checked_sub(1).and_then(|index| self.axes.get(index))
        }

        pub fn dimension(&self, name: &str) -> Option<f64> {
            self.dimensions
                .iter()
                .find(|dimension| dimension.name == name)
                .map(|dimension| dimension.value)
        }

        pub fn set_dimension(&mut self, name: &str, value: f64) -> bool {
            match self
                .dimensions
                .iter_mut()
                .find(|dimension| dimension.name == name)
            {
                Some(dimension) => {
                    dimension.value = value;
                    true
                }
                None => false,
            }
        }
    }

    /// 装配体特征树中的一项。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Feature {
        RefPlane(RefPlane),
        RefAxis(RefAxis),
        Component(Component),
        Mate(Mate),
    }

    impl Feature {
        pub fn name(&self) -> &str {
            match self {
                Feature::RefPlane(plane) => &plane.name,
                Feature::RefAxis(axis) => &axis.name,
                Feature::Component(component) => &component.name,
                Feature::Mate(mate) => &mate.name,
            }
        }

        fn set_name(&mut self, name: String) {
            match self {
                Feature::RefPlane(plane) => plane.name = name,
                Feature::RefAxis(axis) => axis.name = name,
                Feature::Component(component) => component.name = name,
                Feature::Mate(mate) => mate.name = name,
            }
        }

        pub fn feature_type(&self) -> FeatureType {
            match self {
                Feature::RefPlane(_) => FeatureType::RefPlane,
                Feature::RefAxis(_) => FeatureType::RefAxis,
                Feature::Component(_) => FeatureType::Component,
                Feature::Mate(_) => FeatureType::Mate,
            }
        }

        pub fn is_suppressed(&self) -> bool {
            match self {
                Feature::RefPlane(plane) => plane.suppressed,
                Feature::RefAxis(axis) => axis.suppressed,
                Feature::Component(component) => component.suppressed,
                Feature::Mate(mate) => mate.suppressed,
            }
        }

        pub fn set_suppressed(&mut self, suppressed: bool) {
            match self {
                Feature::RefPlane(plane) => plane.suppressed = suppressed,
                Feature::RefAxis(axis) => axis.suppressed = suppressed,
                Feature::Component(component) => component.suppressed = suppressed,
                Feature::Mate(mate) => mate.suppressed = suppressed,
            }
        }

        pub fn as_component(&self) -> Option<&Component> {
            match self {
                Feature::Component(component) => Some(component),
                _ => None,
            }
        }

        pub fn as_mate(&self) -> Option<&Mate> {
            match self {
                Feature::Mate(mate) => Some(mate),
                _ => None,
            }
        }

        pub fn as_plane(&self) -> Option<&RefPlane> {
            match self {
                Feature::RefPlane(plane) => Some(plane),
                _ => None,
            }
        }
    }

    /// 装配体文档：有序特征树加上可实例化的零件库。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AssemblyDocument {
        title: String,
        next_id: u64,
        features: Vec<(FeatureId, Feature)>,
        library: HashMap<String, PartDefinition>,
    }

    impl AssemblyDocument {
        /// 新建装配体，特征树以三个基准面开头。
        pub fn new(title: impl Into<String>) -> Self {
            let mut document = Self {
                title: title.into(),
                next_id: 0,
                features: Vec::new(),
                library: HashMap::new(),
            };
            for plane in MajorPlane::ALL {
                document.push(Feature::RefPlane(RefPlane::new(
                    plane.label(),
                    plane.local_placement(),
                )));
            }
            document
        }

        #[inline]
        pub fn title(&self) -> &str {
            &self.title
        }

        pub fn register_part(&mut self, definition: PartDefinition) {
            self.library.insert(definition.path.clone(), definition);
        }

        pub fn part(&self, path: &str) -> Option<&PartDefinition> {
            self.library.get(path)
        }

        /// 将零件另存为新路径，返回是否成功。
        pub fn copy_part(&mut self, from: &str, to: &str) -> bool {
            let Some(mut definition) = self.library.get(from).cloned() else {
                return false;
            };
            definition.path = to.to_string();
            self.library.insert(to.to_string(), definition);
            true
        }

        pub fn features(&self) -> impl Iterator<Item = &(FeatureId, Feature)> {
            self.features.iter()
        }

        pub fn len(&self) -> usize {
            self.features.len()
        }

        pub fn is_empty(&self) -> bool {
            self.features.is_empty()
        }

        pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
            self.features
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, feature)| feature)
        }

        pub fn feature_mut(&mut self, id: FeatureId) -> Option<&mut Feature> {
            self.features
                .iter_mut()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, feature)| feature)
        }

        pub fn find(&self, name: &str) -> Option<FeatureId> {
            self.features
                .iter()
                .find(|(_, feature)| feature.name() == name)
                .map(|(id, _)| *id)
        }

        pub fn push(&mut self, feature: Feature) -> FeatureId {
            let id = self.allocate_id();
            self.features.push((id, feature));
            id
        }

        /// 按零件路径实例化组件，命名为 `<文件名>-<n>`。零件未登记时返回 `None`。
        pub fn add_component(&mut self, path: &str) -> Option<FeatureId> {
            let definition = self.library.get(path)?;
            let name = self.unique_name(&format!("{}-", definition.file_stem()));
            let component = Component::from_definition(name, definition);
            Some(self.push(Feature::Component(component)))
        }

        /// 按类型与序号（从 1 开始）取特征。
        pub fn nth_of_type(
            &self,
            feature_type: FeatureType,
            ordinal: usize,
        ) -> Option<(FeatureId, &Feature)> {
            let index = ordinal.checked_sub(1)?;
            self.features
                .iter()
                .filter(|(_, feature)| feature.feature_type() == feature_type)
                .nth(index)
                .map(|(id, feature)| (*id, feature))
        }

        pub fn components(&self) -> impl Iterator<Item = (FeatureId, &Component)> {
            self.features
                .iter()
                .filter_map(|(id, feature)| feature.as_component().map(|c| (*id, c)))
        }

        pub fn component(&self, name: &str) -> Option<&Component> {
            self.components()
                .find(|(_, component)| component.name == name)
                .map(|(_, component)| component)
        }

        pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
            self.features
                .iter_mut()
                .find_map(|(_, feature)| match feature {
                    Feature::Component(component) if component.name == name => Some(component),
                    _ => None,
                })
        }

        pub fn plane(&self, name: &str) -> Option<&RefPlane> {
            self.features
                .iter()
                .find_map(|(_, feature)| feature.as_plane().filter(|plane| plane.name == name))
        }

        pub fn axis(&self, name: &str) -> Option<&RefAxis> {
            self.features.iter().find_map(|(_, feature)| match feature {
                Feature::RefAxis(axis) if axis.name == name => Some(axis),
                _ => None,
            })
        }

        pub fn mates(&self) -> impl Iterator<Item = (FeatureId, &Mate)> {
            self.features
                .iter()
                .filter_map(|(id, feature)| feature.as_mate().map(|m| (*id, m)))
        }

        /// 引用了指定组件内实体的全部配合。
        pub fn mates_of(&self, component: &str) -> Vec<FeatureId> {
            self.mates()
                .filter(|(_, mate)| mate.touches_component(component))
                .map(|(id, _)| id)
                .collect()
        }

        pub fn remove(&mut self, id: FeatureId) -> Option<Feature> {
            let index = self.features.iter().position(|(candidate, _)| *candidate == id)?;
            Some(self.features.remove(index).1)
        }

        /// 原位重新分配特征标识，旧标识随即失效。
        pub fn reissue(&mut self, id: FeatureId) -> Option<FeatureId> {
            let index = self.features.iter().position(|(candidate, _)| *candidate == id)?;
            let fresh = self.allocate_id();
            self.features[index].0 = fresh;
            Some(fresh)
        }

        /// 重命名顶层特征，并同步更新其他特征对它的引用。名称冲突时返回 `false`。
        pub fn rename(&mut self, id: FeatureId, name: &str) -> bool {
            if let Some(existing) = self.find(name) {
                return existing == id;
            }
            let Some(feature) = self.feature_mut(id) else {
                return false;
            };
            let old = feature.name().to_string();
            let feature_type = feature.feature_type();
            feature.set_name(name.to_string());

            match feature_type {
                FeatureType::Component => self.rewrite_references(|entity| {
                    if entity.component.as_deref() == Some(old.as_str()) {
                        entity.component = Some(name.to_string());
                    }
                }),
                FeatureType::RefPlane | FeatureType::RefAxis => {
                    self.rewrite_references(|entity| {
                        if entity.component.is_none() && entity.name == old {
                            entity.name = name.to_string();
                        }
                    })
                }
                FeatureType::Mate => {}
            }
            true
        }

        /// 生成 `<prefix><n>` 形式且未被占用的名称，`n` 从 1 开始。
        pub fn unique_name(&self, prefix: &str) -> String {
            (1..)
                .map(|n| format!("{prefix}{n}"))
                .find(|candidate| self.find(candidate).is_none())
                .unwrap_or_else(|| prefix.to_string())
        }

        fn rewrite_references(&mut self, mut rewrite: impl FnMut(&mut EntityRef)) {
            for (_, feature) in &mut self.features {
                match feature {
                    Feature::Mate(mate) => mate.references_mut().for_each(&mut rewrite),
                    Feature::RefPlane(RefPlane {
                        offset: Some(offset),
                        ..
                    }) => rewrite(&mut offset.reference),
                    _ => {}
                }
            }
        }

        fn allocate_id(&mut self) -> FeatureId {
            let id = FeatureId::new(self.next_id);
            self.next_id += 1;
            id
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use glam::DVec3;

        fn shell_part() -> PartDefinition {
            PartDefinition::new("C:/parts/Shell.SLDPRT")
                .with_plane("Left Plane", MajorPlane::Right.local_placement())
                .with_plane(
                    "Right Plane End",
                    MajorPlane::Right
                        .local_placement()
                        .then(Placement::translation(DVec3::X)),
                )
                .with_axis("Center Axis", Placement::IDENTITY)
                .with_dimension("D3@Sketch1", 1.0)
        }

        #[test]
        fn new_document_starts_with_major_planes() {
            let doc = AssemblyDocument::new("Vessel");
            for plane in MajorPlane::ALL {
                let (_, feature) = doc
                    .nth_of_type(FeatureType::RefPlane, plane.ordinal())
                    .expect("major plane present");
                assert_eq!(feature.name(), plane.label());
            }
            assert!(doc.nth_of_type(FeatureType::RefPlane, 0).is_none());
        }

        #[test]
        fn components_are_named_after_file_stem() {
            let mut doc = AssemblyDocument::new("Vessel");
            doc.register_part(shell_part());
            let first = doc.add_component("C:/parts/Shell.SLDPRT").expect("first");
            let second = doc.add_component("C:/parts/Shell.SLDPRT").expect("second");

            assert_eq!(doc.feature(first).map(Feature::name), Some("Shell-1"));
            assert_eq!(doc.feature(second).map(Feature::name), Some("Shell-2"));
            assert!(doc.add_component("C:/parts/Missing.SLDPRT").is_none());

            let component = doc.component("Shell-1").expect("component");
            assert_eq!(component.nth_plane(4).map(|p| p.name.as_str()), Some("Left Plane"));
            assert_eq!(component.dimension("D3@Sketch1"), Some(1.0));
        }

        #[test]
        fn renaming_component_rewrites_mate_references() {
            let mut doc = AssemblyDocument::new("Vessel");
            doc.register_part(shell_part());
            let id = doc.add_component("C:/parts/Shell.SLDPRT").expect("component");
            let mate = doc.push(Feature::Mate(Mate::coincident(
                "Coincident1",
                EntityRef::in_component("Shell-1", "Left Plane"),
                EntityRef::assembly("Right Plane"),
                MateAlignment::AntiAligned,
            )));

            assert!(doc.rename(id, "Cylindrical Shell 1"));
            let mate = doc.feature(mate).and_then(Feature::as_mate).expect("mate");
            assert_eq!(
                mate.entities[0],
                EntityRef::in_component("Cylindrical Shell 1", "Left Plane")
            );
            assert_eq!(doc.mates_of("Cylindrical Shell 1").len(), 1);
            assert!(doc.mates_of("Shell-1").is_empty());
        }

        #[test]
        fn rename_rejects_taken_names() {
            let mut doc = AssemblyDocument::new("Vessel");
            let plane = doc.push(Feature::RefPlane(RefPlane::new("Plane1", Placement::IDENTITY)));
            assert!(!doc.rename(plane, "Front Plane"));
            assert!(doc.rename(plane, "Plane1"));
        }

        #[test]
        fn reissue_invalidates_previous_id() {
            let mut doc = AssemblyDocument::new("Vessel");
            let plane = doc.push(Feature::RefPlane(RefPlane::new("Plane1", Placement::IDENTITY)));
            let fresh = doc.reissue(plane).expect("reissue");
            assert_ne!(plane, fresh);
            assert!(doc.feature(plane).is_none());
            assert_eq!(doc.find("Plane1"), Some(fresh));
        }

        #[test]
        fn unique_name_skips_taken_suffixes() {
            let mut doc = AssemblyDocument::new("Vessel");
            doc.push(Feature::RefPlane(RefPlane::new("Plane1", Placement::IDENTITY)));
            assert_eq!(doc.unique_name("Plane"), "Plane2");
        }

        #[test]
        fn file_stem_handles_windows_paths() {
            let part = PartDefinition::new("C:\\vessels\\Dished End.SLDPRT");
            assert_eq!(part.file_stem(), "Dished End");
        }
    }
}
