//! 宿主 CAD 引擎的调用接口。所有操作同步阻塞，宿主以名称与选择集为中心工作。

use vessel_core::document::{
    EntityKind, EntityRef, FeatureId, FeatureType, Mate, MateAlignment, MateKind, PlaneOffset,
};
use vessel_core::geometry::Placement;

use crate::errors::EngineError;
use crate::warnings::WarningService;

/// 可加入选择集的对象。
#[derive(Debug, Clone, PartialEq)]
pub enum Selectable {
    Entity(EntityRef),
    Feature(FeatureId),
}

pub trait HostEngine {
    fn has_document(&self) -> bool;
    fn title(&self) -> String;

    /// 在装配体（`scope` 为空）或指定组件内按类型与序号（从 1 开始）取特征。
    fn nth_feature_of_type(
        &self,
        scope: Option<&str>,
        feature_type: FeatureType,
        ordinal: usize,
    ) -> Option<EntityRef>;
    /// 顶层组件，按特征树顺序。
    fn top_level_components(&self) -> Vec<String>;
    fn entity_kind(&self, entity: &EntityRef) -> Option<EntityKind>;
    /// 平面在装配体坐标系中的放置。
    fn plane_transform(&self, plane: &EntityRef) -> Option<Placement>;
    fn component_transform(&self, component: &str) -> Option<Placement>;
    fn component_path(&self, component: &str) -> Option<String>;

    fn find_feature(&self, name: &str) -> Option<FeatureId>;
    fn feature_name(&self, id: FeatureId) -> Option<String>;
    fn rename_feature(&mut self, id: FeatureId, name: &str) -> bool;
    fn set_suppression(&mut self, id: FeatureId, suppressed: bool) -> bool;
    fn is_suppressed(&self, id: FeatureId) -> Option<bool>;

    fn select(&mut self, target: Selectable, append: bool) -> bool;
    fn clear_selection(&mut self);
    fn delete_selection(&mut self) -> bool;

    fn add_component(&mut self, path: &str) -> Option<FeatureId>;
    /// 将当前选中的组件另存为 `new_path` 并改为引用新零件。
    fn make_independent(&mut self, new_path: &str) -> bool;

    fn mates_of(&self, component: &str) -> Vec<FeatureId>;
    fn mate_definition(&self, id: FeatureId) -> Option<Mate>;
    /// 以当前选择集的两个实体创建配合。
    fn create_mate(&mut self, kind: MateKind, alignment: MateAlignment) -> Option<FeatureId>;
    /// 选择集为一个配合加上两个替换实体时，重新定义该配合。成功后旧标识失效。
    fn edit_mate(&mut self) -> bool;
    /// 修改配合参数；宿主拒绝无法求解的定义时返回 `false` 且不做改动。
    fn modify_mate(&mut self, id: FeatureId, definition: &Mate) -> bool;

    /// 以当前选中的平面为参考插入偏移平面。
    fn insert_offset_plane(&mut self, distance: f64) -> Option<FeatureId>;
    fn plane_offset(&self, id: FeatureId) -> Option<PlaneOffset>;
    fn modify_plane_offset(&mut self, id: FeatureId, offset: &PlaneOffset) -> bool;

    fn dimension(&self, component: &str, name: &str) -> Option<f64>;
    fn set_dimension(&mut self, component: &str, name: &str, value: f64) -> bool;
    fn force_rebuild(&mut self);
}

/// 一次操作所需的宿主与告警收集器。
pub struct Session<'a> {
    pub host: &'a mut dyn HostEngine,
    pub warnings: &'a mut WarningService,
}

impl<'a> Session<'a> {
    pub fn new(host: &'a mut dyn HostEngine, warnings: &'a mut WarningService) -> Self {
        Self { host, warnings }
    }

    /// 文档未打开时记录错误并返回 `DocumentNotInitialized`。
    pub fn ensure_document(&mut self) -> Result<(), EngineError> {
        if self.host.has_document() {
            Ok(())
        } else {
            let err = EngineError::DocumentNotInitialized;
            self.warnings.add_error(err.to_string());
            Err(err)
        }
    }

    /// 记录错误并原样返回，便于 `return Err(session.fail(..))`。
    pub fn fail(&mut self, err: EngineError) -> EngineError {
        self.warnings.add_error(err.to_string());
        err
    }

    #[inline]
    pub fn has_errors(&self) -> bool {
        self.warnings.has_errors()
    }
}
