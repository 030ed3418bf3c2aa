pub mod end_cap;
pub mod shell;

use tracing::debug;
use vessel_core::document::{EntityRef, FeatureId};

pub use end_cap::{EndCapAlignment, EndCapSegment, FlipOutcome, FlipStage};
pub use shell::ShellSegment;

use crate::classifier::ConstraintView;
use crate::host::{HostEngine, Selectable, Session};

/// 链中的一段：壳体或端盖。
pub trait Segment {
    fn component(&self) -> &str;
    /// 后继段连接所用的边界：壳体的右端面，端盖的定位面。
    fn boundary_plane(&self) -> &EntityRef;
    fn remove(&mut self, session: &mut Session<'_>) -> bool;
}

/// 组件现有配合的分类视图。
pub(crate) fn constraint_views(host: &dyn HostEngine, component: &str) -> Vec<ConstraintView> {
    host.mates_of(component)
        .into_iter()
        .filter_map(|id| host.mate_definition(id))
        .map(|mate| ConstraintView::from(&mate))
        .collect()
}

/// 在 `base N` 形式中取第一个未被占用的编号，从 `start` 开始。
pub(crate) fn next_free_name(host: &dyn HostEngine, base: &str, start: usize) -> (usize, String) {
    (start.max(1)..)
        .map(|number| (number, format!("{base} {number}")))
        .find(|(_, name)| host.find_feature(name).is_none())
        .unwrap_or_else(|| (start, format!("{base} {start}")))
}

/// 删除选择集中的顶层特征（组件及其配合由宿主一并移除）。
pub(crate) fn delete_features(session: &mut Session<'_>, names: &[&str]) -> bool {
    session.host.clear_selection();
    let mut selected = false;
    for name in names {
        let Some(id) = session.host.find_feature(name) else {
            session.warnings.add_warning(format!("找不到要删除的特征 {name}"));
            continue;
        };
        selected |= session.host.select(Selectable::Feature(id), selected);
    }
    let deleted = selected && session.host.delete_selection();
    session.host.clear_selection();
    deleted
}

/// 撤销合成失败的段：删除已加入的组件和已插入的平面，宿主一并移除挂在它们上的配合。
pub(crate) fn discard_partial(
    session: &mut Session<'_>,
    component: Option<FeatureId>,
    planes: &[&str],
) {
    session.host.clear_selection();
    let mut selected = false;
    let plane_ids: Vec<FeatureId> = planes
        .iter()
        .filter_map(|name| session.host.find_feature(name))
        .collect();
    for id in component.into_iter().chain(plane_ids) {
        selected |= session.host.select(Selectable::Feature(id), selected);
    }
    if !selected {
        return;
    }
    if session.host.delete_selection() {
        debug!(?component, ?planes, "已撤销未完成的段");
    } else {
        session.warnings.add_warning("无法撤销未完成的段，文档中可能残留特征");
    }
    session.host.clear_selection();
}
