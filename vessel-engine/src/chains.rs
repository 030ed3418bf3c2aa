//! 段链：按特征树顺序维护壳体链与端盖链，增减段时保持相邻段的连接。

use std::str::FromStr;

use tracing::{debug, info};
use vessel_core::document::EntityRef;

use crate::classifier::SegmentFamily;
use crate::errors::EngineError;
use crate::host::Session;
use crate::segments::{EndCapAlignment, EndCapSegment, Segment, ShellSegment};

/// 新建段时使用的默认参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainDefaults {
    pub shell_length: f64,
    pub end_cap_alignment: EndCapAlignment,
    pub end_cap_distance: f64,
}

impl Default for ChainDefaults {
    fn default() -> Self {
        Self {
            shell_length: 1.0,
            end_cap_alignment: EndCapAlignment::Right,
            end_cap_distance: 1.0,
        }
    }
}

/// 壳体链。第一个组件是链首，也是复制新壳体的模板。
#[derive(Debug, Clone)]
pub struct ShellChain {
    segments: Vec<ShellSegment>,
}

impl ShellChain {
    pub fn rehydrate(session: &mut Session<'_>) -> Result<Self, EngineError> {
        session.ensure_document()?;
        let components = session.host.top_level_components();
        if components.is_empty() {
            return Err(session.fail(EngineError::ChainTooShort {
                family: SegmentFamily::Shell,
                required: 1,
                found: 0,
            }));
        }

        let mut segments = Vec::with_capacity(components.len());
        for (index, component) in components.iter().enumerate() {
            let previous = index.checked_sub(1).map(|p| components[p].as_str());
            match ShellSegment::rehydrate(session, component, previous) {
                Ok(segment) => segments.push(segment),
                Err(err) => {
                    session
                        .warnings
                        .add_error(format!("圆柱壳体 {} 对象未正确创建", index + 1));
                    return Err(err);
                }
            }
        }
        debug!(count = segments.len(), "壳体链已重建");
        Ok(Self { segments })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn segments(&self) -> &[ShellSegment] {
        &self.segments
    }

    pub fn head(&self) -> Option<&ShellSegment> {
        self.segments.first()
    }

    /// 复制链首，接在链尾之后。
    pub fn add(&mut self, session: &mut Session<'_>, length: f64) -> Result<&ShellSegment, EngineError> {
        let (Some(head), Some(tail)) = (self.segments.first(), self.segments.last()) else {
            return Err(session.fail(EngineError::ChainTooShort {
                family: SegmentFamily::Shell,
                required: 1,
                found: 0,
            }));
        };
        let segment = ShellSegment::synthesize(session, tail, head.component(), length)?;
        self.segments.push(segment);
        Ok(&self.segments[self.segments.len() - 1])
    }

    /// 移除链尾。链首不会被移除。
    pub fn remove(&mut self, session: &mut Session<'_>) -> bool {
        if self.segments.len() <= 1 {
            session.warnings.add_info("没有可移除的圆柱壳体");
            return false;
        }
        let Some(tail) = self.segments.last_mut() else {
            return false;
        };
        if !tail.remove(session) {
            return false;
        }
        self.segments.pop();
        true
    }

    /// 调整到 `target` 个壳体（至少 1 个），每步之后检查错误。
    pub fn set_count(&mut self, session: &mut Session<'_>, target: usize, length: f64) -> bool {
        let target = target.max(1);
        if target == self.segments.len() {
            debug!(target, "壳体数量未变化");
            return true;
        }
        while self.segments.len() > target {
            if !self.remove(session) || session.has_errors() {
                return false;
            }
        }
        while self.segments.len() < target {
            if self.add(session, length).is_err() || session.has_errors() {
                return false;
            }
        }
        info!(count = target, "壳体数量已调整");
        true
    }

    /// 移除中间的壳体：先把后继的侧向连接改接到前驱的右端面，再删除。
    pub fn remove_at(&mut self, session: &mut Session<'_>, index: usize) -> bool {
        if index == 0 {
            session.warnings.add_warning("链首壳体不能移除");
            return false;
        }
        if index >= self.segments.len() {
            session
                .warnings
                .add_warning(format!("壳体序号 {index} 超出范围"));
            return false;
        }
        if index == self.segments.len() - 1 {
            return self.remove(session);
        }

        let plane = self.segments[index - 1].boundary_plane().clone();
        if !self.segments[index + 1].rejoin(session, &plane) {
            session.warnings.add_warning(format!(
                "无法将 {} 改接到 {plane}",
                self.segments[index + 1].component()
            ));
            return false;
        }
        if !self.segments[index].remove(session) {
            return false;
        }
        self.segments.remove(index);
        true
    }
}

/// 端盖在链中的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCapPosition {
    Left,
    Right,
    /// 中间端盖，从 0 开始。
    Interior(usize),
}

impl FromStr for EndCapPosition {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "left" => Ok(EndCapPosition::Left),
            "right" => Ok(EndCapPosition::Right),
            other => other
                .parse::<usize>()
                .map(EndCapPosition::Interior)
                .map_err(|_| format!("无效的端盖位置：{value}")),
        }
    }
}

/// 端盖链：左右两个端头之间排列中间端盖，右端头的定位面始终参照链尾。
#[derive(Debug, Clone)]
pub struct EndCapChain {
    left: EndCapSegment,
    right: EndCapSegment,
    interior: Vec<EndCapSegment>,
    template_path: String,
}

impl EndCapChain {
    /// 第 0 个组件为左端头，第 1 个为右端头，其余为中间端盖。
    pub fn rehydrate(session: &mut Session<'_>) -> Result<Self, EngineError> {
        session.ensure_document()?;
        let components = session.host.top_level_components();
        if components.len() < 2 {
            session.warnings.add_warning("至少需要 2 个端盖组件");
            return Err(session.fail(EngineError::ChainTooShort {
                family: SegmentFamily::EndCap,
                required: 2,
                found: components.len(),
            }));
        }

        let left = EndCapSegment::rehydrate(session, &components[0])?;
        expect_alignment(session, &left, EndCapAlignment::Left)?;
        let right = EndCapSegment::rehydrate(session, &components[1])?;
        expect_alignment(session, &right, EndCapAlignment::Right)?;

        let mut interior = Vec::with_capacity(components.len() - 2);
        for (index, component) in components.iter().enumerate().skip(2) {
            match EndCapSegment::rehydrate(session, component) {
                Ok(segment) => interior.push(segment),
                Err(err) => {
                    session
                        .warnings
                        .add_error(format!("端盖 {} 对象未正确创建", index - 1));
                    return Err(err);
                }
            }
        }

        let Some(template_path) = session.host.component_path(&components[0]) else {
            return Err(session.fail(EngineError::TemplateMissing(components[0].clone())));
        };
        debug!(interior = interior.len(), "端盖链已重建");
        Ok(Self {
            left,
            right,
            interior,
            template_path,
        })
    }

    /// 使用其他零件作为新端盖的模板。
    pub fn with_template(mut self, path: impl Into<String>) -> Self {
        self.template_path = path.into();
        self
    }

    #[inline]
    pub fn template_path(&self) -> &str {
        &self.template_path
    }

    #[inline]
    pub fn left(&self) -> &EndCapSegment {
        &self.left
    }

    #[inline]
    pub fn right(&self) -> &EndCapSegment {
        &self.right
    }

    #[inline]
    pub fn interior(&self) -> &[EndCapSegment] {
        &self.interior
    }

    pub fn get_mut(&mut self, position: EndCapPosition) -> Option<&mut EndCapSegment> {
        match position {
            EndCapPosition::Left => Some(&mut self.left),
            EndCapPosition::Right => Some(&mut self.right),
            EndCapPosition::Interior(index) => self.interior.get_mut(index),
        }
    }

    /// 追加中间端盖，并让右端头改为参照它。
    pub fn add(
        &mut self,
        session: &mut Session<'_>,
        alignment: EndCapAlignment,
        distance: f64,
    ) -> Result<&EndCapSegment, EngineError> {
        self.append(session, alignment, distance)?;
        self.repoint_right(session);
        Ok(&self.interior[self.interior.len() - 1])
    }

    /// 先让右端头改参照新的链尾，再删除最后一个中间端盖。
    pub fn remove(&mut self, session: &mut Session<'_>) -> bool {
        if self.interior.is_empty() {
            session.warnings.add_info("没有可移除的中间端盖");
            return false;
        }
        let new_tail = self.tail_at(self.interior.len() - 1);
        if !self.right.change_reference_end(session, &new_tail) {
            return false;
        }
        self.pop(session)
    }

    /// 调整中间端盖数量。缩减时先改接右端头再逐个删除；增加时逐个追加，最后改接一次。
    pub fn set_count(
        &mut self,
        session: &mut Session<'_>,
        target: usize,
        alignment: EndCapAlignment,
        distance: f64,
    ) -> bool {
        let current = self.interior.len();
        if target == current {
            debug!(target, "中间端盖数量未变化");
            return true;
        }

        if target < current {
            let new_tail = self.tail_at(target);
            if !self.right.change_reference_end(session, &new_tail) {
                return false;
            }
            while self.interior.len() > target {
                if !self.pop(session) || session.has_errors() {
                    return false;
                }
            }
        } else {
            let mut complete = true;
            while self.interior.len() < target {
                if self.append(session, alignment, distance).is_err() || session.has_errors() {
                    complete = false;
                    break;
                }
            }
            // 中途失败时右端头仍接到已追加的链尾
            if self.interior.len() > current && !self.repoint_right(session) {
                return false;
            }
            if !complete {
                return false;
            }
        }
        info!(count = target, "中间端盖数量已调整");
        true
    }

    /// 保留前 `count` 个中间端盖时链尾的定位面。
    fn tail_at(&self, count: usize) -> EntityRef {
        count
            .checked_sub(1)
            .and_then(|index| self.interior.get(index))
            .unwrap_or(&self.left)
            .boundary_plane()
            .clone()
    }

    fn append(
        &mut self,
        session: &mut Session<'_>,
        alignment: EndCapAlignment,
        distance: f64,
    ) -> Result<(), EngineError> {
        let reference = self.tail_at(self.interior.len());
        let segment = EndCapSegment::synthesize(
            session,
            &reference,
            &self.template_path,
            alignment,
            distance,
            self.interior.len() + 1,
        )?;
        self.interior.push(segment);
        Ok(())
    }

    fn pop(&mut self, session: &mut Session<'_>) -> bool {
        let Some(tail) = self.interior.last_mut() else {
            return false;
        };
        if !tail.remove(session) {
            return false;
        }
        self.interior.pop();
        true
    }

    fn repoint_right(&mut self, session: &mut Session<'_>) -> bool {
        let tail = self.tail_at(self.interior.len());
        self.right.change_reference_end(session, &tail)
    }
}

fn expect_alignment(
    session: &mut Session<'_>,
    segment: &EndCapSegment,
    expected: EndCapAlignment,
) -> Result<(), EngineError> {
    let found = segment.alignment(&*session.host);
    if found == Some(expected) {
        return Ok(());
    }
    Err(session.fail(EngineError::UnexpectedAlignment {
        component: segment.component().to_string(),
        expected,
        found,
    }))
}
