use std::fmt;

/// 宿主文档的一次变更。内存宿主在每次修改后广播。
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    ComponentAdded { name: String },
    ComponentMadeIndependent { name: String, path: String },
    FeatureRenamed { from: String, to: String },
    FeatureDeleted { name: String },
    SuppressionChanged { name: String, suppressed: bool },
    MateCreated { name: String },
    MateEdited { name: String },
    MateModified { name: String },
    PlaneCreated { name: String },
    PlaneModified { name: String },
    DimensionChanged {
        component: String,
        name: String,
        value: f64,
    },
    Rebuilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&DocumentChange)>;

/// 变更订阅表。订阅与取消订阅由调用方成对管理。
#[derive(Default)]
pub struct DocumentEvents {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
}

impl DocumentEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&DocumentChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// 返回订阅是否存在。
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(candidate, _)| *candidate != id);
        self.observers.len() != before
    }

    pub fn emit(&mut self, change: DocumentChange) {
        for (_, observer) in &mut self.observers {
            observer(&change);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for DocumentEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentEvents")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unsubscribed_observers_stop_receiving() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut events = DocumentEvents::new();
        let sink = Rc::clone(&seen);
        let id = events.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        events.emit(DocumentChange::Rebuilt);
        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        events.emit(DocumentChange::Rebuilt);

        assert_eq!(seen.borrow().len(), 1);
        assert!(events.is_empty());
    }
}
