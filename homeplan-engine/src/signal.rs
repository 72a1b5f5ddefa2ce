use std::fmt;

/// 画布实体发出的信号。集合封闭，拼错信号名在编译期即报错。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntitySignal {
    /// 可视子树已构建完成。
    Render,
    Activate,
    Inactivate,
    DragStart,
    DragStop,
    /// 几何已变更，需要持久化。
    Update,
    /// 拖拽过程中的几何变化，仅用于视觉反馈。
    LesserUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<S> = Box<dyn FnMut(&S)>;

/// 单线程的类型化发布/订阅通道。监听者挂在实体对象本身，重绘不会丢失。
pub struct Signals<S> {
    listeners: Vec<(SubscriptionId, Listener<S>)>,
    next_id: u64,
}

impl<S> Signals<S> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&S) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// 移除监听者，返回其是否存在。
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        before != self.listeners.len()
    }

    /// 按订阅顺序同步通知所有监听者。
    pub fn emit(&mut self, signal: S) {
        for (_, listener) in &mut self.listeners {
            listener(&signal);
        }
    }

    #[inline]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<S> Default for Signals<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Signals<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn listeners_receive_signals_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut signals = Signals::new();
        let first = Rc::clone(&log);
        signals.subscribe(move |signal: &EntitySignal| first.borrow_mut().push(("a", *signal)));
        let second = Rc::clone(&log);
        signals.subscribe(move |signal: &EntitySignal| second.borrow_mut().push(("b", *signal)));

        signals.emit(EntitySignal::Update);
        assert_eq!(
            *log.borrow(),
            vec![("a", EntitySignal::Update), ("b", EntitySignal::Update)]
        );
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let count = Rc::new(RefCell::new(0));
        let mut signals = Signals::new();
        let counter = Rc::clone(&count);
        let id = signals.subscribe(move |_: &EntitySignal| *counter.borrow_mut() += 1);
        signals.emit(EntitySignal::Render);
        assert!(signals.unsubscribe(id));
        assert!(!signals.unsubscribe(id));
        signals.emit(EntitySignal::Render);
        assert_eq!(*count.borrow(), 1);
        assert_eq!(signals.listener_count(), 0);
    }
}
