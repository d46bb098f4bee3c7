use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Driver misbehaviour the reference driver can be told to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Executing any statement invalidates every other open streaming
    /// cursor of the session.
    CloseOpenCursorsOnExecute,
    /// Reaching the end of a result raises an error instead of returning
    /// the end-of-data signal.
    ErrorAtEndOfData,
    /// Results end after this many rows.
    TruncateAfter(usize),
    /// Closing a statement also closes every other statement.
    CloseSiblingStatementsOnClose,
    /// Closing a cursor invalidates every other open streaming cursor.
    CloseAllCursorsOnCursorClose,
    /// Executing any statement makes every other open streaming cursor
    /// report end-of-data on its next advance. The cursors still report
    /// open and raise no error.
    EndSiblingCursorsOnExecute,
}

impl Fault {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CloseOpenCursorsOnExecute => "close_open_cursors_on_execute",
            Self::ErrorAtEndOfData => "error_at_end_of_data",
            Self::TruncateAfter(_) => "truncate_after",
            Self::CloseSiblingStatementsOnClose => "close_sibling_statements_on_close",
            Self::CloseAllCursorsOnCursorClose => "close_all_cursors_on_cursor_close",
            Self::EndSiblingCursorsOnExecute => "end_sibling_cursors_on_execute",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Statement,
    Cursor,
}

pub type HandleId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HandleEvent {
    Opened { kind: HandleKind, id: HandleId },
    Released { kind: HandleKind, id: HandleId },
    FaultTriggered { fault: Fault, target: HandleId },
}

#[derive(Debug)]
struct Handle {
    kind: HandleKind,
    parent: Option<HandleId>,
    streaming: bool,
    closed: bool,
    closed_by_driver: bool,
    ended_by_driver: bool,
}

/// Live handles of one backend and the log of what happened to them.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next_id: HandleId,
    handles: BTreeMap<HandleId, Handle>,
    events: Vec<HandleEvent>,
    faults: Vec<Fault>,
}

pub type SharedRegistry = Rc<RefCell<HandleRegistry>>;

impl HandleRegistry {
    pub fn new(faults: Vec<Fault>) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn shared(faults: Vec<Fault>) -> SharedRegistry {
        Rc::new(RefCell::new(Self::new(faults)))
    }

    pub fn has_fault(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    pub fn truncate_after(&self) -> Option<usize> {
        self.faults.iter().find_map(|f| match f {
            Fault::TruncateAfter(n) => Some(*n),
            _ => None,
        })
    }

    pub fn events(&self) -> &[HandleEvent] {
        &self.events
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn open_statement(&mut self) -> HandleId {
        self.register(HandleKind::Statement, None, false)
    }

    /// Registers a cursor. With [`Fault::CloseOpenCursorsOnExecute`] every
    /// other streaming cursor is invalidated first; with
    /// [`Fault::EndSiblingCursorsOnExecute`] they are silently ended.
    pub fn open_cursor(&mut self, parent: Option<HandleId>, streaming: bool) -> HandleId {
        if self.has_fault(Fault::CloseOpenCursorsOnExecute) {
            self.invalidate_cursors(None, Fault::CloseOpenCursorsOnExecute);
        }
        if self.has_fault(Fault::EndSiblingCursorsOnExecute) {
            self.end_cursors();
        }
        self.register(HandleKind::Cursor, parent, streaming)
    }

    fn register(&mut self, kind: HandleKind, parent: Option<HandleId>, streaming: bool) -> HandleId {
        self.next_id += 1;
        let id = self.next_id;
        self.handles.insert(
            id,
            Handle {
                kind,
                parent,
                streaming,
                closed: false,
                closed_by_driver: false,
                ended_by_driver: false,
            },
        );
        self.events.push(HandleEvent::Opened { kind, id });
        id
    }

    pub fn close(&mut self, id: HandleId) {
        let Some(handle) = self.handles.get_mut(&id) else {
            return;
        };
        if handle.closed {
            return;
        }
        handle.closed = true;
        let kind = handle.kind;

        match kind {
            HandleKind::Cursor if self.has_fault(Fault::CloseAllCursorsOnCursorClose) => {
                self.invalidate_cursors(Some(id), Fault::CloseAllCursorsOnCursorClose);
            }
            HandleKind::Statement if self.has_fault(Fault::CloseSiblingStatementsOnClose) => {
                let siblings: Vec<HandleId> = self
                    .handles
                    .iter()
                    .filter(|(other, h)| {
                        **other != id && h.kind == HandleKind::Statement && !h.closed && !h.closed_by_driver
                    })
                    .map(|(other, _)| *other)
                    .collect();
                for sibling in siblings {
                    if let Some(h) = self.handles.get_mut(&sibling) {
                        h.closed_by_driver = true;
                    }
                    self.events.push(HandleEvent::FaultTriggered {
                        fault: Fault::CloseSiblingStatementsOnClose,
                        target: sibling,
                    });
                }
            }
            _ => {}
        }
    }

    fn invalidate_cursors(&mut self, except: Option<HandleId>, fault: Fault) {
        for (id, handle) in self.handles.iter_mut() {
            if Some(*id) == except
                || handle.kind != HandleKind::Cursor
                || !handle.streaming
                || handle.closed
                || handle.closed_by_driver
            {
                continue;
            }
            handle.closed_by_driver = true;
            self.events.push(HandleEvent::FaultTriggered { fault, target: *id });
        }
    }

    fn end_cursors(&mut self) {
        for (id, handle) in self.handles.iter_mut() {
            if handle.kind != HandleKind::Cursor
                || !handle.streaming
                || handle.closed
                || handle.closed_by_driver
                || handle.ended_by_driver
            {
                continue;
            }
            handle.ended_by_driver = true;
            self.events.push(HandleEvent::FaultTriggered {
                fault: Fault::EndSiblingCursorsOnExecute,
                target: *id,
            });
        }
    }

    pub fn release(&mut self, id: HandleId) {
        if let Some(handle) = self.handles.remove(&id) {
            self.events.push(HandleEvent::Released {
                kind: handle.kind,
                id,
            });
        }
    }

    pub fn is_closed(&self, id: HandleId) -> bool {
        self.handles.get(&id).map_or(true, |h| h.closed || h.closed_by_driver)
    }

    pub fn is_closed_by_driver(&self, id: HandleId) -> bool {
        self.handles.get(&id).map_or(false, |h| h.closed_by_driver)
    }

    /// Whether the driver cut the rest of cursor `id`'s result.
    pub fn is_ended_by_driver(&self, id: HandleId) -> bool {
        self.handles.get(&id).map_or(false, |h| h.ended_by_driver)
    }

    pub fn is_explicitly_closed(&self, id: HandleId) -> bool {
        self.handles.get(&id).map_or(true, |h| h.closed)
    }

    /// Whether the statement that produced cursor `id` is closed. Metadata
    /// cursors have no statement and report open.
    pub fn parent_is_closed(&self, id: HandleId) -> bool {
        match self.handles.get(&id).and_then(|h| h.parent) {
            Some(parent) => self.is_closed(parent),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_order_is_logged() {
        let mut registry = HandleRegistry::new(vec![]);
        let stmt = registry.open_statement();
        let cursor = registry.open_cursor(Some(stmt), true);
        registry.release(cursor);
        registry.release(stmt);

        assert_eq!(
            registry.events(),
            &[
                HandleEvent::Opened { kind: HandleKind::Statement, id: stmt },
                HandleEvent::Opened { kind: HandleKind::Cursor, id: cursor },
                HandleEvent::Released { kind: HandleKind::Cursor, id: cursor },
                HandleEvent::Released { kind: HandleKind::Statement, id: stmt },
            ]
        );
        assert_eq!(registry.open_handles(), 0);
    }

    #[test]
    fn test_close_without_faults_is_local() {
        let mut registry = HandleRegistry::new(vec![]);
        let a = registry.open_cursor(None, true);
        let b = registry.open_cursor(None, true);
        registry.close(b);
        assert!(!registry.is_closed(a));
        assert!(registry.is_closed(b));
        assert!(!registry.is_closed_by_driver(b));
    }

    #[test]
    fn test_close_on_execute_spares_buffered_cursors() {
        let mut registry = HandleRegistry::new(vec![Fault::CloseOpenCursorsOnExecute]);
        let streaming = registry.open_cursor(None, true);
        let buffered = registry.open_cursor(None, false);
        let _next = registry.open_cursor(None, true);

        assert!(registry.is_closed_by_driver(streaming));
        assert!(!registry.is_closed(buffered));
        assert!(registry.events().contains(&HandleEvent::FaultTriggered {
            fault: Fault::CloseOpenCursorsOnExecute,
            target: streaming,
        }));
    }

    #[test]
    fn test_end_on_execute_leaves_cursors_open() {
        let mut registry = HandleRegistry::new(vec![Fault::EndSiblingCursorsOnExecute]);
        let streaming = registry.open_cursor(None, true);
        let buffered = registry.open_cursor(None, false);
        let next = registry.open_cursor(None, true);

        assert!(registry.is_ended_by_driver(streaming));
        assert!(!registry.is_closed(streaming));
        assert!(!registry.is_ended_by_driver(buffered));
        assert!(!registry.is_ended_by_driver(next));
        assert_eq!(
            registry
                .events()
                .iter()
                .filter(|e| matches!(e, HandleEvent::FaultTriggered { .. }))
                .count(),
            1
        );
        assert_eq!(
            Fault::EndSiblingCursorsOnExecute.label(),
            "end_sibling_cursors_on_execute"
        );
    }

    #[test]
    fn test_sibling_statement_fault() {
        let mut registry = HandleRegistry::new(vec![Fault::CloseSiblingStatementsOnClose]);
        let a = registry.open_statement();
        let b = registry.open_statement();
        let cursor = registry.open_cursor(Some(a), true);
        registry.close(b);

        assert!(registry.is_closed(a));
        assert!(!registry.is_explicitly_closed(a));
        assert!(registry.parent_is_closed(cursor));
    }

    #[test]
    fn test_truncate_after_lookup() {
        let registry = HandleRegistry::new(vec![Fault::ErrorAtEndOfData, Fault::TruncateAfter(2)]);
        assert_eq!(registry.truncate_after(), Some(2));
        assert!(registry.has_fault(Fault::ErrorAtEndOfData));
        assert_eq!(Fault::TruncateAfter(2).label(), "truncate_after");
    }
}
