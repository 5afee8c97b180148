use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::error::{BreakpointError, ListenerError, Result};
use crate::table::{BreakpointId, Threshold};

/// Payload handed to every listener of the breakpoint being entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointChange {
    pub id: BreakpointId,
    pub threshold: Threshold,
    pub previous: Option<Threshold>,
    pub width: u32,
}

pub type ListenerFailure = Box<dyn std::error::Error + Send + Sync>;
pub type ListenerResult = std::result::Result<(), ListenerFailure>;

/// Shared callback handle. Cloning is cheap, which is what lets `fire`
/// snapshot a bucket before invoking it.
pub type Listener =
    Rc<dyn Fn(&mut ListenerContext<'_>, &BreakpointChange) -> ListenerResult>;

/// Opaque token returned by registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
struct Entry {
    handle: ListenerHandle,
    listener: Listener,
}

enum PendingOp {
    Register {
        id: BreakpointId,
        entry: Entry,
    },
    Remove(ListenerHandle),
}

/// Context passed to listeners during fan-out.
///
/// Registrations and removals requested here are applied once the current
/// pass has finished, so they never change which listeners the pass invokes.
pub struct ListenerContext<'a> {
    known: &'a HashMap<BreakpointId, Vec<Entry>>,
    next_handle: &'a mut u64,
    pending: Vec<PendingOp>,
}

impl<'a> ListenerContext<'a> {
    fn new(known: &'a HashMap<BreakpointId, Vec<Entry>>, next_handle: &'a mut u64) -> Self {
        Self {
            known,
            next_handle,
            pending: Vec::new(),
        }
    }

    /// Queue a listener for `id`. Unknown ids fail immediately.
    pub fn register<F>(&mut self, id: &str, listener: F) -> Result<ListenerHandle>
    where
        F: Fn(&mut ListenerContext<'_>, &BreakpointChange) -> ListenerResult + 'static,
    {
        if !self.known.contains_key(id) {
            return Err(BreakpointError::UnknownBreakpoint(id.to_string()));
        }
        let handle = allocate(self.next_handle);
        self.pending.push(PendingOp::Register {
            id: id.to_string(),
            entry: Entry {
                handle,
                listener: Rc::new(listener),
            },
        });
        Ok(handle)
    }

    /// Queue removal of a listener.
    pub fn remove(&mut self, handle: ListenerHandle) {
        self.pending.push(PendingOp::Remove(handle));
    }
}

/// Outcome of a single fan-out pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    pub invoked: usize,
    pub failures: Vec<ListenerError>,
}

impl FanOutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Closed-world map from breakpoint id to its ordered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    lists: HashMap<BreakpointId, Vec<Entry>>,
    next_handle: u64,
}

impl ListenerRegistry {
    /// Create one empty bucket per id. Ids not passed here can never gain
    /// listeners.
    pub fn initialize<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = BreakpointId>,
    {
        Self {
            lists: ids.into_iter().map(|id| (id, Vec::new())).collect(),
            next_handle: 0,
        }
    }

    pub fn register<F>(&mut self, id: &str, listener: F) -> Result<ListenerHandle>
    where
        F: Fn(&mut ListenerContext<'_>, &BreakpointChange) -> ListenerResult + 'static,
    {
        self.register_shared(id, Rc::new(listener))
    }

    /// Register an already shared listener, e.g. one handle on several ids.
    pub fn register_shared(&mut self, id: &str, listener: Listener) -> Result<ListenerHandle> {
        let handle = allocate(&mut self.next_handle);
        let list = self
            .lists
            .get_mut(id)
            .ok_or_else(|| BreakpointError::UnknownBreakpoint(id.to_string()))?;
        list.push(Entry { handle, listener });
        Ok(handle)
    }

    /// Detach a listener. Returns false when the handle is not registered.
    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        for list in self.lists.values_mut() {
            if let Some(pos) = list.iter().position(|entry| entry.handle == handle) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lists.contains_key(id)
    }

    pub fn listener_count(&self, id: &str) -> usize {
        self.lists.get(id).map(Vec::len).unwrap_or(0)
    }

    /// Invoke every listener registered for `change.id`, in registration
    /// order, against a snapshot of the bucket.
    ///
    /// A listener that returns an error or panics is recorded in the report;
    /// the remaining listeners still run.
    pub fn fire(&mut self, change: &BreakpointChange) -> FanOutReport {
        let mut report = FanOutReport::default();
        let Some(list) = self.lists.get(&change.id) else {
            return report;
        };
        let snapshot: Vec<Entry> = list.clone();

        let pending = {
            let mut ctx = ListenerContext::new(&self.lists, &mut self.next_handle);
            for entry in &snapshot {
                report.invoked += 1;
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| (entry.listener)(&mut ctx, change)));
                let message = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => err.to_string(),
                    Err(payload) => panic_message(payload.as_ref()),
                };
                report.failures.push(ListenerError::new(
                    change.id.clone(),
                    entry.handle.raw(),
                    message,
                ));
            }
            ctx.pending
        };

        self.apply(pending);
        report
    }

    fn apply(&mut self, pending: Vec<PendingOp>) {
        for op in pending {
            match op {
                PendingOp::Register { id, entry } => {
                    if let Some(list) = self.lists.get_mut(&id) {
                        list.push(entry);
                    }
                }
                PendingOp::Remove(handle) => {
                    self.remove(handle);
                }
            }
        }
    }
}

fn allocate(next: &mut u64) -> ListenerHandle {
    let handle = ListenerHandle(*next);
    *next += 1;
    handle
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
