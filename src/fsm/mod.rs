//! Finite state machine driven by task factories.
//!
//! A [`TaskFsm`] is built once and can be run any number of times. States
//! are task factories: entering a state constructs its task, which is then
//! resumed once per tick until a transition fires. Links are predicates
//! attached to an origin state that name a target state and synthesize the
//! payload its factory consumes. Exit states carry no factory; transitioning
//! into one terminates the FSM task, which returns that state's id.
//!
//! # Construction
//!
//! ```
//! use cotick::fsm::TaskFsm;
//! use cotick::combinator::wait_forever;
//!
//! let mut fsm = TaskFsm::new();
//! let idle = fsm.state("Idle", wait_forever);
//! let end = fsm.exit_state("End");
//! fsm.entry_links(vec![idle.link(())]);
//! fsm.state_links(&idle, vec![end.link_if(|| true)]);
//! let fsm_task = fsm.run(None, None);
//! # drop(fsm_task);
//! ```
//!
//! Construction mistakes (setting a state's links twice, on-complete links
//! among the entry links, an on-complete link shadowed by an unconditional
//! one) are programmer bugs and panic with stable messages.
//!
//! # Per-tick loop
//!
//! Each tick the FSM evaluates the active link list in order (entry links
//! until a state has been entered, the current state's outgoing links
//! afterwards). On-complete links are skipped while the current task runs.
//! At most one transition fires per tick; the new state's task then resumes
//! within the same tick.

mod link;

pub use link::LinkHandle;

use crate::task::{Task, TaskCtx};
use crate::tracing_compat::debug;
use core::fmt;
use link::{LinkKind, TransitionEvent};
#[cfg(feature = "task-debug")]
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

fn fire(on_transition: Option<&OnTransitionFn>) {
    if let Some(callback) = on_transition {
        callback();
    }
}

/// Identifies a state within its FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(u32);

impl StateId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Callback invoked whenever any transition fires.
pub type OnTransitionFn = Box<dyn Fn()>;

/// Debug callback invoked with the details of each transition.
pub type DebugTransitionFn = Box<dyn Fn(TransitionDebugData)>;

/// Details of one state transition, for debug callbacks.
#[derive(Debug, Clone)]
pub struct TransitionDebugData {
    /// Outgoing state's id; `None` on the entry transition.
    pub old_state_id: Option<StateId>,
    /// Outgoing state's name; `"<ENTRY>"` on the entry transition.
    pub old_state_name: String,
    /// Incoming state's id.
    pub new_state_id: StateId,
    /// Incoming state's name.
    pub new_state_name: String,
}

struct StateData {
    debug_name: String,
    outgoing: Vec<LinkHandle>,
}

struct FsmInner {
    states: RefCell<Vec<StateData>>,
    entry_links: RefCell<Vec<LinkHandle>>,
    exit_states: RefCell<Vec<StateId>>,
}

impl FsmInner {
    fn state_name(&self, id: StateId) -> String {
        self.states.borrow()[id.index()].debug_name.clone()
    }

    fn is_exit(&self, id: StateId) -> bool {
        self.exit_states.borrow().contains(&id)
    }

    /// Walks the active link list in order, returning the first transition
    /// that fires.
    fn evaluate_links(
        &self,
        current: Option<StateId>,
        current_complete: bool,
        on_transition: Option<&OnTransitionFn>,
    ) -> Option<TransitionEvent> {
        let links: Vec<LinkHandle> = match current {
            Some(id) => self.states.borrow()[id.index()].outgoing.clone(),
            None => self.entry_links.borrow().clone(),
        };
        for link in &links {
            if link.is_on_complete() && !current_complete {
                continue;
            }
            if let Some(event) = link.evaluate(on_transition) {
                return Some(event);
            }
        }
        None
    }
}

struct StateInner<P> {
    id: StateId,
    factory: Box<dyn Fn(P) -> Task<()>>,
}

/// Handle to a constructed state; builds links *into* that state.
pub struct StateHandle<P = ()> {
    inner: Rc<StateInner<P>>,
}

impl<P: 'static> StateHandle<P> {
    /// This state's id.
    #[must_use]
    pub fn id(&self) -> StateId {
        self.inner.id
    }

    /// Unconditional link into this state with a fixed payload.
    pub fn link(&self, payload: P) -> LinkHandle
    where
        P: Clone,
    {
        let state = self.inner.clone();
        self.make(
            move |tx| {
                fire(tx);
                Some(TransitionEvent {
                    new_task: Some((state.factory)(payload.clone())),
                    new_state_id: state.id,
                })
            },
            LinkKind::Normal,
            false,
        )
    }

    /// Conditional link with a fixed payload; follows when `pred` returns
    /// true.
    pub fn link_if<F>(&self, pred: F, payload: P) -> LinkHandle
    where
        P: Clone,
        F: Fn() -> bool + 'static,
    {
        let state = self.inner.clone();
        self.make(
            move |tx| {
                if pred() {
                    fire(tx);
                    Some(TransitionEvent {
                        new_task: Some((state.factory)(payload.clone())),
                        new_state_id: state.id,
                    })
                } else {
                    None
                }
            },
            LinkKind::Normal,
            true,
        )
    }

    /// Conditional link with a synthesized payload; follows when `pred`
    /// returns one, which becomes the factory's argument.
    pub fn link_when<F>(&self, pred: F) -> LinkHandle
    where
        F: Fn() -> Option<P> + 'static,
    {
        let state = self.inner.clone();
        self.make(
            move |tx| {
                pred().map(|payload| {
                    fire(tx);
                    TransitionEvent {
                        new_task: Some((state.factory)(payload)),
                        new_state_id: state.id,
                    }
                })
            },
            LinkKind::Normal,
            true,
        )
    }

    /// As [`link`](StateHandle::link), evaluated only once the origin
    /// state's task is done.
    pub fn on_complete(&self, payload: P) -> LinkHandle
    where
        P: Clone,
    {
        self.link(payload).into_on_complete(false)
    }

    /// As [`link_if`](StateHandle::link_if), evaluated only once the origin
    /// state's task is done.
    pub fn on_complete_if<F>(&self, pred: F, payload: P) -> LinkHandle
    where
        P: Clone,
        F: Fn() -> bool + 'static,
    {
        self.link_if(pred, payload).into_on_complete(true)
    }

    /// As [`link_when`](StateHandle::link_when), evaluated only once the
    /// origin state's task is done.
    pub fn on_complete_when<F>(&self, pred: F) -> LinkHandle
    where
        F: Fn() -> Option<P> + 'static,
    {
        self.link_when(pred).into_on_complete(true)
    }

    fn make(
        &self,
        eval: impl Fn(Option<&OnTransitionFn>) -> Option<TransitionEvent> + 'static,
        kind: LinkKind,
        has_condition: bool,
    ) -> LinkHandle {
        LinkHandle::new(Rc::new(eval), kind, has_condition)
    }
}

/// Handle to an exit state; builds links that terminate the FSM.
pub struct ExitHandle {
    id: StateId,
}

impl ExitHandle {
    /// This state's id: the value the FSM task returns when it exits here.
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Unconditional link into this exit state.
    pub fn link(&self) -> LinkHandle {
        let id = self.id;
        LinkHandle::new(
            Rc::new(move |tx| {
                fire(tx);
                Some(TransitionEvent {
                    new_task: None,
                    new_state_id: id,
                })
            }),
            LinkKind::Normal,
            false,
        )
    }

    /// Conditional link into this exit state.
    pub fn link_if<F>(&self, pred: F) -> LinkHandle
    where
        F: Fn() -> bool + 'static,
    {
        let id = self.id;
        LinkHandle::new(
            Rc::new(move |tx| {
                if pred() {
                    fire(tx);
                    Some(TransitionEvent {
                        new_task: None,
                        new_state_id: id,
                    })
                } else {
                    None
                }
            }),
            LinkKind::Normal,
            true,
        )
    }

    /// Unconditional on-complete link into this exit state.
    pub fn on_complete(&self) -> LinkHandle {
        self.link().into_on_complete(false)
    }

    /// Conditional on-complete link into this exit state.
    pub fn on_complete_if<F>(&self, pred: F) -> LinkHandle
    where
        F: Fn() -> bool + 'static,
    {
        self.link_if(pred).into_on_complete(true)
    }
}

/// Finite state machine over task factories.
pub struct TaskFsm {
    inner: Rc<FsmInner>,
}

impl Default for TaskFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFsm {
    /// Creates an empty FSM.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(FsmInner {
                states: RefCell::new(Vec::new()),
                entry_links: RefCell::new(Vec::new()),
                exit_states: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Adds a state whose factory takes no payload.
    pub fn state<F>(&mut self, name: impl Into<String>, factory: F) -> StateHandle<()>
    where
        F: Fn() -> Task<()> + 'static,
    {
        self.state_with(name, move |()| factory())
    }

    /// Adds a state whose factory consumes a payload synthesized by the
    /// link that enters it.
    pub fn state_with<P: 'static, F>(&mut self, name: impl Into<String>, factory: F) -> StateHandle<P>
    where
        F: Fn(P) -> Task<()> + 'static,
    {
        let id = self.push_state(name.into());
        StateHandle {
            inner: Rc::new(StateInner {
                id,
                factory: Box::new(factory),
            }),
        }
    }

    /// Adds an exit state: entering it terminates the FSM, which returns
    /// this state's id.
    pub fn exit_state(&mut self, name: impl Into<String>) -> ExitHandle {
        let id = self.push_state(name.into());
        self.inner.exit_states.borrow_mut().push(id);
        ExitHandle { id }
    }

    /// Sets the links evaluated before any state is active.
    ///
    /// # Panics
    ///
    /// Panics if the list contains an on-complete link (there is no current
    /// task for it to observe).
    pub fn entry_links(&mut self, links: Vec<LinkHandle>) {
        assert!(
            links.iter().all(|l| !l.is_on_complete()),
            "entry links may not contain on-complete links"
        );
        *self.inner.entry_links.borrow_mut() = links;
    }

    /// Sets the outgoing links of `origin`, in evaluation order.
    ///
    /// # Panics
    ///
    /// Panics if `origin`'s links were already set, or if an on-complete
    /// link follows an unconditional on-complete link (it would be
    /// unreachable).
    pub fn state_links<P: 'static>(&mut self, origin: &StateHandle<P>, links: Vec<LinkHandle>) {
        let mut unconditional_on_complete = 0;
        for link in &links {
            if link.is_on_complete() {
                assert!(
                    unconditional_on_complete == 0,
                    "unreachable on-complete link after an unconditional one"
                );
                if !link.has_condition() {
                    unconditional_on_complete += 1;
                }
            }
        }
        let mut states = self.inner.states.borrow_mut();
        let state = &mut states[origin.id().index()];
        assert!(
            state.outgoing.is_empty(),
            "outgoing links may only be set once per state"
        );
        state.outgoing = links;
    }

    /// Begins execution; the returned task runs the FSM until it enters an
    /// exit state and yields that state's id.
    ///
    /// `on_transition` fires on every transition; `debug_transition`
    /// additionally receives the transition details.
    #[must_use = "the FSM only runs while its task is resumed"]
    pub fn run(
        &self,
        on_transition: Option<OnTransitionFn>,
        debug_transition: Option<DebugTransitionFn>,
    ) -> Task<StateId> {
        let inner = self.inner.clone();
        Task::new(move |cx: TaskCtx| async move {
            cx.set_debug_name("TaskFsm");
            let mut current_id: Option<StateId> = None;
            let mut current_task: Option<Task<()>> = None;

            #[cfg(feature = "task-debug")]
            let current_for_debug = Rc::new(Cell::new(None::<StateId>));
            #[cfg(feature = "task-debug")]
            {
                let inner = inner.clone();
                let current = current_for_debug.clone();
                cx.set_debug_data(move || match current.get() {
                    Some(id) => inner.state_name(id),
                    None => "<ENTRY>".to_string(),
                });
            }

            loop {
                let current_complete = current_task.as_ref().is_none_or(Task::is_done);
                if let Some(event) =
                    inner.evaluate_links(current_id, current_complete, on_transition.as_ref())
                {
                    if let Some(report) = &debug_transition {
                        report(TransitionDebugData {
                            old_state_id: current_id,
                            old_state_name: current_id
                                .map_or_else(|| "<ENTRY>".to_string(), |id| inner.state_name(id)),
                            new_state_id: event.new_state_id,
                            new_state_name: inner.state_name(event.new_state_id),
                        });
                    }
                    debug!(state = %event.new_state_id, "fsm transition");
                    if inner.is_exit(event.new_state_id) {
                        return event.new_state_id;
                    }

                    current_id = Some(event.new_state_id);
                    #[cfg(feature = "task-debug")]
                    current_for_debug.set(current_id);

                    // Swap tasks: the old one leaves the stop fan-out and is
                    // killed by its drop; the new one joins it.
                    if let Some(old) = current_task.take() {
                        cx.remove_stop_target(&old);
                    }
                    let new_task = event
                        .new_task
                        .expect("transition into a non-exit state produced no task");
                    cx.add_stop_target(&new_task);
                    current_task = Some(new_task);
                }

                if let Some(task) = current_task.as_mut() {
                    task.resume();
                }
                cx.suspend().await;
            }
        })
    }

    fn push_state(&mut self, name: String) -> StateId {
        let mut states = self.inner.states.borrow_mut();
        let id = StateId(u32::try_from(states.len()).expect("state count overflow"));
        states.push(StateData {
            debug_name: name,
            outgoing: Vec::new(),
        });
        id
    }
}
