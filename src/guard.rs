//! The merge-button guard: interception, verdicts, visual state, lifecycle.
//!
//! [`GuardController`] owns all mutable engine state (verdict cache, guarded
//! set, allow-next gates, change-watcher state) behind one instantiable
//! object with a `start`/`stop` lifecycle, so tests can run independent
//! instances side by side. The host wires it up as follows:
//!
//! - on every mutation batch, call [`GuardController::scan`];
//! - install a capture-phase interceptor on the element the controller
//!   [`attach`](GuardController::attach)es, which suppresses the native
//!   action and calls [`GuardController::on_action`] — unless `on_action`'s
//!   synchronous gate check returns [`GuardOutcome::Passed`], in which case
//!   the native action must proceed untouched.
//!
//! The allow-next gate is a per-element one-shot: arming it lets exactly one
//! re-triggered action through, which is what prevents the guard from
//! intercepting its own programmatic re-trigger forever.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::extract_context;
use crate::page::{ElementId, PageModel};
use crate::resolver::PolicyResolver;
use crate::verdict::Verdict;
use crate::watcher::ChangeWatcher;

/// Desired rendering of a guarded element, handed to the host.
///
/// Painting is declarative: the host must replace any previous treatment
/// (remove the old banner before adding a new one), so repeated paints never
/// accumulate artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualState {
    /// No warning: restore the element's native look.
    Clear,
    /// Destination is not allowed: apply warning styling and show an
    /// explanatory indicator next to the element.
    Warn {
        /// The unexpected destination branch.
        destination: String,
        /// Configured allowed branches (empty = none configured).
        allowed_destinations: Vec<String>,
    },
}

impl VisualState {
    /// Visual state for a verdict.
    pub fn from_verdict(verdict: &Verdict) -> Self {
        if verdict.is_allowing() {
            return Self::Clear;
        }
        Self::Warn {
            destination: verdict.destination.clone().unwrap_or_default(),
            allowed_destinations: verdict.allowed_set.clone().unwrap_or_default(),
        }
    }
}

/// What the confirmation surface shows for a denied merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    /// The unexpected destination branch.
    pub destination: String,
    /// Configured allowed branches (empty = none configured).
    pub allowed_destinations: Vec<String>,
}

/// The user's answer to a confirmation prompt. Dismissal is a cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    /// Merge anyway.
    Confirmed,
    /// Leave the action blocked.
    Cancelled,
}

/// Host-side view of the live page and its rendering.
///
/// All methods are synchronous: the host answers from its current state and
/// performs UI effects without suspending.
pub trait PageHost: Send + Sync {
    /// Snapshot of the current page structure. Called again after every
    /// suspension point — captured snapshots are not trusted across awaits.
    fn page(&self) -> Arc<PageModel>;

    /// Install the capture-phase interceptor on an element. Called at most
    /// once per element identity.
    fn install_interceptor(&self, element: ElementId);

    /// Programmatically re-trigger the element's native action. The
    /// controller arms the allow-next gate first, so the re-entrant
    /// `on_action` call passes it through.
    fn trigger(&self, element: ElementId);

    /// Render the given visual state for the element.
    fn paint(&self, element: ElementId, state: &VisualState);
}

/// Blocking confirmation surface for denied merges.
///
/// `confirm` suspends until the user decides — possibly forever; there is no
/// timeout, and dismissal must resolve as [`ConfirmDecision::Cancelled`].
#[async_trait]
pub trait ConfirmationSurface: Send + Sync {
    /// Show the prompt and await the user's decision.
    async fn confirm(&self, prompt: ConfirmPrompt) -> ConfirmDecision;
}

/// How one intercepted action was concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The allow-next gate was armed: the native action proceeds untouched.
    Passed,
    /// Not a pull-request page: guarding does not apply, the action was
    /// re-triggered immediately (fail open).
    NotApplicable,
    /// The verdict allowed the merge; the action was re-triggered.
    Allowed(Verdict),
    /// The user confirmed a denied merge; the action was re-triggered.
    Confirmed(Verdict),
    /// The user cancelled; the action stays blocked until a new attempt.
    Cancelled(Verdict),
    /// The user confirmed but the element had left the page; nothing was
    /// re-triggered.
    Detached(Verdict),
}

/// Per-element guard bookkeeping.
#[derive(Debug, Default)]
struct GuardSets {
    /// Elements already fitted with an interceptor (identity membership).
    guarded: HashSet<ElementId>,
    /// Elements whose allow-next gate is armed for exactly one pass-through.
    armed: HashSet<ElementId>,
}

/// The interception/reconciliation core.
pub struct GuardController {
    host: Arc<dyn PageHost>,
    confirm: Arc<dyn ConfirmationSurface>,
    resolver: PolicyResolver,
    sets: Mutex<GuardSets>,
    watcher: Mutex<ChangeWatcher>,
    started: AtomicBool,
}

impl GuardController {
    /// Build a controller over the given collaborators. Inert until
    /// [`start`](Self::start).
    pub fn new(
        host: Arc<dyn PageHost>,
        confirm: Arc<dyn ConfirmationSurface>,
        resolver: PolicyResolver,
    ) -> Self {
        Self {
            host,
            confirm,
            resolver,
            sets: Mutex::new(GuardSets::default()),
            watcher: Mutex::new(ChangeWatcher::new()),
            started: AtomicBool::new(false),
        }
    }

    /// The resolver (and through it the verdict cache).
    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// Start guarding: runs one initial scan, then expects the host to call
    /// [`scan`](Self::scan) on every mutation batch.
    pub async fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        info!("merge guard started");
        self.scan().await;
    }

    /// Stop guarding and drop all transient state. The host is expected to
    /// remove its interceptors; a stray `on_action` after `stop` passes the
    /// action through.
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.resolver.cache().clear();
        if let Ok(mut sets) = self.sets.lock() {
            sets.guarded.clear();
            sets.armed.clear();
        }
        if let Ok(mut watcher) = self.watcher.lock() {
            watcher.reset();
        }
        info!("merge guard stopped");
    }

    /// Whether an element is already guarded.
    pub fn is_guarded(&self, element: ElementId) -> bool {
        self.sets
            .lock()
            .map(|sets| sets.guarded.contains(&element))
            .unwrap_or(false)
    }

    /// Mark an element guarded and install the host interceptor.
    ///
    /// Idempotent by construction: membership is tested before the insert,
    /// so a second call for the same element identity is a no-op and the
    /// interceptor is installed exactly once. Returns `true` when the
    /// element was newly guarded.
    pub fn attach(&self, element: ElementId) -> bool {
        let newly = self
            .sets
            .lock()
            .map(|mut sets| sets.guarded.insert(element))
            .unwrap_or(false);
        if newly {
            self.host.install_interceptor(element);
            debug!(element, "merge trigger guarded");
        }
        newly
    }

    /// Paint the visual state for a verdict onto an element.
    pub fn paint(&self, element: ElementId, verdict: &Verdict) {
        self.host.paint(element, &VisualState::from_verdict(verdict));
    }

    // -----------------------------------------------------------------------
    // Change watching
    // -----------------------------------------------------------------------

    /// Re-run detection after a mutation batch (and once at startup).
    ///
    /// Re-derives URL and destination, invalidates verdicts made stale by
    /// navigation or a destination edit, then attaches/repaints the merge
    /// trigger as needed. No-op while stopped.
    pub async fn scan(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }

        let page = self.host.page();
        let destination = self.resolver.reader().read(&page);

        let delta = match self.watcher.lock() {
            Ok(mut watcher) => watcher.observe(page.url(), destination.as_deref()),
            Err(_) => return,
        };

        if delta.navigated {
            if let Some(previous) = &delta.previous_instance {
                self.resolver.cache().invalidate(previous);
            }
        }
        if delta.destination_changed {
            if let Some(context) = extract_context(page.url()) {
                self.resolver.cache().invalidate(&context.instance_id);
            }
        }

        let Some(button) = page.find_merge_trigger() else {
            return;
        };

        if self.attach(button) || delta.navigated || delta.destination_changed {
            self.resolve_and_paint(button, &page).await;
        }
    }

    /// Resolve the current verdict and paint it, when on a pull-request
    /// page.
    async fn resolve_and_paint(&self, element: ElementId, page: &PageModel) {
        let Some(context) = extract_context(page.url()) else {
            return;
        };
        let verdict = self.resolver.resolve(&context, page).await;
        self.paint(element, &verdict);
    }

    // -----------------------------------------------------------------------
    // Interception
    // -----------------------------------------------------------------------

    /// Handle an action on a guarded element.
    ///
    /// The gate check is the synchronous head of this future: the host must
    /// suppress the native action before awaiting, and let it proceed only
    /// when the outcome is [`GuardOutcome::Passed`]. Every await is followed
    /// by a fresh [`PageHost::page`] snapshot — state captured before a
    /// suspension point is never trusted after it.
    pub async fn on_action(&self, element: ElementId) -> GuardOutcome {
        if self.consume_gate(element) {
            return GuardOutcome::Passed;
        }
        if !self.started.load(Ordering::SeqCst) {
            // Stopped controllers never hold an action hostage.
            return GuardOutcome::Passed;
        }

        let page = self.host.page();
        let Some(context) = extract_context(page.url()) else {
            // Guarding is inapplicable off-context: fail open.
            self.arm_gate(element);
            self.host.trigger(element);
            return GuardOutcome::NotApplicable;
        };

        let verdict = self.resolver.resolve(&context, &page).await;
        if verdict.is_allowing() {
            self.arm_gate(element);
            self.host.trigger(element);
            return GuardOutcome::Allowed(verdict);
        }

        let prompt = ConfirmPrompt {
            destination: verdict.destination.clone().unwrap_or_default(),
            allowed_destinations: verdict.allowed_set.clone().unwrap_or_default(),
        };
        match self.confirm.confirm(prompt).await {
            ConfirmDecision::Confirmed => {
                // The user may have taken arbitrarily long: re-check that
                // the element is still part of the page.
                if self.host.page().contains(element) {
                    self.arm_gate(element);
                    self.host.trigger(element);
                    GuardOutcome::Confirmed(verdict)
                } else {
                    GuardOutcome::Detached(verdict)
                }
            }
            ConfirmDecision::Cancelled => GuardOutcome::Cancelled(verdict),
        }
    }

    /// Arm the allow-next gate for one pass-through.
    fn arm_gate(&self, element: ElementId) {
        if let Ok(mut sets) = self.sets.lock() {
            sets.armed.insert(element);
        }
    }

    /// Consume the gate if armed. At most one unsuppressed action passes per
    /// explicit allow decision.
    fn consume_gate(&self, element: ElementId) -> bool {
        self.sets
            .lock()
            .map(|mut sets| sets.armed.remove(&element))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for GuardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardController")
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
