//! Shared fakes and builders for the engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mergeguard::attribute::AttributeReader;
use mergeguard::context::Context;
use mergeguard::guard::{
    ConfirmDecision, ConfirmPrompt, ConfirmationSurface, GuardController, PageHost, VisualState,
};
use mergeguard::page::{ElementId, NodeSpec, PageModel};
use mergeguard::policy::PolicyMap;
use mergeguard::remote::{
    AccountProfile, DecisionSource, Listing, NamespaceSummary, RefSummary, RemoteError,
    ResourceSummary,
};
use mergeguard::resolver::PolicyResolver;
use mergeguard::settings::{MemorySettingsStore, SettingsRecord};

/// Canonical pull-request URL used across the tests.
pub const PR_URL: &str = "https://bitbucket.org/teamx/svc/pull-requests/42";

// ---------------------------------------------------------------------------
// Fake page host
// ---------------------------------------------------------------------------

/// Page host that records interceptor installs, triggers, and paints.
#[derive(Default)]
pub struct FakeHost {
    page: Mutex<Arc<PageModel>>,
    installs: Mutex<Vec<ElementId>>,
    triggers: Mutex<Vec<ElementId>>,
    paints: Mutex<Vec<(ElementId, VisualState)>>,
}

impl FakeHost {
    pub fn new(page: PageModel) -> Self {
        Self {
            page: Mutex::new(Arc::new(page)),
            ..Self::default()
        }
    }

    /// Swap in a new page snapshot (simulates a DOM mutation batch).
    pub fn set_page(&self, page: PageModel) {
        *self.page.lock().expect("page lock") = Arc::new(page);
    }

    pub fn install_count(&self, element: ElementId) -> usize {
        self.installs
            .lock()
            .expect("installs lock")
            .iter()
            .filter(|e| **e == element)
            .count()
    }

    pub fn trigger_count(&self, element: ElementId) -> usize {
        self.triggers
            .lock()
            .expect("triggers lock")
            .iter()
            .filter(|e| **e == element)
            .count()
    }

    pub fn last_paint(&self, element: ElementId) -> Option<VisualState> {
        self.paints
            .lock()
            .expect("paints lock")
            .iter()
            .rev()
            .find(|(e, _)| *e == element)
            .map(|(_, state)| state.clone())
    }

    pub fn paint_count(&self, element: ElementId) -> usize {
        self.paints
            .lock()
            .expect("paints lock")
            .iter()
            .filter(|(e, _)| *e == element)
            .count()
    }
}

impl PageHost for FakeHost {
    fn page(&self) -> Arc<PageModel> {
        Arc::clone(&self.page.lock().expect("page lock"))
    }

    fn install_interceptor(&self, element: ElementId) {
        self.installs.lock().expect("installs lock").push(element);
    }

    fn trigger(&self, element: ElementId) {
        self.triggers.lock().expect("triggers lock").push(element);
    }

    fn paint(&self, element: ElementId, state: &VisualState) {
        self.paints
            .lock()
            .expect("paints lock")
            .push((element, state.clone()));
    }
}

// ---------------------------------------------------------------------------
// Fake decision source
// ---------------------------------------------------------------------------

/// What the fake API answers for destination lookups.
pub enum DestinationMode {
    Found(String),
    Missing,
    Fail,
}

/// Decision source with a scripted destination answer and a call counter.
pub struct FakeSource {
    mode: Mutex<DestinationMode>,
    destination_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(mode: DestinationMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            destination_calls: AtomicUsize::new(0),
        }
    }

    pub fn destination_calls(&self) -> usize {
        self.destination_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionSource for FakeSource {
    async fn destination(&self, _context: &Context) -> Result<Option<String>, RemoteError> {
        self.destination_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.mode.lock().expect("mode lock") {
            DestinationMode::Found(branch) => Ok(Some(branch.clone())),
            DestinationMode::Missing => Ok(None),
            DestinationMode::Fail => Err(RemoteError::HttpStatus(502)),
        }
    }

    async fn list_namespaces(&self) -> Listing<NamespaceSummary> {
        Listing::complete(Vec::new())
    }

    async fn list_resources(&self, _namespace: &str) -> Listing<ResourceSummary> {
        Listing::complete(Vec::new())
    }

    async fn list_refs(&self, _namespace: &str, _resource: &str) -> Listing<RefSummary> {
        Listing::complete(Vec::new())
    }

    async fn validate_credentials(&self) -> Result<AccountProfile, RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}

// ---------------------------------------------------------------------------
// Scripted confirmation surface
// ---------------------------------------------------------------------------

/// Confirmation surface that replays scripted decisions and records prompts.
#[derive(Default)]
pub struct ScriptedConfirm {
    decisions: Mutex<VecDeque<ConfirmDecision>>,
    prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl ScriptedConfirm {
    pub fn answering(decisions: &[ConfirmDecision]) -> Self {
        Self {
            decisions: Mutex::new(decisions.iter().copied().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl ConfirmationSurface for ScriptedConfirm {
    async fn confirm(&self, prompt: ConfirmPrompt) -> ConfirmDecision {
        self.prompts.lock().expect("prompts lock").push(prompt);
        self.decisions
            .lock()
            .expect("decisions lock")
            .pop_front()
            .unwrap_or(ConfirmDecision::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A pull-request page with a destination marker and a merge button.
///
/// Returns the page plus the merge button's element id.
pub fn pr_page(url: &str, destination: &str) -> (PageModel, ElementId) {
    let mut page = PageModel::new(url);
    page.insert(NodeSpec::marked_region("pr-destination-branch").with_text(destination));
    let button = page.insert(NodeSpec::button("Merge").with_marker("merge-button"));
    (page, button)
}

/// A pull-request page with a merge button but no readable destination.
pub fn pr_page_without_destination(url: &str) -> (PageModel, ElementId) {
    let mut page = PageModel::new(url);
    let button = page.insert(NodeSpec::button("Merge").with_marker("merge-button"));
    (page, button)
}

/// Settings store seeded with a policy map.
pub fn seeded_settings(entries: &[(&str, &[&str])]) -> Arc<MemorySettingsStore> {
    let mut policy = PolicyMap::new();
    for (repo, branches) in entries {
        policy.insert(
            (*repo).to_owned(),
            branches.iter().map(|b| (*b).to_owned()).collect(),
        );
    }
    Arc::new(MemorySettingsStore::with_record(SettingsRecord {
        policy_map: Some(policy),
        ..SettingsRecord::default()
    }))
}

/// A fully wired controller plus handles on its fakes.
pub struct TestRig {
    pub controller: GuardController,
    pub host: Arc<FakeHost>,
    pub source: Arc<FakeSource>,
    pub confirm: Arc<ScriptedConfirm>,
}

/// Wire a controller around the given page, destination mode, policy, and
/// scripted confirmation decisions.
pub fn rig(
    page: PageModel,
    mode: DestinationMode,
    policy: &[(&str, &[&str])],
    decisions: &[ConfirmDecision],
) -> TestRig {
    let host = Arc::new(FakeHost::new(page));
    let source = Arc::new(FakeSource::new(mode));
    let confirm = Arc::new(ScriptedConfirm::answering(decisions));
    let settings = seeded_settings(policy);

    let resolver = PolicyResolver::new(
        AttributeReader::new(),
        Arc::clone(&source) as Arc<dyn DecisionSource>,
        settings,
    );
    let controller = GuardController::new(
        Arc::clone(&host) as Arc<dyn PageHost>,
        Arc::clone(&confirm) as Arc<dyn ConfirmationSurface>,
        resolver,
    );

    TestRig {
        controller,
        host,
        source,
        confirm,
    }
}
