//! Tests for representation sessions and the subscription dispatcher

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use futures_util::{pin_mut, StreamExt};
use tokio::time::timeout;

use treeview::application::services::{Subscription, SubscriptionDispatcher, TreeEvent};
use treeview::application::{ApplicationError, DescriptionRegistry, TreeDescription};
use treeview::config::SessionSettings;
use treeview::domain::{
    CanonicalPath, DomainGraphBuilder, DomainNode, DomainResult, ExpansionSet, IdentityCodec,
    RepresentationIdentifier, Tree,
};
use treeview::infrastructure::feed::ChangeFeed;
use treeview::infrastructure::model::InMemoryModel;
use treeview::infrastructure::traits::DomainModel;
use treeview::util::testing;

const CTX: &str = "demo";
const WAIT: Duration = Duration::from_secs(5);

const DOCUMENT: &str = r#"
editing_context = "demo"

[[objects]]
name = "Project"
kind = "Project"

[[objects.children]]
name = "model.domain"
kind = "Resource"

[[objects]]
name = "notes"
kind = "Resource"
"#;

/// Holds materializations back until opened.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    fn wait(&self) {
        let open = self.open.lock().unwrap();
        let _open = self
            .opened
            .wait_timeout_while(open, WAIT, |open| !*open)
            .unwrap();
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

/// Forwards to an in-memory model and counts materializations.
struct CountingModel {
    inner: Arc<InMemoryModel>,
    materializations: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl DomainModel for CountingModel {
    fn kind(&self) -> &str {
        "counting"
    }

    fn contains_context(&self, editing_context_id: &str) -> bool {
        self.inner.contains_context(editing_context_id)
    }

    fn elements(&self, editing_context_id: &str, target_object_id: &str) -> DomainResult<Vec<DomainNode>> {
        self.materializations.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.inner.elements(editing_context_id, target_object_id)
    }

    fn is_element(&self, editing_context_id: &str, target_object_id: &str, node: &DomainNode) -> bool {
        self.inner.is_element(editing_context_id, target_object_id, node)
    }

    fn has_children(&self, editing_context_id: &str, node: &DomainNode) -> bool {
        self.inner.has_children(editing_context_id, node)
    }

    fn children_of(
        &self,
        editing_context_id: &str,
        node: &DomainNode,
        expanded: &ExpansionSet,
    ) -> DomainResult<Vec<DomainNode>> {
        self.inner.children_of(editing_context_id, node, expanded)
    }

    fn parent_of(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<Option<DomainNode>> {
        self.inner.parent_of(editing_context_id, node)
    }

    fn canonical_path(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<CanonicalPath> {
        self.inner.canonical_path(editing_context_id, node)
    }

    fn codec(&self) -> IdentityCodec {
        self.inner.codec()
    }

    fn object_for_tree_item(&self, editing_context_id: &str, tree_item_id: &str) -> Option<DomainNode> {
        self.inner.object_for_tree_item(editing_context_id, tree_item_id)
    }

    fn property(&self, editing_context_id: &str, node: &DomainNode, name: &str) -> Option<String> {
        self.inner.property(editing_context_id, node, name)
    }
}

struct Fixture {
    model: Arc<InMemoryModel>,
    feed: ChangeFeed,
    dispatcher: SubscriptionDispatcher,
    representation: RepresentationIdentifier,
}

fn setup() -> Fixture {
    testing::init_test_setup();
    let feed = ChangeFeed::new(256);
    let model = Arc::new(InMemoryModel::new(IdentityCodec::default(), feed.clone()));
    model.load(DomainGraphBuilder::from_toml(DOCUMENT).expect("valid document"));

    let registry = Arc::new(DescriptionRegistry::new());
    let description_id = registry.register(TreeDescription::explorer(model.clone()));
    let dispatcher = SubscriptionDispatcher::new(registry, feed.clone(), SessionSettings::default());
    Fixture {
        model,
        feed,
        dispatcher,
        representation: RepresentationIdentifier::new(description_id, CTX, ExpansionSet::new()),
    }
}

async fn next_tree(subscription: &mut Subscription) -> Arc<Tree> {
    timeout(WAIT, subscription.next_tree())
        .await
        .expect("event within timeout")
        .expect("session still open")
}

fn label_of(tree: &Tree, object_id: &str) -> String {
    tree.items()
        .find(|item| item.object_id == object_id)
        .map(|item| item.label.to_string())
        .unwrap_or_default()
}

/// Poll until `condition` holds or the timeout elapses.
async fn eventually(condition: impl Fn() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition within timeout");
}

// ============================================================
// Fan-out and replay
// ============================================================

#[tokio::test]
async fn given_two_subscribers_when_snapshot_published_then_both_see_same_tree() {
    // Arrange
    let f = setup();
    let mut first = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();

    // Act
    let seen_by_first = next_tree(&mut first).await;
    let mut second = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    let seen_by_second = next_tree(&mut second).await;

    // Assert
    assert_eq!(seen_by_first.id, seen_by_second.id, "late subscriber gets the cached snapshot");
    assert_eq!(f.dispatcher.session_count(), 1);
    assert_eq!(f.dispatcher.subscriber_count(CTX, &f.representation), 2);
}

#[tokio::test]
async fn given_two_subscribers_when_domain_changes_then_both_receive_refresh() {
    // Arrange
    let f = setup();
    let mut first = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    let mut second = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut first).await;
    next_tree(&mut second).await;

    // Act
    f.model.rename(CTX, "notes", "journal").unwrap();
    let a = next_tree(&mut first).await;
    let b = next_tree(&mut second).await;

    // Assert
    assert_eq!(a.id, b.id);
    assert_eq!(label_of(&a, "notes"), "journal");
}

#[tokio::test]
async fn given_different_expansion_sets_when_subscribe_then_separate_sessions() {
    let f = setup();
    let widened = f
        .representation
        .with_expanded(["some-id"].into_iter().collect());

    let _plain = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    let _wide = f.dispatcher.subscribe(CTX, widened).unwrap();

    assert_eq!(f.dispatcher.session_count(), 2);
}

#[tokio::test]
async fn given_subscription_when_streamed_then_yields_snapshots() {
    // Arrange
    let f = setup();
    let subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    let stream = subscription.into_stream();
    pin_mut!(stream);

    // Act
    let event = timeout(WAIT, stream.next()).await.unwrap();

    // Assert
    assert!(matches!(event, Some(TreeEvent::Refreshed(_))));
}

// ============================================================
// Refresh triggers
// ============================================================

#[tokio::test]
async fn given_irrelevant_change_when_refreshing_then_unchanged_tree_not_republished() {
    // Arrange
    let f = setup();
    let mut subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    let initial = next_tree(&mut subscription).await;

    // Act: a property the tree does not show, then a visible rename
    f.model.set_property(CTX, "notes", "comment", "ignored").unwrap();
    f.model.rename(CTX, "notes", "journal").unwrap();
    let next = next_tree(&mut subscription).await;

    // Assert
    assert_ne!(initial.id, next.id);
    assert_eq!(label_of(&next, "notes"), "journal");
}

#[tokio::test]
async fn given_change_in_other_context_when_published_then_session_ignores_it() {
    // Arrange
    let f = setup();
    let mut subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut subscription).await;

    // Act
    f.model.load(
        DomainGraphBuilder::from_toml("editing_context = \"other\"\n[[objects]]\nname = \"x\"\nkind = \"Project\"\n")
            .unwrap(),
    );
    f.model.rename(CTX, "notes", "journal").unwrap();
    let next = next_tree(&mut subscription).await;

    // Assert
    assert_eq!(label_of(&next, "notes"), "journal");
}

#[tokio::test]
async fn given_burst_of_changes_when_refreshing_then_coalesced() {
    // Arrange
    testing::init_test_setup();
    let feed = ChangeFeed::new(256);
    let inner = Arc::new(InMemoryModel::new(IdentityCodec::default(), feed.clone()));
    inner.load(DomainGraphBuilder::from_toml(DOCUMENT).unwrap());
    let counting = Arc::new(CountingModel {
        inner: inner.clone(),
        materializations: AtomicUsize::new(0),
        gate: None,
    });
    let registry = Arc::new(DescriptionRegistry::new());
    let description_id = registry.register(TreeDescription::explorer(counting.clone()));
    let dispatcher = SubscriptionDispatcher::new(registry, feed, SessionSettings::default());
    let representation = RepresentationIdentifier::new(description_id, CTX, ExpansionSet::new());

    let mut subscription = dispatcher.subscribe(CTX, representation).unwrap();
    next_tree(&mut subscription).await;
    let before = counting.materializations.load(Ordering::SeqCst);

    // Act
    for i in 0..50 {
        inner.rename(CTX, "notes", &format!("notes-{i}")).unwrap();
    }
    let mut latest = next_tree(&mut subscription).await;
    while label_of(&latest, "notes") != "notes-49" {
        latest = next_tree(&mut subscription).await;
    }

    // Assert
    let during = counting.materializations.load(Ordering::SeqCst) - before;
    assert!(during >= 1);
    assert!(during <= 3, "burst of 50 changes cost {during} materializations");
}

#[tokio::test]
async fn given_active_session_when_refresh_requested_then_accepted() {
    let f = setup();
    let mut subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut subscription).await;

    assert!(f.dispatcher.refresh(CTX, &f.representation).is_ok());
}

#[tokio::test]
async fn given_no_session_when_refresh_requested_then_session_closed() {
    let f = setup();

    let result = f.dispatcher.refresh(CTX, &f.representation);

    assert!(matches!(result, Err(ApplicationError::SessionClosed)));
}

// ============================================================
// Lifecycle
// ============================================================

#[tokio::test]
async fn given_last_subscriber_dropped_when_detached_then_session_released() {
    // Arrange
    let f = setup();
    let baseline = f.feed.receiver_count();
    let mut subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut subscription).await;
    assert_eq!(f.feed.receiver_count(), baseline + 1);

    // Act
    drop(subscription);

    // Assert
    assert_eq!(f.dispatcher.session_count(), 0);
    assert!(f.dispatcher.latest(CTX, &f.representation).is_none());
    eventually(|| f.feed.receiver_count() == baseline).await;
}

#[tokio::test]
async fn given_materialization_running_when_last_subscriber_dropped_then_session_ends_without_publishing() {
    // Arrange
    testing::init_test_setup();
    let feed = ChangeFeed::new(16);
    let inner = Arc::new(InMemoryModel::new(IdentityCodec::default(), feed.clone()));
    inner.load(DomainGraphBuilder::from_toml(DOCUMENT).expect("valid document"));
    let gate = Arc::new(Gate::default());
    let gated = Arc::new(CountingModel {
        inner,
        materializations: AtomicUsize::new(0),
        gate: Some(gate.clone()),
    });
    let registry = Arc::new(DescriptionRegistry::new());
    let description_id = registry.register(TreeDescription::explorer(gated.clone()));
    let dispatcher = SubscriptionDispatcher::new(registry, feed.clone(), SessionSettings::default());
    let representation = RepresentationIdentifier::new(description_id, CTX, ExpansionSet::new());
    let baseline = feed.receiver_count();

    let subscription = dispatcher.subscribe(CTX, representation.clone()).unwrap();
    eventually(|| gated.materializations.load(Ordering::SeqCst) == 1).await;

    // Act
    drop(subscription);

    // Assert: the session task is gone while its materialization is still blocked
    assert_eq!(dispatcher.session_count(), 0);
    eventually(|| feed.receiver_count() == baseline).await;
    assert!(dispatcher.latest(CTX, &representation).is_none());

    gate.open();
    let mut fresh = dispatcher.subscribe(CTX, representation.clone()).unwrap();
    let tree = next_tree(&mut fresh).await;
    assert_eq!(gated.materializations.load(Ordering::SeqCst), 2);
    assert_eq!(tree.children.len(), 2);
    assert_eq!(dispatcher.session_count(), 1);
}

#[tokio::test]
async fn given_one_of_two_subscribers_dropped_when_detached_then_session_survives() {
    let f = setup();
    let mut first = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    let second = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut first).await;

    drop(second);
    f.model.rename(CTX, "notes", "journal").unwrap();
    let next = next_tree(&mut first).await;

    assert_eq!(f.dispatcher.session_count(), 1);
    assert_eq!(label_of(&next, "notes"), "journal");
}

#[tokio::test]
async fn given_editing_context_dropped_when_refreshing_then_terminated_and_evicted() {
    // Arrange
    let f = setup();
    let mut subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut subscription).await;

    // Act
    f.model.drop_context(CTX).unwrap();
    let event = timeout(WAIT, subscription.next()).await.unwrap();

    // Assert
    assert!(matches!(event, Some(TreeEvent::Terminated { .. })));
    assert!(timeout(WAIT, subscription.next()).await.unwrap().is_none());
    eventually(|| f.dispatcher.session_count() == 0).await;
}

#[tokio::test]
async fn given_missing_editing_context_when_subscribe_then_terminated_event() {
    let f = setup();
    let mut subscription = f.dispatcher.subscribe("missing", f.representation.clone()).unwrap();

    let event = timeout(WAIT, subscription.next()).await.unwrap();

    assert!(matches!(event, Some(TreeEvent::Terminated { .. })));
}

#[tokio::test]
async fn given_unknown_description_when_subscribe_then_error() {
    let f = setup();
    let representation = RepresentationIdentifier::new("nope", CTX, ExpansionSet::new());

    let result = f.dispatcher.subscribe(CTX, representation);

    assert!(matches!(result, Err(ApplicationError::UnknownDescription(_))));
    assert_eq!(f.dispatcher.session_count(), 0);
}

#[test]
fn given_no_runtime_when_subscribe_then_error() {
    let f = setup();

    let result = f.dispatcher.subscribe(CTX, f.representation.clone());

    assert!(matches!(result, Err(ApplicationError::OperationFailed { .. })));
}

#[tokio::test]
async fn given_active_sessions_when_shutdown_then_subscribers_end() {
    let f = setup();
    let mut subscription = f.dispatcher.subscribe(CTX, f.representation.clone()).unwrap();
    next_tree(&mut subscription).await;

    f.dispatcher.shutdown();

    assert_eq!(f.dispatcher.session_count(), 0);
    assert!(timeout(WAIT, subscription.next()).await.unwrap().is_none());
}
