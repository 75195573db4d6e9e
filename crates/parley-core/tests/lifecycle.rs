//! End-to-end walk through the message lifecycle: login, direct and group
//! conversations, send, react, forward, delete, leave.

use std::sync::Arc;

use parley_core::CoreError;
use parley_core::conversations::ConversationRegistry;
use parley_core::identity::IdentityStore;
use parley_core::messages::MessageLedger;
use parley_core::photos::{MemoryPhotoStore, PhotoStore};
use parley_db::Database;

fn services() -> (IdentityStore, ConversationRegistry, MessageLedger) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let photos: Arc<dyn PhotoStore> = Arc::new(MemoryPhotoStore::default());
    (
        IdentityStore::new(db.clone(), photos.clone()),
        ConversationRegistry::new(db.clone(), photos),
        MessageLedger::new(db),
    )
}

#[test]
fn full_message_lifecycle() {
    let (identity, registry, ledger) = services();

    // Alice and Bob log in; Alice opens a direct conversation with Bob.
    let alice = identity.login_or_create("a1", "Alice").unwrap();
    let bob = identity.login_or_create("b1", "Bobby").unwrap();
    let c1 = registry.create_direct(&alice.token, "b1").unwrap();

    // Alice sends "hi"; Bob reacts with a thumbs-up.
    let m1 = ledger.send(&alice.token, &c1, "hi").unwrap();
    ledger.react(&bob.token, &m1, "👍").unwrap();

    // Alice forwards m1 into a group both are members of.
    let g1 = registry
        .create_group(&alice.token, "weekend", &["b1".to_string()])
        .unwrap();
    let m2 = ledger.forward(&alice.token, &m1, &g1).unwrap();
    assert_ne!(m1, m2);

    let group_view = registry.get(&bob.token, &g1).unwrap();
    assert_eq!(group_view.messages.len(), 1);
    assert_eq!(group_view.messages[0].forwarded_from.as_deref(), Some(m1.as_str()));
    assert_eq!(group_view.messages[0].content, "hi");

    // Alice deletes m1: tombstoned in place, the forwarded copy unaffected.
    ledger.delete(&alice.token, &m1).unwrap();

    let direct_view = registry.get(&bob.token, &c1).unwrap();
    assert_eq!(direct_view.messages.len(), 1);
    assert!(direct_view.messages[0].deleted);
    assert_eq!(direct_view.messages[0].content, "");
    // the reaction set survives for audit consistency
    assert_eq!(direct_view.messages[0].reactions.len(), 1);

    let group_view = registry.get(&alice.token, &g1).unwrap();
    assert_eq!(group_view.messages[0].content, "hi");
    assert!(!group_view.messages[0].deleted);

    // Bob leaves the group; Alice remains, so the group stays active.
    registry.leave(&bob.token, &g1).unwrap();
    ledger.send(&alice.token, &g1, "alone now").unwrap();

    // Bob is no longer a participant and may not read or write.
    assert!(matches!(
        registry.get(&bob.token, &g1),
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        ledger.send(&bob.token, &g1, "hello?"),
        Err(CoreError::Forbidden(_))
    ));

    // Once Alice leaves too, the group reaches its terminal state.
    registry.leave(&alice.token, &g1).unwrap();
    assert!(matches!(
        ledger.send(&alice.token, &g1, "echo"),
        Err(CoreError::Gone(_))
    ));

    // The direct conversation is unaffected throughout.
    let summaries = registry.list_for(&alice.token).unwrap();
    assert!(summaries.iter().any(|s| s.id == c1));
}
