use atomic_odm::{AtomicOptions, OdmError, Session, WriteOperation};
use serde_json::{json, Value};

use crate::support::{init_tracing, object, saved_artist, FailingStore};

fn failing_session() -> (Session<FailingStore>, FailingStore) {
    init_tracing();
    let store = FailingStore::new();
    (Session::new(store.clone()), store)
}

#[test]
fn failed_flush_keeps_changes_in_memory() {
    let (mut session, store) = failing_session();
    let mut artist = saved_artist(&mut session, "Jake");
    store.fail();

    let err = session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.inc(artist, "likes", 5)?;
            session.set(artist, "name", "Jay")
        })
        .unwrap_err();

    assert!(err.is_storage_failure());
    assert!(matches!(err, OdmError::StorageWrite { ref message, .. } if message == "write concern timeout"));
    assert_eq!(artist.get("likes"), Some(&json!(5)));
    assert_eq!(artist.get("name"), Some(&json!("Jay")));
    assert!(artist.entity.changed());
    assert_eq!(
        Value::Object(session.pending(&artist)),
        json!({"$inc": {"likes": 5}, "$set": {"name": "Jay"}})
    );
}

#[test]
fn retained_changes_go_out_with_the_next_flush() {
    let (mut session, store) = failing_session();
    let mut artist = saved_artist(&mut session, "Jake");

    store.fail();
    assert!(session.inc(&mut artist, "likes", 5).is_err());
    assert!(session.inc(&mut artist, "likes", 1).is_err());
    store.recover();

    session.push(&mut artist, "albums", "Blue").unwrap();

    let writes = store.inner().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[1].operation,
        WriteOperation::UpdateById {
            id: artist.entity.id().to_string(),
            operators: object(json!({"$inc": {"likes": 6}, "$push": {"albums": "Blue"}})),
        }
    );
    assert!(session.pending(&artist).is_empty());
    assert!(!artist.entity.changed());
}

#[test]
fn application_error_after_failed_flush_keeps_retained_changes() {
    let (mut session, store) = failing_session();
    let mut artist = saved_artist(&mut session, "Jake");

    store.fail();
    assert!(session.set(&mut artist, "name", "Jay").is_err());
    store.recover();

    let result = session.atomically(&mut artist, AtomicOptions::new(), |session, artist| {
        session.inc(artist, "likes", 1)?;
        Err::<(), _>(OdmError::Config("aborted".into()))
    });
    assert_eq!(result, Err(OdmError::Config("aborted".into())));
    assert_eq!(artist.get("likes"), None);
    assert_eq!(artist.get("name"), Some(&json!("Jay")));
    assert_eq!(
        Value::Object(session.pending(&artist)),
        json!({"$set": {"name": "Jay"}})
    );
}
