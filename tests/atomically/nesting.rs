use atomic_odm::{AtomicOptions, OdmError, WriteOperation};
use serde_json::json;

use crate::support::{object, saved_artist, session, Artist};

#[derive(Debug, PartialEq)]
enum TourError {
    Cancelled,
    Odm(OdmError),
}

impl From<OdmError> for TourError {
    fn from(err: OdmError) -> Self {
        TourError::Odm(err)
    }
}

#[test]
fn joined_child_rolls_back_with_failing_parent() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Michael");
    session.set(&mut artist, "age", 50).unwrap();
    let writes_before = session.store().write_count();

    let result: Result<(), TourError> =
        session.atomically(&mut artist, AtomicOptions::new().join_context(false), |session, artist| {
            session.atomically(artist, AtomicOptions::joined(), |session, artist| {
                session.inc(artist, "age", 1)?;
                session.set(artist, "name", "Jake")?;
                Ok::<_, OdmError>(())
            })?;
            assert_eq!(artist.get("age"), Some(&json!(51)));
            Err(TourError::Cancelled)
        });

    assert_eq!(result, Err(TourError::Cancelled));
    assert_eq!(session.store().write_count(), writes_before);
    assert_eq!(artist.get("age"), Some(&json!(50)));
    assert_eq!(artist.get("name"), Some(&json!("Michael")));
    assert!(!artist.entity.changed());
}

#[test]
fn unjoined_children_flush_separately() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.atomically(artist, AtomicOptions::new().join_context(false), |session, artist| {
                session.set(artist, "x", 1)
            })?;
            session.atomically(artist, AtomicOptions::new(), |session, artist| {
                session.set(artist, "y", 2)
            })?;
            assert_eq!(session.store().write_count(), 3);
            Ok::<_, OdmError>(())
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(writes.len(), 3);
    let id = artist.entity.id().to_string();
    assert_eq!(
        writes[1].operation,
        WriteOperation::UpdateById {
            id: id.clone(),
            operators: object(json!({"$set": {"x": 1}})),
        }
    );
    assert_eq!(
        writes[2].operation,
        WriteOperation::UpdateById {
            id,
            operators: object(json!({"$set": {"y": 2}})),
        }
    );
}

#[test]
fn unjoined_child_of_unsaved_entity_writes_only_its_own_changes() {
    let mut session = session();
    let mut artist = Artist::default();

    let result: Result<(), TourError> =
        session.atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.set(artist, "a", 1)?;
            session.atomically(artist, AtomicOptions::new().join_context(false), |session, artist| {
                session.set(artist, "x", 1)
            })?;
            Err(TourError::Cancelled)
        });
    assert_eq!(result, Err(TourError::Cancelled));

    let writes = session.store().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].operation,
        WriteOperation::Upsert {
            filter: object(json!({"_id": artist.entity.id()})),
            operators: object(json!({"$set": {"x": 1}})),
        }
    );

    let target = session.resolve_target(&artist);
    let stored = session.store().document(&target, artist.entity.id()).unwrap();
    assert_eq!(stored.get("a"), None);
    assert_eq!(stored["x"], json!(1));
    assert_eq!(artist.get("a"), None);
    assert_eq!(artist.get("x"), Some(&json!(1)));
    assert!(artist.entity.is_persisted());
    assert!(!artist.entity.changed());
}

#[test]
fn unjoined_children_resolve_targets_independently() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.override_database("temp");
            session.atomically(artist, AtomicOptions::new(), |session, artist| {
                session.set(artist, "x", 1)
            })?;
            session.reset_override();
            session.atomically(artist, AtomicOptions::new(), |session, artist| {
                session.set(artist, "y", 2)
            })
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(writes[1].target.database, "temp");
    assert_eq!(writes[2].target.database, "music");
}

#[test]
fn joined_changes_flush_with_the_parent() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.inc(artist, "likes", 1)?;
            session.atomically(artist, AtomicOptions::joined(), |session, artist| {
                session.inc(artist, "likes", 2)?;
                session.push(artist, "albums", "Blue")
            })?;
            assert_eq!(session.store().write_count(), 1);
            Ok::<_, OdmError>(())
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[1].operation,
        WriteOperation::UpdateById {
            id: artist.entity.id().to_string(),
            operators: object(json!({"$inc": {"likes": 3}, "$push": {"albums": "Blue"}})),
        }
    );
}

#[test]
fn depth_tracks_open_contexts() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            assert_eq!(session.depth(artist), 1);
            session.atomically(artist, AtomicOptions::joined(), |session, artist| {
                assert_eq!(session.depth(artist), 2);
                Ok::<_, OdmError>(())
            })?;
            assert_eq!(session.depth(artist), 1);
            Ok::<_, OdmError>(())
        })
        .unwrap();
    assert_eq!(session.depth(&artist), 0);
}
