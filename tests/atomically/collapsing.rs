use atomic_odm::{AtomicOptions, OdmError, Outcome, WriteOperation};
use serde_json::json;

use crate::support::{object, saved_artist, session, Artist};

#[test]
fn only_the_last_set_is_sent() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            for name in ["Jacob", "Jay", "Jack"] {
                session.set(artist, "name", name)?;
            }
            Ok::<_, OdmError>(())
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[1].operation,
        WriteOperation::UpdateById {
            id: artist.entity.id().to_string(),
            operators: object(json!({"$set": {"name": "Jack"}})),
        }
    );
}

#[test]
fn increments_are_summed() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.inc(artist, "likes", 3)?;
            session.inc(artist, "likes", -1)?;
            session.inc(artist, "likes", 10)?;
            Ok::<_, OdmError>(())
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(
        writes[1].operation,
        WriteOperation::UpdateById {
            id: artist.entity.id().to_string(),
            operators: object(json!({"$inc": {"likes": 12}})),
        }
    );
    assert_eq!(artist.get("likes"), Some(&json!(12)));
}

#[test]
fn one_command_carries_every_operator_group() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.inc(artist, "likes", 1)?;
            session.push(artist, "albums", "Blue")?;
            session.push(artist, "albums", "Red")?;
            session.add_to_set(artist, "genres", "jazz")?;
            session.set(artist, "label.name", "Verve")?;
            Ok::<_, OdmError>(())
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[1].operation,
        WriteOperation::UpdateById {
            id: artist.entity.id().to_string(),
            operators: object(json!({
                "$inc": {"likes": 1},
                "$push": {"albums": {"$each": ["Blue", "Red"]}},
                "$addToSet": {"genres": "jazz"},
                "$set": {"label.name": "Verve"},
            })),
        }
    );

    let target = session.resolve_target(&artist);
    let stored = session.store().document(&target, artist.entity.id()).unwrap();
    assert_eq!(stored["albums"], json!(["Blue", "Red"]));
    assert_eq!(stored["label"], json!({"name": "Verve"}));
}

#[test]
fn empty_context_performs_no_write() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session.open(&mut artist, AtomicOptions::new()).unwrap();
    session.close(&mut artist, Outcome::Success).unwrap();

    assert_eq!(session.store().write_count(), 1);
}

#[test]
fn round_trip_sets_persisted() {
    let mut session = session();
    let mut artist = Artist::default();
    assert!(!artist.entity.is_persisted());

    session.open(&mut artist, AtomicOptions::new()).unwrap();
    session.set(&mut artist, "x", 1).unwrap();
    assert_eq!(session.store().write_count(), 0);
    session.close(&mut artist, Outcome::Success).unwrap();

    let writes = session.store().writes();
    assert_eq!(writes.len(), 1);
    match &writes[0].operation {
        WriteOperation::Upsert { operators, .. } => {
            assert_eq!(operators["$set"], json!({"x": 1}));
        }
        other => panic!("expected an upsert, got {:?}", other),
    }
    assert!(artist.entity.is_persisted());
    assert!(!artist.entity.changed());
}

#[test]
fn conflicting_operators_on_one_field_become_a_set() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");
    session.set(&mut artist, "tags", json!(["a", "b", "c"])).unwrap();

    session
        .atomically(&mut artist, AtomicOptions::new(), |session, artist| {
            session.push(artist, "tags", "d")?;
            session.pull(artist, "tags", "a")?;
            Ok::<_, OdmError>(())
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(
        writes.last().map(|w| w.operation.clone()),
        Some(WriteOperation::UpdateById {
            id: artist.entity.id().to_string(),
            operators: object(json!({"$set": {"tags": ["b", "c", "d"]}})),
        })
    );
    let target = session.resolve_target(&artist);
    assert_eq!(
        session.store().document(&target, artist.entity.id()).unwrap()["tags"],
        json!(["b", "c", "d"])
    );
}
