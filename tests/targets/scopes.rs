use atomic_odm::{AtomicOptions, OdmError, ScopedTarget, TargetOverride};
use serde_json::json;

use crate::support::{saved_artist, session, Artist};

#[test]
fn writes_inside_a_scope_go_to_its_target() {
    let mut session = session();
    let mut artist = Artist::named("Jake");

    session
        .with_target::<Artist, _, OdmError, _>(TargetOverride::new().database("archive"), |session, _| {
            session.save(&mut artist)
        })
        .unwrap();
    session.inc(&mut artist, "likes", 1).unwrap();

    let writes = session.store().writes();
    assert_eq!(writes[0].target.database, "archive");
    assert_eq!(writes[1].target.database, "music");
}

#[test]
fn innermost_scope_wins_and_outer_scope_returns() {
    let mut session = session();

    session
        .with_target::<Artist, _, OdmError, _>(TargetOverride::new().database("outer"), |session, _| {
            session.with_target::<Artist, _, OdmError, _>(TargetOverride::new().collection("stars"), |session, _| {
                let target = session.resolve_model_target::<Artist>();
                assert_eq!(target.database, "music");
                assert_eq!(target.collection, "stars");
                Ok(())
            })?;
            assert_eq!(session.resolve_model_target::<Artist>().database, "outer");
            Ok(())
        })
        .unwrap();

    assert_eq!(session.resolve_model_target::<Artist>().database, "music");
    assert_eq!(session.store().live_clients(), 0);
}

#[test]
fn client_is_held_for_the_scope_and_released_after() {
    let mut session = session();

    session
        .with_target::<Artist, _, OdmError, _>(TargetOverride::new(), |session, scoped| {
            assert_eq!(session.store().live_clients(), 1);
            assert_eq!(scoped.client()?.name(), "default");
            Ok(())
        })
        .unwrap();

    assert_eq!(session.store().live_clients(), 0);
}

#[test]
fn scope_released_when_work_fails() {
    let mut session = session();
    let result = session.with_target::<Artist, (), OdmError, _>(TargetOverride::new(), |_, _| {
        Err(OdmError::Config("no".into()))
    });

    assert_eq!(result, Err(OdmError::Config("no".into())));
    assert_eq!(session.store().live_clients(), 0);
}

#[test]
fn using_an_exited_scope_is_a_violation() {
    let mut session = session();
    let mut leaked: Option<ScopedTarget> = None;

    session
        .with_target::<Artist, _, OdmError, _>(TargetOverride::new(), |_, scoped| {
            leaked = Some(scoped.clone());
            Ok(())
        })
        .unwrap();

    let leaked = leaked.unwrap();
    assert!(!leaked.is_live());
    assert!(matches!(leaked.target(), Err(OdmError::ScopeViolation(_))));
}

#[test]
fn entity_scope_applies_to_its_atomically_blocks() {
    let mut session = session();
    let mut artist = saved_artist(&mut session, "Jake");

    session
        .with_entity_target(&mut artist, TargetOverride::new().database("archive"), |session, artist, _| {
            session.atomically(artist, AtomicOptions::new(), |session, artist| {
                session.inc(artist, "likes", 1)?;
                session.set(artist, "name", "Jay")
            })
        })
        .unwrap();

    let writes = session.store().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].target.database, "archive");
    assert_eq!(artist.get("likes"), Some(&json!(1)));
}
