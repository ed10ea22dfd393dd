use atomic_odm::{Config, Document, InMemoryStore, ReadPreference, Session, Target, TargetOverride};

use crate::support::{session, Artist, Band};

#[test]
fn derive_declares_model_defaults() {
    assert_eq!(Artist::COLLECTION, "artists");
    assert_eq!(Artist::storage_options(), TargetOverride::new().database("music"));
    assert_eq!(Band::COLLECTION, "bands");
    assert_eq!(
        Band::storage_options(),
        TargetOverride::new().database("music").client("default")
    );
}

#[test]
fn layers_resolve_field_by_field() {
    let mut session = session();
    session.override_database("temp");

    let target = session
        .with_target::<Artist, _, atomic_odm::OdmError, _>(
            TargetOverride::new().collection("artists"),
            |session, scoped| {
                assert_eq!(scoped.target()?.database, "temp");
                Ok(session.resolve_model_target::<Artist>())
            },
        )
        .unwrap();

    assert_eq!(target, Target::new("default", "temp", "artists"));
}

#[test]
fn model_default_then_configured_default() {
    let config = Config::new()
        .default_client("primary")
        .default_database("catalog")
        .read_preference(ReadPreference::SecondaryPreferred);
    let session = Session::with_config(InMemoryStore::new().with_client("primary"), config);

    let artist = session.resolve_model_target::<Artist>();
    assert_eq!(artist.to_string(), "primary/music.artists");
    assert_eq!(artist.read_preference, ReadPreference::SecondaryPreferred);

    let band = session.resolve_model_target::<Band>();
    assert_eq!(band.to_string(), "default/music.bands");
}

#[test]
fn session_override_is_per_session() {
    let store = InMemoryStore::new();
    let mut first = Session::new(store.clone());
    let second = Session::new(store);

    first.set_override(TargetOverride::new().database("temp"));
    assert_eq!(first.resolve_model_target::<Artist>().database, "temp");
    assert_eq!(second.resolve_model_target::<Artist>().database, "music");
}
