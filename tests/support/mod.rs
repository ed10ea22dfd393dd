//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use atomic_odm::{Document, Entity, InMemoryStore, Session};
use serde_json::{Map, Value};

#[derive(Debug, Default, Document)]
#[document(collection = "artists", database = "music")]
pub struct Artist {
    pub entity: Entity,
}

impl Artist {
    pub fn named(name: &str) -> Self {
        let mut artist = Artist::default();
        artist.entity.assign("name", name).expect("assign name");
        artist
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entity.get(path)
    }
}

/// Collection name comes from the struct name; entity lives in a marked field.
#[derive(Debug, Default, Document)]
#[document(database = "music", client = "default")]
pub struct Band {
    #[document(entity)]
    pub record: Entity,
}

/// An artist that has already been inserted.
pub fn saved_artist<S: atomic_odm::DocumentStore>(session: &mut Session<S>, name: &str) -> Artist {
    let mut artist = Artist::named(name);
    session.save(&mut artist).expect("save artist");
    artist
}

pub fn session() -> Session<InMemoryStore> {
    init_tracing();
    Session::new(InMemoryStore::new())
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("json object")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
