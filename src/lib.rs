#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing, ServicesFairing, VerifierFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod verifier;

/// Assemble the server. Configuration, the store and the verifier are set up
/// when the returned rocket is ignited.
pub fn build() -> Rocket<Build> {
    attach(rocket::build())
}

fn attach(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(VerifierFairing)
        .attach(ServicesFairing)
        .mount("/", api::routes())
}

/// A server backed by the given in-memory store and stub verifier, so tests
/// can seed and inspect both.
#[cfg(test)]
pub(crate) fn test_rocket(
    store: store::MemoryStore,
    verifier: verifier::StubVerifier,
) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("jwt_secret", "test-only-jwt-secret"))
        .merge(("store", "memory"))
        .merge(("verifier_timeout_ms", 200))
        .merge(("verifier_url", "http://127.0.0.1:9"));
    let store: store::SharedStore = std::sync::Arc::new(store);
    let verifier: verifier::SharedVerifier = std::sync::Arc::new(verifier);
    attach(rocket::custom(figment).manage(store).manage(verifier))
}
