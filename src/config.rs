use std::sync::Arc;
use std::time::Duration as StdDuration;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;
use crate::service::Services;
use crate::store::{MemoryStore, MongoStore, SharedStore};
use crate::verifier::{HttpVerifier, SharedVerifier};

/// Which persistence backend to run against.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongodb,
    Memory,
}

/// What to do when a photo is attached to a candidate that already has one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoPolicy {
    /// Reject the second photo.
    #[default]
    Once,
    /// Replace the existing photo.
    Overwrite,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    #[serde(default = "default_verifier_timeout_ms")]
    verifier_timeout_ms: u64,
    #[serde(default = "default_match_threshold")]
    match_threshold: f64,
    #[serde(default)]
    photo_policy: PhotoPolicy,
    #[serde(default = "default_max_image_bytes")]
    max_image_bytes: usize,
    // secrets
    jwt_secret: String,
}

fn default_verifier_timeout_ms() -> u64 {
    5000
}

fn default_match_threshold() -> f64 {
    0.4
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

impl Config {
    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// Upper bound on a single identity verification call.
    pub fn verifier_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.verifier_timeout_ms)
    }

    /// Embedding distances strictly below this are a match.
    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }

    pub fn photo_policy(&self) -> PhotoPolicy {
        self.photo_policy
    }

    /// Largest accepted image upload, after base64 decoding.
    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.match_threshold.is_finite() && self.match_threshold > 0.0) {
            return Err(format!(
                "`match_threshold` must be a positive number, got {}",
                self.match_threshold
            ));
        }
        if self.verifier_timeout_ms == 0 {
            return Err("`verifier_timeout_ms` must be positive".to_string());
        }
        Ok(())
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = config.validate() {
            error!("Invalid application config: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that sets up the configured store and places it into managed
/// state as a [`SharedStore`]. For MongoDB this connects to the database and
/// ensures the required indexes exist.
///
/// Must be attached after [`ConfigFairing`]. A store already in managed state
/// is left alone.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        if rocket.state::<SharedStore>().is_some() {
            return Ok(rocket);
        }
        let kind = match rocket.state::<Config>() {
            Some(config) => config.store(),
            None => {
                error!("Application config was not loaded before the store");
                return Err(rocket);
            }
        };

        let store: SharedStore = match kind {
            StoreKind::Memory => {
                warn!("Using the in-memory store; nothing will be persisted");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Mongodb => {
                // Load the config.
                let config = match rocket.figment().extract::<DbConfig>() {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to load database config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                info!("Loaded database config, connecting...");
                // Construct the connection.
                let client = match MongoClient::with_uri_str(config.db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name());

                // Ensure the required indexes exist.
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
                info!("...database connection online!");

                Arc::new(MongoStore::new(client, &db))
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "verivote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Connect to the configured database under a fresh name, with indexes in place.
#[cfg(test)]
pub(crate) async fn test_database() -> (MongoClient, mongodb::Database) {
    let config: DbConfig = rocket::Config::figment()
        .extract()
        .expect("`db_uri` must be configured for database tests");
    let client = MongoClient::with_uri_str(config.db_uri)
        .await
        .expect("Failed to connect to test database");
    let db = client.database(&get_database_name());
    ensure_indexes_exist(&db)
        .await
        .expect("Failed to create test indexes");
    (client, db)
}

/// Configuration for the face verification service.
#[derive(Deserialize)]
struct VerifierConfig {
    // non-secrets
    verifier_url: String,
}

/// A fairing that loads the verifier config and places an HTTP
/// [`SharedVerifier`] into managed state.
///
/// Must be attached after [`ConfigFairing`]. A verifier already in managed
/// state is left alone.
pub struct VerifierFairing;

#[rocket::async_trait]
impl Fairing for VerifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity verifier",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        if rocket.state::<SharedVerifier>().is_some() {
            return Ok(rocket);
        }
        let timeout = match rocket.state::<Config>() {
            Some(config) => config.verifier_timeout(),
            None => {
                error!("Application config was not loaded before the verifier");
                return Err(rocket);
            }
        };
        // Load the config.
        let config = match rocket.figment().extract::<VerifierConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load verifier config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the client.
        let verifier = match HttpVerifier::new(&config.verifier_url, timeout) {
            Ok(verifier) => verifier,
            Err(e) => {
                error!("Failed to build verifier client: {e}");
                return Err(rocket);
            }
        };
        info!("Identity verification via {}", verifier.endpoint());

        // Manage the state.
        let verifier: SharedVerifier = Arc::new(verifier);
        rocket = rocket.manage(verifier);
        Ok(rocket)
    }
}

/// A fairing that wires the election components together over the managed
/// store and verifier, and places each one into managed state.
///
/// Must be attached after every other fairing in this module.
pub struct ServicesFairing;

#[rocket::async_trait]
impl Fairing for ServicesFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election services",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let services = match (
            rocket.state::<Config>(),
            rocket.state::<SharedStore>(),
            rocket.state::<SharedVerifier>(),
        ) {
            (Some(config), Some(store), Some(verifier)) => {
                info!(
                    "Election services ready (match threshold {}, verifier timeout {}ms)",
                    config.match_threshold(),
                    config.verifier_timeout_ms
                );
                Services::new(store.clone(), verifier.clone(), config)
            }
            _ => {
                error!("Election services need the config, store and verifier to be set up first");
                return Err(rocket);
            }
        };

        rocket = rocket
            .manage(services.elections)
            .manage(services.registry)
            .manage(services.ledger)
            .manage(services.gate)
            .manage(services.results)
            .manage(services.voters);
        Ok(rocket)
    }
}
