use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{Coll, Id};

/// A counter object used to implement auto-increment fields.
///
/// Each election owns one counter, keyed by the election ID, which hands out
/// roster positions to its candidates in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: Id,
    pub next: u64,
}

impl Counter {
    /// Create a new `Counter` starting at the given value, optionally specifying the ID to use.
    pub fn new(id: impl Into<Option<Id>>, start: u64) -> Self {
        let id = id.into().unwrap_or_else(Id::new);
        Self { id, next: start }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: Id) -> Result<u64> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(id.as_doc(), update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Roster counter {id} is missing")))?;
        Ok(counter.next)
    }
}

#[cfg(test)]
mod tests {
    use backend_test::backend_test;
    use mongodb::Database;

    use super::*;

    #[backend_test]
    async fn counter_increment(db: Database) {
        const START: u64 = 5;

        let id = Id::new();
        let counters = Coll::<Counter>::from_db(&db);
        counters.insert_one(Counter::new(id, START), None).await.unwrap();

        assert_eq!(Counter::next(&counters, id).await.unwrap(), START);
        assert_eq!(Counter::next(&counters, id).await.unwrap(), START + 1);

        let counter = counters.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(counter.next, START + 2);
    }

    #[backend_test]
    async fn missing_counters_are_internal_errors(db: Database) {
        let counters = Coll::<Counter>::from_db(&db);
        let err = Counter::next(&counters, Id::new()).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(err.status(), rocket::http::Status::InternalServerError);
    }
}
