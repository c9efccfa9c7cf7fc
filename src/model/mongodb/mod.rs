mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::{optional_bson_datetime, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::Counter;
pub use errors::is_duplicate_key_error;
