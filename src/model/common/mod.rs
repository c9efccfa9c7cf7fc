pub mod election;
pub mod photo;
