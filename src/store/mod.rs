pub mod media_storage;
pub mod persistent_store;
pub mod record_store;
