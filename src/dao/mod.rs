/// Domain records shared by every backend.
pub mod models;
/// Backend-agnostic storage errors.
pub mod storage;
/// Storage abstraction and its memory and MongoDB implementations.
pub mod tracker_store;
