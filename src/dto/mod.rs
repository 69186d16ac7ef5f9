pub mod admin;
pub mod health;
pub mod public;
pub mod snapshot;
pub mod track;
pub mod validation;
