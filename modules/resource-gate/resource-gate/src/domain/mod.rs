pub mod catalog;
pub mod fields;
pub mod guard;
pub mod markdown;
pub mod ownership;
pub mod permissions;
pub mod public_cache;
pub mod query;
pub mod service;
pub mod validation;
