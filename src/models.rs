pub mod assistant;
pub mod auth;
pub mod billing;
pub mod campaign;
pub mod contact;
pub mod plan;
pub mod support;
