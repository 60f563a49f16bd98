pub mod assistants;
pub mod auth;
pub mod billing;
pub mod campaigns;
pub mod contacts;
pub mod plans;
pub mod support;
pub mod webhooks;
