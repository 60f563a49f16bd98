pub mod assistant_service;
pub mod auth;
pub mod billing_service;
pub mod campaign_engine;
pub mod campaign_service;
pub mod contact_import;
pub mod plan_limit_service;
pub mod plan_service;
pub mod support_service;
