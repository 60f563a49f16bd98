pub mod cache;
pub mod db_utils;
pub mod error;
pub mod i18n;
pub mod retry;
pub mod signature;
