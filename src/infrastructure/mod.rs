pub mod config;
pub mod error;
pub mod key_value_store;
pub mod notification_gateway;
pub mod record_codec;
pub mod storage;
