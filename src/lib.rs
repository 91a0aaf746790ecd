pub mod commissions;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod report;
pub mod storage;
pub mod tracker;
