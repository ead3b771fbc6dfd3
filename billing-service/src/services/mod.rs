pub mod amounts;
pub mod database;
pub mod metrics;
pub mod payments;
pub mod statement;

pub use database::Database;
