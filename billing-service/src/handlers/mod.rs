pub mod health;
pub mod items;
pub mod payments;
pub mod statements;
