pub mod items;
pub mod payments;
pub mod statements;
