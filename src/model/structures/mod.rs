pub mod category;
pub mod participant;
pub mod team;
