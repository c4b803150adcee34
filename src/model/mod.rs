pub mod agreement;
pub mod balancer;
pub mod constants;
pub mod name_tracker;
pub mod rating_store;
pub mod requirements;
pub mod resolver;
pub mod structures;
