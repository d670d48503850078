pub mod controller;
pub mod invoker;
pub mod queue;
pub mod transfer;
