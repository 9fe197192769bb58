pub mod addr;
pub mod api;
pub mod config;
pub mod connector;
pub mod op;
pub mod op_impl;
pub mod policy;
pub mod reconcile;
pub mod resource;
pub mod tags;
pub mod validate;

#[cfg(test)]
mod testing;
