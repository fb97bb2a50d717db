pub mod adapter;
pub mod error;
pub mod factory;
pub mod filters;
pub mod http_transport;
pub mod legacy;
pub mod record;
pub mod rest;
pub mod tree;
pub mod xmlrpc_transport;
