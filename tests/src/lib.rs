//! Cross-crate scenarios run against in-memory collaborators, plus a few
//! that use real sockets on the loopback interface.
#![cfg(test)]

mod connection;
mod discovery;
mod net;
mod service;
mod support;
