//! A host-side socket layer for network co-processors.
//!
//! The TCP/IP stack of the targeted systems runs on a separate network
//! processor which the host reaches through an asynchronous command link.
//! This crate keeps the host's view of every socket consistent with the
//! co-processor's and exposes the familiar `socket`/`bind`/`connect`/
//! `listen`/`accept`/`send`/`recv`/`select`/`close` operation set on top of
//! it. The link itself and the execution environment stay outside: the
//! caller implements [`link::Link`] over whatever bus and signaling
//! primitives the platform offers and hands it into every operation.
//!
//! All state lives in storage the caller provides up front; the crate never
//! allocates on its own and works without `std`.
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod bridge;
pub mod link;
pub mod managed;
pub mod wire;
