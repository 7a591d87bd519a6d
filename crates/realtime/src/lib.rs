//! Realtime client for FridgeFriend
//!
//! Subscribes to row changes (`postgres_changes`) over the hosted realtime
//! websocket so inventory views can refetch when another household member
//! edits an item.

mod channel;
mod client;
mod error;
mod filters;
mod message;

pub use channel::{ChannelBuilder, DatabaseChanges, Subscription};
pub use client::{ConnectionState, RealtimeClient, RealtimeClientOptions};
pub use error::RealtimeError;
pub use filters::{DatabaseFilter, FilterOperator};
pub use message::{ChannelEvent, PostgresChangeEvent, PostgresChangePayload, RealtimeMessage};
