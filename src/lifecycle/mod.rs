//! Lifecycle synchronization with the inventory
//!
//! Inventory change events arrive on the `inventory-to-storage` queue. The
//! listener decodes each one and provisions or tears down the matching
//! trading system directory.

pub mod broker;
pub mod synchronizer;
pub mod types;

pub use broker::{BrokerHandle, ChannelBroker, Delivery, MessageSource, INVENTORY_TO_STORAGE};
pub use synchronizer::{spawn_listener, LifecycleSynchronizer};
pub use types::{Envelope, LifecycleEvent, Message, TradingSystemMessage};
