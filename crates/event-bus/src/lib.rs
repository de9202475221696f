//! A small typed event bus used to wire the hub's components together without
//! giving every task a direct reference to every other task.
mod event_bus;

pub use crate::event_bus::{BusEvent, Error, EventBus};
use std::any::TypeId;

mod macros;
mod receiver;

pub use crate::receiver::Receiver;

pub use event_bus_macros::Event;

/// Wraps retrieving [`std::any::TypeId`] for type T.
///
/// Use [`typeid`] macros for vec
pub fn tid<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}
