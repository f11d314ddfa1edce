//! Task lifecycle and notification fan-out.
//!
//! - [`TaskNotificationFanout`] create/update/delete tasks, manage subscriptions, drain the log
//! - [`fan_out`] pure recipient computation for one mutation
//! - [`TaskRecord`], [`TaskCreate`], [`TaskUpdate`], [`Subscription`], [`TaskNotification`]

mod fanout;
mod model;
mod service;

pub use fanout::{TaskMutation, fan_out};
pub use model::{
    DEFAULT_STATUS, Subscription, TaskCreate, TaskNotification, TaskRecord, TaskUpdate,
};
pub use service::TaskNotificationFanout;
