//! Pending values captured while a statement is built.
//!
//! Injectors hand out tags for the SQL text and record one [`BindingEntry`] per tag in
//! the session's [`BindingBag`]. The bag is shared between a session and every
//! injector it created, so values registered through any of them land in the same
//! statement.

mod bag;
mod cell;
mod injector;

pub use bag::{BindingBag, BindingEntry, Role, Source};
pub use cell::{LiveParam, ValueCell};
pub use injector::{BindOpts, Inject, InInjector, InOutInjector, OutInjector, Param};

pub(crate) use bag::{SharedBag, lock_bag};
pub(crate) use injector::InjectorCore;
