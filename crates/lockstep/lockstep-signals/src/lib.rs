pub mod record;
pub mod signal;
pub mod store;

pub use record::OutputRecord;
pub use signal::Signal;
pub use store::{SignalStore, slot_index};
