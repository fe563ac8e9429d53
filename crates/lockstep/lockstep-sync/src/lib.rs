mod clock;
mod rendezvous;

pub use clock::StepClock;
pub use rendezvous::{Aborted, Crossing, Rendezvous};
