mod clock;
mod interval;

pub use clock::{Clock, ManualClock, SystemClock};
pub use interval::{Deadline, Interval};
