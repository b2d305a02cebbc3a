use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;
use crate::sensors::{Channel, SensorKind, Subscription};

/// Three-axis acceleration including gravity (m/s²).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub timestamp_ms: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp_ms, x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Axis information is dropped here.
    pub fn to_sample(&self) -> MotionSample {
        MotionSample {
            timestamp_ms: self.timestamp_ms,
            acceleration_magnitude: self.magnitude(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionSample {
    pub timestamp_ms: u64,
    pub acceleration_magnitude: f64,
}

pub trait MotionDevice {
    fn subscribe(&mut self, handler: Box<dyn FnMut(&Acceleration)>) -> Result<Subscription, SensorError>;
}

/// In-process motion device: the host pushes platform samples through a
/// [`MotionFeed`] and every subscriber receives them.
pub struct ChannelMotionDevice {
    channel: Rc<RefCell<Channel<Acceleration>>>,
}

impl ChannelMotionDevice {
    pub fn new() -> (Self, MotionFeed) {
        let channel = Rc::new(RefCell::new(Channel::new()));
        (
            Self {
                channel: channel.clone(),
            },
            MotionFeed { channel },
        )
    }
}

impl MotionDevice for ChannelMotionDevice {
    fn subscribe(&mut self, mut handler: Box<dyn FnMut(&Acceleration)>) -> Result<Subscription, SensorError> {
        Ok(self.channel.borrow_mut().subscribe(move |a| handler(a)))
    }
}

#[derive(Clone)]
pub struct MotionFeed {
    channel: Rc<RefCell<Channel<Acceleration>>>,
}

impl MotionFeed {
    pub fn push(&self, acceleration: Acceleration) {
        self.channel.borrow_mut().emit(&acceleration);
    }

    pub fn subscriber_count(&self) -> usize {
        self.channel.borrow().subscriber_count()
    }
}

/// Device for hosts with no accelerometer at all.
#[derive(Debug, Clone, Default)]
pub struct UnavailableMotionDevice;

impl MotionDevice for UnavailableMotionDevice {
    fn subscribe(&mut self, _handler: Box<dyn FnMut(&Acceleration)>) -> Result<Subscription, SensorError> {
        Err(SensorError::unavailable(SensorKind::Motion, "no motion sensor on this host"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_is_euclidean_norm() {
        let a = Acceleration::new(7, 3.0, 4.0, 12.0);
        let sample = a.to_sample();
        assert_eq!(sample.acceleration_magnitude, 13.0);
        assert_eq!(sample.timestamp_ms, 7);
    }

    #[test]
    fn feed_delivers_to_subscribers() {
        let (mut device, feed) = ChannelMotionDevice::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let sub = device
            .subscribe(Box::new(move |a| s.borrow_mut().push(a.timestamp_ms)))
            .unwrap();

        feed.push(Acceleration::new(1, 0.0, 0.0, 9.8));
        sub.cancel();
        feed.push(Acceleration::new(2, 0.0, 0.0, 9.8));

        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
