//! Outputs the component publishes to. The host firmware implements these for its own sensor
//! and switch types; the component owns them once registered.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

/// Boolean presentation of match state (a "lock" that opens on a recognised finger).
pub trait BinarySensor {
    fn publish_state(&mut self, state: bool);
}

/// Numeric telemetry channel.
pub trait Sensor {
    fn publish_state(&mut self, value: f32);
}

/// Free-text status channel.
pub trait TextSensor {
    fn publish_state(&mut self, state: &str);
}

/// Actuator entity. Writes arrive through
/// [`Zw101Component::write_switch`](crate::Zw101Component::write_switch); the component only
/// publishes the resulting state back.
pub trait Switch {
    fn publish_state(&mut self, state: bool);
}

/// The two switches the component knows how to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    /// Starts a fingerprint enrollment.
    Enroll,
    /// Wipes the fingerprint library.
    Clear,
}

/// Keeps the last published value. Useful as a stand-in entity and in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastValue<T> {
    pub value: Option<T>,
    pub publish_count: usize,
}

impl<T> LastValue<T> {
    fn record(&mut self, value: T) {
        self.value = Some(value);
        self.publish_count += 1;
    }
}

impl BinarySensor for LastValue<bool> {
    fn publish_state(&mut self, state: bool) {
        self.record(state);
    }
}

impl Switch for LastValue<bool> {
    fn publish_state(&mut self, state: bool) {
        self.record(state);
    }
}

impl Sensor for LastValue<f32> {
    fn publish_state(&mut self, value: f32) {
        self.record(value);
    }
}

impl TextSensor for LastValue<String> {
    fn publish_state(&mut self, state: &str) {
        self.record(String::from(state));
    }
}

// Shared handles, so the host can keep reading an entity after handing it to the component.

impl<S: BinarySensor + ?Sized> BinarySensor for Rc<RefCell<S>> {
    fn publish_state(&mut self, state: bool) {
        self.borrow_mut().publish_state(state);
    }
}

impl<S: Sensor + ?Sized> Sensor for Rc<RefCell<S>> {
    fn publish_state(&mut self, value: f32) {
        self.borrow_mut().publish_state(value);
    }
}

impl<S: TextSensor + ?Sized> TextSensor for Rc<RefCell<S>> {
    fn publish_state(&mut self, state: &str) {
        self.borrow_mut().publish_state(state);
    }
}

impl<S: Switch + ?Sized> Switch for Rc<RefCell<S>> {
    fn publish_state(&mut self, state: bool) {
        self.borrow_mut().publish_state(state);
    }
}
