//! **zw101** is an embedded-hal driver for the ZW101 capacitive fingerprint module, plus the
//! glue that attaches it to home-automation style entities (a lock binary sensor, match score
//! and id sensors, enroll and clear switches, a status text sensor).
//!
//! The crate has three layers:
//!
//! * [`Zw101`] talks the module's packet protocol over any `embedded_hal::serial` pair.
//! * [`Zw101Component`] runs the background search loop and the enrollment procedure and
//!   publishes results to the registered entities.
//! * [`config`] and [`codegen`] validate a device configuration and produce the registration
//!   calls that wire entities onto the component.
//!
//! ## Example
//!
//! To check that the module is alive:
//! ```
//! use zw101::{Command, Zw101, DEFAULT_ADDRESS};
//! # use zw101::mock::{MockClock, MockUart};
//!
//! # let uart = MockUart::new();
//! # uart.ack_next(0x00, &[]);
//! # let (tx, rx) = uart.split();
//! # let clock = MockClock::ticking(1);
//! // Obtain tx, rx from some serial port implementation and a millisecond clock
//! let mut zw101 = Zw101::new(tx, rx, clock, DEFAULT_ADDRESS);
//! match zw101.send_command(Command::HandShake) {
//!     Ok(reply) => println!("Status: {:?}", reply.confirmation_code()),
//!     Err(error) => panic!("Error: {}", error),
//! }
//! ```
//!
//! For more examples, see the `demos` directory.
#![warn(missing_debug_implementations, rust_2018_idioms)]
#![no_std]

extern crate alloc;

pub mod codegen;
mod commands;
mod component;
pub mod config;
mod driver;
pub mod entities;
#[doc(hidden)]
pub mod mock;
mod responses;
mod utils;

pub use crate::commands::{Command, DEFAULT_REPLY_TIMEOUT_MS};
pub use crate::component::{AutoMode, EnrollState, SearchState, Zw101Component, LED_OFF};
pub use crate::driver::{checksum, encode_packet, Packet, Zw101, DEFAULT_ADDRESS, HEADER, PID_ACK, PID_COMMAND};
pub use crate::entities::{BinarySensor, Sensor, Switch, SwitchKind, TextSensor};
pub use crate::responses::{
    AckResult, ConfirmationCode, IndexTable, IndexTableResult, MatchResult, ReadSysParaResult, Reply,
    SearchResult, SystemParameters, TemplateNumResult,
};
pub use crate::utils::{Clock, Error};
