#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use zw101::config::Timings;
use zw101::entities::LastValue;
use zw101::mock::{MockClock, MockRx, MockTx, MockUart};
use zw101::{Zw101, Zw101Component, DEFAULT_ADDRESS};

pub type Shared<T> = Rc<RefCell<LastValue<T>>>;
pub type TestComponent = Zw101Component<MockTx, MockRx, MockClock>;

/// A component on a scripted UART with every entity registered.
pub struct Rig {
    pub uart: MockUart,
    pub clock: MockClock,
    pub component: TestComponent,
    pub lock: Shared<bool>,
    pub match_score: Shared<f32>,
    pub match_id: Shared<f32>,
    pub status: Shared<String>,
    pub enroll_switch: Shared<bool>,
    pub clear_switch: Shared<bool>,
}

pub fn shared<T: Default>() -> Shared<T> {
    Rc::new(RefCell::new(LastValue::default()))
}

impl Rig {
    pub fn new() -> Self {
        Self::with_timings(Timings::default())
    }

    pub fn with_timings(timings: Timings) -> Self {
        let uart = MockUart::new();
        // Every clock reading advances 1ms so unanswered commands time out.
        let clock = MockClock::ticking(1);
        let (tx, rx) = uart.split();
        let mut component = Zw101Component::with_timings(Zw101::new(tx, rx, clock.clone(), DEFAULT_ADDRESS), timings);

        let lock: Shared<bool> = shared();
        let match_score: Shared<f32> = shared();
        let match_id: Shared<f32> = shared();
        let status: Shared<String> = shared();
        let enroll_switch: Shared<bool> = shared();
        let clear_switch: Shared<bool> = shared();
        component.set_fingerprint_sensor(Box::new(lock.clone()));
        component.set_match_score_sensor(Box::new(match_score.clone()));
        component.set_match_id_sensor(Box::new(match_id.clone()));
        component.set_status_sensor(Box::new(status.clone()));
        component.set_enroll_switch(Box::new(enroll_switch.clone()));
        component.set_clear_switch(Box::new(clear_switch.clone()));

        Rig { uart, clock, component, lock, match_score, match_id, status, enroll_switch, clear_switch }
    }

    pub fn poll_at(&mut self, ms: u32) {
        self.clock.set(ms);
        self.component.poll();
    }

    pub fn status(&self) -> Option<String> {
        self.status.borrow().value.clone()
    }

    pub fn lock(&self) -> Option<bool> {
        self.lock.borrow().value
    }

    /// Written instruction codes, without the LED packets the loop sends on its own.
    pub fn codes(&self) -> Vec<u8> {
        self.uart.written_codes().into_iter().filter(|code| *code != 0x3C).collect()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.uart.written_payloads().into_iter().filter(|p| p[0] != 0x3C).collect()
    }
}

/// Data bytes of a ReadSysPara reply reporting `library_size` slots.
pub fn sys_para(library_size: u16) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x09];
    data.extend_from_slice(&library_size.to_be_bytes());
    data.extend_from_slice(&[0x00, 0x03, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x02, 0x00, 0x06]);
    data
}

pub fn search_data(page: u16, score: u16) -> Vec<u8> {
    let mut data = page.to_be_bytes().to_vec();
    data.extend_from_slice(&score.to_be_bytes());
    data
}
