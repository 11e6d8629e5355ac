use std::{cell::RefCell, env, rc::Rc, thread, time::Duration};
use zw101::entities::LastValue;
use zw101::{EnrollState, SwitchKind, Zw101, Zw101Component, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{get_configured_serial_port, DEFAULT_BAUD_RATE, init_logging, print_ports, SerialReader, SerialWriter, StdClock};

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => run_test(args[1].as_str()),
        _ => panic!("Usage: pc_enrollment [port_name]"),
    };
}

fn run_test(port_name: &str) {
    let port_cell = RefCell::new(get_configured_serial_port(port_name, DEFAULT_BAUD_RATE).unwrap());

    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let mut component = Zw101Component::new(Zw101::new(writer, reader, StdClock::new(), DEFAULT_ADDRESS));

    let status: Rc<RefCell<LastValue<String>>> = Rc::new(RefCell::new(LastValue::default()));
    component.set_status_sensor(Box::new(status.clone()));
    component.setup();

    println!("Next free id: {}", component.next_fingerprint_id());
    component.write_switch(SwitchKind::Enroll, true);

    let mut last_status = None;
    while component.enroll_state() != EnrollState::Idle {
        component.poll();
        let current = status.borrow().value.clone();
        if current != last_status {
            println!("Status: {}", current.as_deref().unwrap_or(""));
            last_status = current;
        }
        thread::sleep(Duration::from_millis(10));
    }

    println!("Enrollment finished, next free id: {}", component.next_fingerprint_id());
}
