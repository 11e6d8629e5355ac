use std::{cell::RefCell, env};
use zw101::{Command, Zw101, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{get_configured_serial_port, DEFAULT_BAUD_RATE, init_logging, print_ports, SerialReader, SerialWriter, StdClock};

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        3 => delete_id(args[1].as_str(), args[2].parse::<u16>().unwrap()),
        _ => panic!("Usage: pc_delete [port_name page]"),
    };
}

fn delete_id(port_name: &str, page: u16) {
    let port_cell = RefCell::new(get_configured_serial_port(port_name, DEFAULT_BAUD_RATE).unwrap());

    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let mut zw101 = Zw101::new(writer, reader, StdClock::new(), DEFAULT_ADDRESS);

    match zw101.send_command(Command::DeletChar { page, count: 1 }) {
        Ok(reply) => println!("Reply: {:#?}", reply),
        Err(e) => panic!("Error: {}", e),
    }
}
