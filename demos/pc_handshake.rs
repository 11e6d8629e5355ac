use std::{cell::RefCell, env};
use zw101::{Command, Reply, Zw101, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{get_configured_serial_port, DEFAULT_BAUD_RATE, init_logging, print_ports, SerialReader, SerialWriter, StdClock};

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => run_test(args[1].as_str()),
        _ => panic!("Usage: pc_handshake [port_name]"),
    };
}

fn run_test(port_name: &str) {
    let port_cell = RefCell::new(get_configured_serial_port(port_name, DEFAULT_BAUD_RATE).unwrap());

    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let mut zw101 = Zw101::new(writer, reader, StdClock::new(), DEFAULT_ADDRESS);

    println!("1. Handshake");
    match zw101.send_command(Command::HandShake) {
        Ok(reply) => println!("Reply: {:#?}", reply.confirmation_code()),
        Err(e) => panic!("Error: {}", e),
    };

    println!("2. Reading system parameters");
    match zw101.send_command(Command::ReadSysPara) {
        Ok(Reply::ReadSysPara(result)) => {
            let params = result.system_parameters;
            println!("Parameters: {:#?}", params);
            println!("Library size: {}, baud rate: {}", params.finger_library_size, params.baud_rate());
        },
        Err(e) => panic!("Error: {}", e),
        msg => panic!("Unexpected msg: {:#?}", msg),
    };

    println!("3. Counting templates");
    match zw101.send_command(Command::ValidTempleteNum) {
        Ok(Reply::ValidTempleteNum(result)) => println!(
            "[{:#?}] Stored templates: {}",
            result.confirmation_code, result.template_num,
        ),
        Err(e) => panic!("Error: {}", e),
        msg => panic!("Unexpected msg: {:#?}", msg),
    };
}
