use std::{cell::RefCell, env, thread, time::Duration};
use zw101::{Command, ConfirmationCode, Reply, Zw101, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{get_configured_serial_port, DEFAULT_BAUD_RATE, init_logging, print_ports, SerialReader, SerialWriter, StdClock};

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => run_test(args[1].as_str()),
        _ => panic!("Usage: pc_fingerprint_search [port_name]"),
    };
}

fn run_test(port_name: &str) {
    let port_cell = RefCell::new(get_configured_serial_port(port_name, DEFAULT_BAUD_RATE).unwrap());

    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let mut zw101 = Zw101::new(writer, reader, StdClock::new(), DEFAULT_ADDRESS);

    println!("1. Reading library size");
    let library_size = match zw101.send_command(Command::ReadSysPara) {
        Ok(Reply::ReadSysPara(result)) => result.system_parameters.finger_library_size,
        Err(e) => panic!("Error: {}", e),
        msg => panic!("Unexpected msg: {:#?}", msg),
    };

    println!("2. Acquiring image");
    loop {
        match zw101.send_command(Command::GetImage) {
            Ok(reply) => match reply.confirmation_code() {
                ConfirmationCode::Success => break,
                ConfirmationCode::FingerNotDetected => print!("."),
                ConfirmationCode::ImageNotCaptured => print!("!"),
                _ => {},
            },
            Err(e) => panic!("Error: {}", e),
        };
        thread::sleep(Duration::from_millis(200));
    }
    println!();

    println!("3. Process the image into a \"character buffer\"");
    match zw101.send_command(Command::GenChar { buffer: 1 }) {
        Ok(reply) => println!("Reply: {:#?}", reply.confirmation_code()),
        Err(e) => panic!("Error: {}", e),
    };

    println!("4. Searching the library");
    let cmd = Command::Search { buffer: 1, start_page: 0, page_num: library_size };
    match zw101.send_command(cmd) {
        Ok(Reply::Search(result)) => match result.matched_page(library_size) {
            Some(page) => println!("Match at page {} (score {})", page, result.match_score),
            None => println!("No match ({:#?})", result.confirmation_code),
        },
        Ok(reply) => println!("No match ({:#?})", reply.confirmation_code()),
        Err(e) => panic!("Error: {}", e),
    };
}
