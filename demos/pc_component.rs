use std::{cell::RefCell, env, fs, thread, time::Duration};
use zw101::codegen::{wire, EntityFactory};
use zw101::config::{DeviceConfig, ResolvedEntity};
use zw101::{BinarySensor, Sensor, Switch, TextSensor, Zw101, Zw101Component, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{get_configured_serial_port, init_logging, print_ports, SerialReader, SerialWriter, StdClock};

/// Prints every published state, prefixed with the entity id.
struct Printer(String);

impl BinarySensor for Printer {
    fn publish_state(&mut self, state: bool) {
        println!("[{}] {}", self.0, if state { "ON" } else { "OFF" });
    }
}

impl Sensor for Printer {
    fn publish_state(&mut self, value: f32) {
        println!("[{}] {}", self.0, value);
    }
}

impl Switch for Printer {
    fn publish_state(&mut self, state: bool) {
        println!("[{}] switch {}", self.0, state);
    }
}

impl TextSensor for Printer {
    fn publish_state(&mut self, state: &str) {
        println!("[{}] {}", self.0, state);
    }
}

struct PrinterFactory;

impl EntityFactory for PrinterFactory {
    fn binary_sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn BinarySensor> {
        Box::new(Printer(entity.id.clone()))
    }

    fn sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn Sensor> {
        Box::new(Printer(entity.id.clone()))
    }

    fn switch(&mut self, entity: &ResolvedEntity) -> Box<dyn Switch> {
        Box::new(Printer(entity.id.clone()))
    }

    fn text_sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn TextSensor> {
        Box::new(Printer(entity.id.clone()))
    }
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        3 => run(args[1].as_str(), args[2].as_str()),
        _ => panic!("Usage: pc_component [port_name config.json]"),
    };
}

fn run(port_name: &str, config_path: &str) {
    let text = fs::read_to_string(config_path).unwrap();
    let config: DeviceConfig = serde_json::from_str(&text).unwrap();
    let config = match config.validate() {
        Ok(config) => config,
        Err(e) => panic!("Invalid configuration: {}", e),
    };

    let port_cell = RefCell::new(get_configured_serial_port(port_name, config.root.baud_rate).unwrap());
    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let device = Zw101::new(writer, reader, StdClock::new(), DEFAULT_ADDRESS);
    let mut component = Zw101Component::with_timings(device, config.root.timings);

    let registered = wire(&config, &mut component, &mut PrinterFactory);
    println!("Registered {} entities", registered);

    component.setup();
    loop {
        component.poll();
        thread::sleep(Duration::from_millis(10));
    }
}
