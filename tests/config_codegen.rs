mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{shared, Rig, Shared};
use rstest::rstest;
use serde_json::json;
use zw101::codegen::{generate, wire, EntityFactory, Statement};
use zw101::config::{ConfigError, DeviceConfig, EntityRole, ResolvedEntity};
use zw101::{BinarySensor, Sensor, Switch, SwitchKind, TextSensor};

fn parse(value: serde_json::Value) -> DeviceConfig {
    serde_json::from_value(value).unwrap()
}

fn full_config() -> serde_json::Value {
    json!({
        "uart": [{ "id": "uart_bus", "tx_pin": "GPIO17", "rx_pin": "GPIO16" }],
        "zw101": { "id": "fp", "uart_id": "uart_bus" },
        "binary_sensor": [{ "platform": "zw101", "zw101_id": "fp", "name": "Fingerprint" }],
        "sensor": [{
            "platform": "zw101",
            "match_score": { "name": "Match Score" },
            "match_id": { "id": "finger_id", "name": "Match ID" }
        }],
        "switch": [{ "platform": "zw101", "enroll": { "name": "Enroll" }, "clear": { "name": "Clear" } }],
        "text_sensor": [{ "platform": "zw101", "status": { "name": "Status" } }]
    })
}

#[test]
fn test_root_only_config_generates_component() {
    let config = parse(json!({
        "uart": [{ "id": "uart_bus" }],
        "zw101": {}
    }))
    .validate()
    .unwrap();

    let program = generate(&config);
    assert_eq!(
        program.statements,
        vec![
            Statement::NewComponent { id: "zw101component_id".into() },
            Statement::RegisterComponent { id: "zw101component_id".into() },
            Statement::RegisterUartDevice { id: "zw101component_id".into(), uart_id: "uart_bus".into() },
        ]
    );
    assert_eq!(program.registrations().count(), 0);
    assert_eq!(config.root.baud_rate, 57600);
}

#[test]
fn test_empty_platforms_register_nothing() {
    let config = parse(json!({
        "uart": [{ "id": "uart_bus" }],
        "zw101": { "id": "fp" },
        "sensor": [{ "platform": "zw101" }],
        "switch": [{ "platform": "zw101" }],
        "text_sensor": [{ "platform": "zw101" }]
    }))
    .validate()
    .unwrap();

    assert!(config.entities.is_empty());
    assert_eq!(generate(&config).statements.len(), 3);
}

#[test]
fn test_each_entity_registers_once() {
    let config = parse(full_config()).validate().unwrap();
    let program = generate(&config);

    let registrations: Vec<_> = program.registrations().collect();
    assert_eq!(
        registrations,
        vec![
            ("fp", EntityRole::FingerprintSensor, "fp_fingerprint"),
            ("fp", EntityRole::MatchScore, "fp_match_score"),
            ("fp", EntityRole::MatchId, "finger_id"),
            ("fp", EntityRole::EnrollSwitch, "fp_enroll"),
            ("fp", EntityRole::ClearSwitch, "fp_clear"),
            ("fp", EntityRole::Status, "fp_status"),
        ]
    );

    let set_parent = program.statements.iter().filter(|s| matches!(s, Statement::SetParent { .. })).count();
    assert_eq!(set_parent, 2);

    let text = program.to_string();
    assert!(text.starts_with("auto *fp = new zw101::ZW101Component();\n"));
    assert!(text.contains("fp_enroll->set_parent(fp);\nfp->set_enroll_switch(fp_enroll);\n"));
    assert!(text.contains("fp->set_match_id_sensor(finger_id);\n"));
}

#[test]
fn test_entity_defaults() {
    let config = parse(full_config()).validate().unwrap();

    let lock = config.entity("fp_fingerprint").unwrap();
    assert_eq!(lock.device_class.as_deref(), Some("lock"));

    let score = config.entity("fp_match_score").unwrap();
    assert_eq!(score.icon, "mdi:percent");
    assert_eq!(score.accuracy_decimals, Some(0));
    assert_eq!(score.state_class.as_deref(), Some("measurement"));

    assert_eq!(config.entity("finger_id").unwrap().icon, "mdi:fingerprint");
    assert_eq!(config.entity("fp_enroll").unwrap().icon, "mdi:fingerprint-add");
    assert_eq!(config.entity("fp_clear").unwrap().icon, "mdi:delete-forever");
    assert_eq!(config.entity("fp_status").unwrap().icon, "mdi:information-outline");
}

#[test]
fn test_generation_is_idempotent() {
    let config = parse(full_config());
    let first = generate(&config.validate().unwrap());
    let second = generate(&config.validate().unwrap());
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
}

#[rstest]
#[case::unknown_parent(
    json!({ "uart": [{ "id": "u" }], "zw101": { "id": "fp" }, "switch": [{ "platform": "zw101", "zw101_id": "other" }] }),
    ConfigError::UnknownParent { domain: "switch", id: "other".into() }
)]
#[case::missing_component(
    json!({ "uart": [{ "id": "u" }], "text_sensor": [{ "platform": "zw101" }] }),
    ConfigError::MissingComponent
)]
#[case::wrong_platform(
    json!({ "uart": [{ "id": "u" }], "zw101": {}, "binary_sensor": [{ "platform": "gpio" }] }),
    ConfigError::WrongPlatform { domain: "binary_sensor", platform: "gpio".into() }
)]
#[case::missing_uart(json!({ "zw101": {} }), ConfigError::NoUart)]
#[case::unknown_uart(json!({ "uart": [{ "id": "u" }], "zw101": { "uart_id": "x" } }), ConfigError::UnknownUart("x".into()))]
#[case::invalid_id(json!({ "uart": [{ "id": "u" }], "zw101": { "id": "9fp" } }), ConfigError::InvalidId("9fp".into()))]
#[case::duplicate_generated_id(
    json!({
        "uart": [{ "id": "u" }],
        "zw101": { "id": "fp" },
        "binary_sensor": [{ "platform": "zw101" }, { "platform": "zw101" }]
    }),
    ConfigError::DuplicateId("fp_fingerprint".into())
)]
#[case::entity_shadows_uart(
    json!({ "uart": [{ "id": "u" }], "zw101": {}, "text_sensor": [{ "platform": "zw101", "status": { "id": "u" } }] }),
    ConfigError::DuplicateId("u".into())
)]
fn test_invalid_configs(#[case] value: serde_json::Value, #[case] expected: ConfigError) {
    assert_eq!(parse(value).validate(), Err(expected));
}

#[rstest]
#[case::root(json!({ "uart": [{ "id": "u" }], "zw101": { "update_interval": "1s" } }))]
#[case::sensor(json!({ "zw101": {}, "sensor": [{ "platform": "zw101", "match_quality": {} }] }))]
#[case::switch_entity(json!({ "zw101": {}, "switch": [{ "platform": "zw101", "enroll": { "colour": "red" } }] }))]
fn test_unknown_keys_are_rejected(#[case] value: serde_json::Value) {
    assert!(serde_json::from_value::<DeviceConfig>(value).is_err());
}

#[test]
fn test_timings_are_configurable() {
    let config = parse(json!({
        "uart": [{ "id": "u" }],
        "zw101": { "timings": { "match_hold_ms": 5000, "enroll_samples": 3 } }
    }))
    .validate()
    .unwrap();

    assert_eq!(config.root.timings.match_hold_ms, 5000);
    assert_eq!(config.root.timings.enroll_samples, 3);
    assert_eq!(config.root.timings.search_interval_ms, 1000);
}

#[derive(Default)]
struct RecordingFactory {
    created: Vec<(String, EntityRole)>,
    enroll: Option<Shared<bool>>,
}

impl EntityFactory for RecordingFactory {
    fn binary_sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn BinarySensor> {
        self.created.push((entity.id.clone(), entity.role));
        let handle: Shared<bool> = shared();
        Box::new(handle)
    }

    fn sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn Sensor> {
        self.created.push((entity.id.clone(), entity.role));
        let handle: Shared<f32> = shared();
        Box::new(handle)
    }

    fn switch(&mut self, entity: &ResolvedEntity) -> Box<dyn Switch> {
        self.created.push((entity.id.clone(), entity.role));
        let handle: Shared<bool> = shared();
        if entity.role == EntityRole::EnrollSwitch {
            self.enroll = Some(handle.clone());
        }
        Box::new(handle)
    }

    fn text_sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn TextSensor> {
        self.created.push((entity.id.clone(), entity.role));
        let handle: Shared<String> = Rc::new(RefCell::new(Default::default()));
        Box::new(handle)
    }
}

#[test]
fn test_wiring_attaches_every_declared_entity() {
    let config = parse(full_config()).validate().unwrap();
    let mut rig = Rig::with_timings(config.root.timings);
    let mut factory = RecordingFactory::default();

    let count = wire(&config, &mut rig.component, &mut factory);

    assert_eq!(count, 6);
    assert_eq!(
        factory.created.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
        vec!["fp_fingerprint", "fp_match_score", "finger_id", "fp_enroll", "fp_clear", "fp_status"]
    );

    // The factory's entities replaced the rig's defaults.
    rig.component.write_switch(SwitchKind::Enroll, true);
    assert_eq!(factory.enroll.as_ref().unwrap().borrow().value, Some(false));
    assert_eq!(rig.enroll_switch.borrow().value, None);
}

#[test]
fn test_wiring_twice_gives_same_registrations() {
    let config = parse(full_config()).validate().unwrap();
    let mut first = RecordingFactory::default();
    let mut second = RecordingFactory::default();

    wire(&config, &mut Rig::new().component, &mut first);
    wire(&config, &mut Rig::new().component, &mut second);
    assert_eq!(first.created, second.created);
}
