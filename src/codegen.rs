//! Turns a validated configuration into the list of calls that instantiate the component and
//! attach its entities, and replays that list onto a live [`Zw101Component`].
//!
//! Generation is a pure function of the configuration: the same input always yields the same
//! program. The root component is always created and registered before any entity refers to it.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use embedded_hal::serial::{Read, Write};
use tracing::debug;

use crate::component::Zw101Component;
use crate::config::{EntityKind, EntityRole, ResolvedEntity, ValidatedConfig};
use crate::entities::{BinarySensor, Sensor, Switch, TextSensor};
use crate::utils::Clock;

/// Class of the root component in generated code.
pub const COMPONENT_CLASS: &str = "zw101::ZW101Component";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    NewComponent { id: String },
    RegisterComponent { id: String },
    RegisterUartDevice { id: String, uart_id: String },
    NewEntity { id: String, role: EntityRole },
    SetParent { id: String, parent: String },
    /// `parent->setter(entity)`: attaches one entity to the component.
    Register { parent: String, role: EntityRole, entity: String },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewComponent { id } => write!(f, "auto *{} = new {}();", id, COMPONENT_CLASS),
            Self::RegisterComponent { id } => write!(f, "App.register_component({});", id),
            Self::RegisterUartDevice { id, uart_id } => write!(f, "{}->set_uart_parent({});", id, uart_id),
            Self::NewEntity { id, role } => write!(f, "auto *{} = new {}();", id, role.class_name()),
            Self::SetParent { id, parent } => write!(f, "{}->set_parent({});", id, parent),
            Self::Register { parent, role, entity } => write!(f, "{}->{}({});", parent, role.setter(), entity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn registrations(&self) -> impl Iterator<Item = (&str, EntityRole, &str)> + '_ {
        return self.statements.iter().filter_map(|s| match s {
            Statement::Register { parent, role, entity } => Some((parent.as_str(), *role, entity.as_str())),
            _ => None,
        });
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

pub fn generate(config: &ValidatedConfig) -> Program {
    let root = &config.root;
    let mut statements = Vec::with_capacity(3 + config.entities.len() * 3);

    statements.push(Statement::NewComponent { id: root.id.clone() });
    statements.push(Statement::RegisterComponent { id: root.id.clone() });
    statements.push(Statement::RegisterUartDevice { id: root.id.clone(), uart_id: root.uart_id.clone() });

    for entity in &config.entities {
        statements.push(Statement::NewEntity { id: entity.id.clone(), role: entity.role });
        if entity.role.has_parent() {
            statements.push(Statement::SetParent { id: entity.id.clone(), parent: entity.parent.clone() });
        }
        statements.push(Statement::Register {
            parent: entity.parent.clone(),
            role: entity.role,
            entity: entity.id.clone(),
        });
    }

    return Program { statements };
}

/// Creates the host-side entity objects the component publishes to.
pub trait EntityFactory {
    fn binary_sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn BinarySensor>;
    fn sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn Sensor>;
    fn switch(&mut self, entity: &ResolvedEntity) -> Box<dyn Switch>;
    fn text_sensor(&mut self, entity: &ResolvedEntity) -> Box<dyn TextSensor>;
}

/// Runs the registration calls of `generate(config)` against `component`, asking `factory` for
/// each entity. Returns the number of registrations made.
pub fn wire<TX, RX, CLK, F>(config: &ValidatedConfig, component: &mut Zw101Component<TX, RX, CLK>, factory: &mut F) -> usize
where TX: Write<u8>,
      RX: Read<u8>,
      CLK: Clock,
      F: EntityFactory + ?Sized
{
    let program = generate(config);
    let mut count = 0;

    for (_, role, entity_id) in program.registrations() {
        let entity = match config.entity(entity_id) {
            Some(entity) => entity,
            None => continue,
        };
        debug!(entity = entity_id, setter = role.setter(), "registering entity");

        match role.kind() {
            EntityKind::BinarySensor => component.set_fingerprint_sensor(factory.binary_sensor(entity)),
            EntityKind::TextSensor => component.set_status_sensor(factory.text_sensor(entity)),
            EntityKind::Sensor => {
                let sensor = factory.sensor(entity);
                if role == EntityRole::MatchScore {
                    component.set_match_score_sensor(sensor);
                } else {
                    component.set_match_id_sensor(sensor);
                }
            },
            EntityKind::Switch => {
                let switch = factory.switch(entity);
                if role == EntityRole::EnrollSwitch {
                    component.set_enroll_switch(switch);
                } else {
                    component.set_clear_switch(switch);
                }
            },
        }
        count += 1;
    }

    return count;
}
