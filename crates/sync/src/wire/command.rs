use std::str::FromStr;

use crate::simulation::{CommandSink, ControlChannel, RudderPump};

use super::format::{clean_payload, COMMAND_PREFIX, FIELD_SEPARATOR, GROUP_SEPARATOR};

/// Nautical miles used for the first leg built by `RL`.
pub const RESET_LEG_DISTANCE_NM: f32 = 1.0;

const SUB_MESSAGE_SEPARATOR: &str = "|";
const TAG_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipTarget {
    OwnShip,
    Contact(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManOverboardAction {
    Release,
    Retrieve,
}

/// Weather override; `None` fields leave the model value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherOverride {
    pub weather: Option<f32>,
    pub rain: Option<f32>,
    pub visibility: Option<f32>,
    pub wind_direction: f32,
    pub wind_speed: Option<f32>,
    pub stream_direction: f32,
    pub stream_speed: Option<f32>,
    pub stream_override: bool,
}

/// One decoded inbound instruction. Ship and leg indices are zero based.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ChangeLeg {
        ship: usize,
        leg: usize,
        bearing: f32,
        speed: f32,
        distance: f32,
    },
    AddLeg {
        ship: usize,
        after_leg: Option<usize>,
        bearing: f32,
        speed: f32,
        distance: f32,
    },
    DeleteLeg {
        ship: usize,
        leg: usize,
    },
    Reposition {
        target: ShipTarget,
        x: f32,
        z: f32,
    },
    ResetLegs {
        ship: usize,
        x: f32,
        z: f32,
        course: f32,
        speed: f32,
    },
    SetWeather(WeatherOverride),
    ManOverboard(ManOverboardAction),
    SetMmsi {
        ship: usize,
        mmsi: u32,
    },
    RudderPump {
        pump: RudderPump,
        working: bool,
    },
    FollowUpRudder {
        working: bool,
    },
    ControlOverride {
        channel: ControlChannel,
        value: f32,
    },
    Shutdown,
}

struct CommandSpec {
    tag: &'static str,
    /// Comma separated parts including the tag itself.
    arity: usize,
    parse: fn(&[&str]) -> Option<Command>,
}

const COMMAND_TABLE: &[CommandSpec] = &[
    CommandSpec {
        tag: "CL",
        arity: 6,
        parse: parse_change_leg,
    },
    CommandSpec {
        tag: "AL",
        arity: 6,
        parse: parse_add_leg,
    },
    CommandSpec {
        tag: "DL",
        arity: 3,
        parse: parse_delete_leg,
    },
    CommandSpec {
        tag: "RS",
        arity: 4,
        parse: parse_reposition,
    },
    CommandSpec {
        tag: "RL",
        arity: 6,
        parse: parse_reset_legs,
    },
    CommandSpec {
        tag: "SW",
        arity: 9,
        parse: parse_set_weather,
    },
    CommandSpec {
        tag: "MO",
        arity: 2,
        parse: parse_man_overboard,
    },
    CommandSpec {
        tag: "MM",
        arity: 3,
        parse: parse_set_mmsi,
    },
    CommandSpec {
        tag: "RW",
        arity: 3,
        parse: parse_rudder_pump,
    },
    CommandSpec {
        tag: "RF",
        arity: 2,
        parse: parse_follow_up_rudder,
    },
    CommandSpec {
        tag: "CO",
        arity: 3,
        parse: parse_control_override,
    },
    CommandSpec {
        tag: "SD",
        arity: 1,
        parse: |_| Some(Command::Shutdown),
    },
];

fn number<T: FromStr>(field: &str) -> Option<T> {
    field.trim().parse().ok()
}

/// Wire indices start at 1.
fn wire_index(field: &str) -> Option<i64> {
    number::<i64>(field)?.checked_sub(1)
}

fn ship_index(field: &str) -> Option<usize> {
    wire_index(field).and_then(|n| usize::try_from(n).ok())
}

fn non_negative(value: f32) -> Option<f32> {
    (value >= 0.0).then_some(value)
}

fn parse_change_leg(parts: &[&str]) -> Option<Command> {
    Some(Command::ChangeLeg {
        ship: ship_index(parts[1])?,
        leg: ship_index(parts[2])?,
        bearing: number(parts[3])?,
        speed: number(parts[4])?,
        distance: number(parts[5])?,
    })
}

fn parse_add_leg(parts: &[&str]) -> Option<Command> {
    let after = wire_index(parts[2])?;
    Some(Command::AddLeg {
        ship: ship_index(parts[1])?,
        after_leg: usize::try_from(after).ok(),
        bearing: number(parts[3])?,
        speed: number(parts[4])?,
        distance: number(parts[5])?,
    })
}

fn parse_delete_leg(parts: &[&str]) -> Option<Command> {
    Some(Command::DeleteLeg {
        ship: ship_index(parts[1])?,
        leg: ship_index(parts[2])?,
    })
}

fn parse_reposition(parts: &[&str]) -> Option<Command> {
    let ship = wire_index(parts[1])?;
    let target = match usize::try_from(ship) {
        Ok(index) => ShipTarget::Contact(index),
        Err(_) => ShipTarget::OwnShip,
    };
    Some(Command::Reposition {
        target,
        x: number(parts[2])?,
        z: number(parts[3])?,
    })
}

fn parse_reset_legs(parts: &[&str]) -> Option<Command> {
    Some(Command::ResetLegs {
        ship: ship_index(parts[1])?,
        x: number(parts[2])?,
        z: number(parts[3])?,
        course: number(parts[4])?,
        speed: number(parts[5])?,
    })
}

fn parse_set_weather(parts: &[&str]) -> Option<Command> {
    let values: Vec<f32> = parts[1..].iter().map(|p| number(p)).collect::<Option<_>>()?;
    // The override flag is truncated toward zero before the sign test.
    let stream_override = values[7].trunc() > 0.0;
    Some(Command::SetWeather(WeatherOverride {
        weather: non_negative(values[0]),
        rain: non_negative(values[1]),
        visibility: non_negative(values[2]),
        wind_direction: values[3],
        wind_speed: non_negative(values[4]),
        stream_direction: values[5],
        stream_speed: non_negative(values[6]),
        stream_override,
    }))
}

fn parse_man_overboard(parts: &[&str]) -> Option<Command> {
    match number::<i32>(parts[1])? {
        1 => Some(Command::ManOverboard(ManOverboardAction::Release)),
        -1 => Some(Command::ManOverboard(ManOverboardAction::Retrieve)),
        _ => None,
    }
}

fn parse_set_mmsi(parts: &[&str]) -> Option<Command> {
    Some(Command::SetMmsi {
        ship: ship_index(parts[1])?,
        mmsi: number(parts[2])?,
    })
}

fn parse_rudder_pump(parts: &[&str]) -> Option<Command> {
    Some(Command::RudderPump {
        pump: RudderPump::from_id(number(parts[1])?)?,
        working: number::<i32>(parts[2])? != 0,
    })
}

fn parse_follow_up_rudder(parts: &[&str]) -> Option<Command> {
    let working = match number::<i32>(parts[1])? {
        1 => true,
        0 => false,
        _ => return None,
    };
    Some(Command::FollowUpRudder { working })
}

fn parse_control_override(parts: &[&str]) -> Option<Command> {
    Some(Command::ControlOverride {
        channel: ControlChannel::from_selector(number(parts[1])?)?,
        value: number(parts[2])?,
    })
}

impl Command {
    /// Decodes one `#` delimited command. `None` if the tag is unknown, the part
    /// count differs from the tag's arity, or a field does not parse.
    pub fn decode(text: &str) -> Option<Self> {
        let tag = text.get(..TAG_LEN)?;
        let spec = COMMAND_TABLE.iter().find(|spec| spec.tag == tag)?;
        let parts: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        if parts.len() != spec.arity {
            return None;
        }
        (spec.parse)(&parts)
    }

    /// Wire text without the `MC` prefix, with 1-based indices.
    pub fn encode(&self) -> String {
        match self {
            Command::ChangeLeg {
                ship,
                leg,
                bearing,
                speed,
                distance,
            } => format!("CL,{},{},{},{},{}", ship + 1, leg + 1, bearing, speed, distance),
            Command::AddLeg {
                ship,
                after_leg,
                bearing,
                speed,
                distance,
            } => format!(
                "AL,{},{},{},{},{}",
                ship + 1,
                after_leg.map_or(0, |leg| leg + 1),
                bearing,
                speed,
                distance
            ),
            Command::DeleteLeg { ship, leg } => format!("DL,{},{}", ship + 1, leg + 1),
            Command::Reposition { target, x, z } => {
                let ship = match target {
                    ShipTarget::OwnShip => 0,
                    ShipTarget::Contact(index) => index + 1,
                };
                format!("RS,{},{},{}", ship, x, z)
            }
            Command::ResetLegs {
                ship,
                x,
                z,
                course,
                speed,
            } => format!("RL,{},{},{},{},{}", ship + 1, x, z, course, speed),
            Command::SetWeather(w) => {
                let sentinel = |value: Option<f32>| value.unwrap_or(-1.0);
                format!(
                    "SW,{},{},{},{},{},{},{},{}",
                    sentinel(w.weather),
                    sentinel(w.rain),
                    sentinel(w.visibility),
                    w.wind_direction,
                    sentinel(w.wind_speed),
                    w.stream_direction,
                    sentinel(w.stream_speed),
                    u8::from(w.stream_override)
                )
            }
            Command::ManOverboard(ManOverboardAction::Release) => "MO,1".to_string(),
            Command::ManOverboard(ManOverboardAction::Retrieve) => "MO,-1".to_string(),
            Command::SetMmsi { ship, mmsi } => format!("MM,{},{}", ship + 1, mmsi),
            Command::RudderPump { pump, working } => {
                format!("RW,{},{}", pump.id(), u8::from(*working))
            }
            Command::FollowUpRudder { working } => format!("RF,{}", u8::from(*working)),
            Command::ControlOverride { channel, value } => {
                format!("CO,{},{}", channel.selector(), value)
            }
            Command::Shutdown => "SD".to_string(),
        }
    }

    pub fn apply<M: CommandSink + ?Sized>(&self, model: &mut M) {
        match *self {
            Command::ChangeLeg {
                ship,
                leg,
                bearing,
                speed,
                distance,
            } => model.change_contact_leg(ship, leg, bearing, speed, distance),
            Command::AddLeg {
                ship,
                after_leg,
                bearing,
                speed,
                distance,
            } => model.add_contact_leg(ship, after_leg, bearing, speed, distance),
            Command::DeleteLeg { ship, leg } => model.delete_contact_leg(ship, leg),
            Command::Reposition { target, x, z } => match target {
                ShipTarget::OwnShip => model.set_own_ship_position(x, z),
                ShipTarget::Contact(ship) => model.set_contact_position(ship, x, z),
            },
            Command::ResetLegs {
                ship,
                x,
                z,
                course,
                speed,
            } => {
                model.set_contact_position(ship, x, z);
                model.reset_contact_legs(ship, course, speed, RESET_LEG_DISTANCE_NM);
            }
            Command::SetWeather(w) => {
                if let Some(weather) = w.weather {
                    model.set_weather(weather);
                }
                if let Some(rain) = w.rain {
                    model.set_rain(rain);
                }
                if let Some(visibility) = w.visibility {
                    model.set_visibility(visibility);
                }
                if let Some(speed) = w.wind_speed {
                    model.set_wind_speed(speed);
                }
                model.set_wind_direction(w.wind_direction);
                if let Some(speed) = w.stream_speed {
                    model.set_stream_override_speed(speed);
                }
                model.set_stream_override_direction(w.stream_direction);
                model.set_stream_override(w.stream_override);
            }
            Command::ManOverboard(ManOverboardAction::Release) => model.release_man_overboard(),
            Command::ManOverboard(ManOverboardAction::Retrieve) => model.retrieve_man_overboard(),
            Command::SetMmsi { ship, mmsi } => model.set_contact_mmsi(ship, mmsi),
            Command::RudderPump { pump, working } => {
                model.set_rudder_pump_working(pump, working);
                if !working {
                    model.set_alarm(true);
                } else if model.rudder_pump_working(pump.other()) {
                    model.set_alarm(false);
                }
            }
            Command::FollowUpRudder { working } => model.set_follow_up_rudder_working(working),
            Command::ControlOverride { channel, value } => model.set_control(channel, value),
            Command::Shutdown => model.request_shutdown(),
        }
    }
}

/// Builds an inbound buffer: `MC` followed by `#` terminated commands.
pub fn encode_commands(commands: &[Command]) -> String {
    let mut buffer = String::from(COMMAND_PREFIX);
    for command in commands {
        buffer.push_str(&command.encode());
        buffer.push_str(GROUP_SEPARATOR);
    }
    buffer
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBuffer {
    pub commands: Vec<Command>,
    pub dropped: usize,
}

/// Splits an inbound buffer into commands.
///
/// The buffer may hold several `|` separated messages, each of which must start
/// with `MC`. Messages without the prefix are ignored; commands that fail to
/// decode are counted in `dropped` and never affect their siblings.
pub fn decode_buffer(buffer: &str) -> DecodedBuffer {
    let mut decoded = DecodedBuffer::default();

    for message in clean_payload(buffer).split(SUB_MESSAGE_SEPARATOR) {
        let Some(body) = message.strip_prefix(COMMAND_PREFIX) else {
            log::debug!("ignoring message without command prefix: {:?}", message);
            continue;
        };

        for text in body.split(GROUP_SEPARATOR).filter(|text| !text.is_empty()) {
            match Command::decode(text) {
                Some(command) => decoded.commands.push(command),
                None => {
                    log::debug!("dropping malformed command: {:?}", text);
                    decoded.dropped += 1;
                }
            }
        }
    }

    decoded
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub applied: usize,
    pub dropped: usize,
}

/// Decodes `buffer` and applies every valid command to `model`, in order.
pub fn dispatch<M: CommandSink + ?Sized>(buffer: &str, model: &mut M) -> DispatchReport {
    let decoded = decode_buffer(buffer);
    for command in &decoded.commands {
        log::trace!("applying {:?}", command);
        command.apply(model);
    }
    DispatchReport {
        applied: decoded.commands.len(),
        dropped: decoded.dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_leg_converts_to_zero_based() {
        assert_eq!(
            Command::decode("CL,2,1,090.0,12.0,5.0"),
            Some(Command::ChangeLeg {
                ship: 1,
                leg: 0,
                bearing: 90.0,
                speed: 12.0,
                distance: 5.0
            })
        );
    }

    #[test]
    fn arity_mismatch_is_dropped() {
        assert_eq!(Command::decode("CL,2,1,090.0,12.0"), None);
        assert_eq!(Command::decode("CL,2,1,090.0,12.0,5.0,7"), None);
        assert_eq!(Command::decode("DL,1"), None);
        assert_eq!(Command::decode("SD,1"), None);
    }

    #[test]
    fn unknown_tag_is_dropped() {
        assert_eq!(Command::decode("ZZ,1,2"), None);
        assert_eq!(Command::decode("C"), None);
    }

    #[test]
    fn unparseable_field_is_dropped() {
        assert_eq!(Command::decode("DL,one,2"), None);
        assert_eq!(Command::decode("MM,1,-5"), None);
    }

    #[test]
    fn minimum_index_is_dropped_without_overflow() {
        let min = i64::MIN;
        for text in [
            format!("CL,{min},1,90,12,5"),
            format!("CL,1,{min},90,12,5"),
            format!("AL,{min},1,90,12,5"),
            format!("AL,1,{min},90,12,5"),
            format!("DL,{min},1"),
            format!("DL,1,{min}"),
            format!("RS,{min},1,2"),
            format!("MM,{min},235000001"),
        ] {
            assert_eq!(Command::decode(&text), None, "{text}");
        }

        let decoded = decode_buffer(&format!("MCRS,{min},1,2#MO,1#"));
        assert_eq!(decoded.dropped, 1);
        assert_eq!(
            decoded.commands,
            vec![Command::ManOverboard(ManOverboardAction::Release)]
        );
    }

    #[test]
    fn reposition_non_positive_ship_targets_own_ship() {
        assert_eq!(
            Command::decode("RS,0,10,20"),
            Some(Command::Reposition {
                target: ShipTarget::OwnShip,
                x: 10.0,
                z: 20.0
            })
        );
        assert_eq!(
            Command::decode("RS,-3,10,20"),
            Some(Command::Reposition {
                target: ShipTarget::OwnShip,
                x: 10.0,
                z: 20.0
            })
        );
        assert_eq!(
            Command::decode("RS,3,10,20"),
            Some(Command::Reposition {
                target: ShipTarget::Contact(2),
                x: 10.0,
                z: 20.0
            })
        );
    }

    #[test]
    fn add_leg_zero_inserts_first() {
        let Some(Command::AddLeg { after_leg, .. }) = Command::decode("AL,1,0,45,10,2") else {
            panic!("expected add leg");
        };
        assert_eq!(after_leg, None);
    }

    #[test]
    fn weather_sentinels() {
        let Some(Command::SetWeather(w)) = Command::decode("SW,-1,-1,-1,200,-1,30,-1,1") else {
            panic!("expected weather");
        };
        assert_eq!(w.weather, None);
        assert_eq!(w.rain, None);
        assert_eq!(w.visibility, None);
        assert_eq!(w.wind_speed, None);
        assert_eq!(w.stream_speed, None);
        assert_eq!(w.wind_direction, 200.0);
        assert_eq!(w.stream_direction, 30.0);
        assert!(w.stream_override);
    }

    #[test]
    fn stream_override_truncates() {
        let Some(Command::SetWeather(w)) = Command::decode("SW,1,1,1,0,1,0,1,0.9") else {
            panic!("expected weather");
        };
        assert!(!w.stream_override);
    }

    #[test]
    fn ignored_selector_values() {
        assert_eq!(Command::decode("MO,0"), None);
        assert_eq!(Command::decode("RF,2"), None);
        assert_eq!(Command::decode("RW,3,1"), None);
        assert_eq!(Command::decode("CO,9,1.0"), None);
        assert_eq!(
            Command::decode("CO,7,-0.5"),
            Some(Command::ControlOverride {
                channel: ControlChannel::BowThruster,
                value: -0.5
            })
        );
    }

    #[test]
    fn buffer_requires_prefix() {
        assert_eq!(decode_buffer("XXCL,2,1,90,12,5#"), DecodedBuffer::default());
        assert_eq!(decode_buffer(""), DecodedBuffer::default());
    }

    #[test]
    fn malformed_sibling_does_not_abort_buffer() {
        let decoded = decode_buffer("MCCL,2,1#MO,1#ZZ#DL,1,1#");
        assert_eq!(decoded.dropped, 2);
        assert_eq!(
            decoded.commands,
            vec![
                Command::ManOverboard(ManOverboardAction::Release),
                Command::DeleteLeg { ship: 0, leg: 0 }
            ]
        );
    }

    #[test]
    fn sub_messages_are_processed_independently() {
        let decoded = decode_buffer("MCDL,1,2#|junk|MCSD#\0");
        assert_eq!(
            decoded.commands,
            vec![Command::DeleteLeg { ship: 0, leg: 1 }, Command::Shutdown]
        );
    }

    #[test]
    fn encode_matches_decoder() {
        let commands = vec![
            Command::ChangeLeg {
                ship: 1,
                leg: 0,
                bearing: 90.0,
                speed: 12.0,
                distance: 5.0,
            },
            Command::AddLeg {
                ship: 0,
                after_leg: None,
                bearing: 45.0,
                speed: 8.5,
                distance: 1.0,
            },
            Command::Reposition {
                target: ShipTarget::OwnShip,
                x: -5.0,
                z: 7.5,
            },
            Command::SetWeather(WeatherOverride {
                wind_direction: 180.0,
                stream_direction: 90.0,
                visibility: Some(3.0),
                ..Default::default()
            }),
        ];
        let buffer = encode_commands(&commands);
        assert!(buffer.starts_with("MCCL,2,1,90,12,5#AL,1,0,45,8.5,1#RS,0,-5,7.5#"));
        assert_eq!(decode_buffer(&buffer).commands, commands);
    }
}
