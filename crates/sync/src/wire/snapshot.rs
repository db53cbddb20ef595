use glam::{Vec2, Vec3};

use crate::simulation::{
    ContactState, ControlState, Leg, ManOverboardState, MooringLine, OwnShipKinematics,
    OwnShipState, PayloadKind, SnapshotSink, SnapshotSource, TimeState, WeatherState, MPS_TO_KTS,
};

use super::format::{
    blocks, clean_payload, DecodeError, FieldReader, BLOCK_SEPARATOR, FIELD_SEPARATOR,
    FULL_STATE_PREFIX, GROUP_SEPARATOR, LEG_SEPARATOR, SCENARIO_PREFIX, SHORT_PREFIX,
    SHUTDOWN_PAYLOAD, SUB_FIELD_SEPARATOR,
};

const FULL_STATE_GROUPS: usize = 13;

mod group {
    pub const TIME: usize = 0;
    pub const OWN_SHIP: usize = 1;
    pub const COUNTS: usize = 2;
    pub const CONTACTS: usize = 3;
    pub const BUOYS: usize = 4;
    pub const MAN_OVERBOARD: usize = 5;
    pub const LOOP: usize = 6;
    pub const WEATHER: usize = 7;
    pub const CAMERA_VIEW: usize = 9;
    pub const MOORING_LINES: usize = 11;
    pub const CONTROLS: usize = 12;
}

// Groups 8 (EBL) and 10 (multiplayer request) are sent as constants.
const EBL_PLACEHOLDER: &str = "0,0,0";
const MULTIPLAYER_PLACEHOLDER: &str = "0";

/// Everything carried by a `BC` payload.
///
/// Positions are `Vec2` holding (x, z). Speeds are m/s here and knots on the wire,
/// except leg speeds which are knots in both places.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FullState {
    pub time: TimeState,
    pub own_ship: OwnShipState,
    pub controls: ControlState,
    pub contacts: Vec<ContactState>,
    pub buoys: Vec<Vec2>,
    pub man_overboard: ManOverboardState,
    pub loop_number: u64,
    pub weather: WeatherState,
    pub camera_view: u32,
    pub mooring_lines: Vec<MooringLine>,
}

impl FullState {
    pub fn capture<S: SnapshotSource + ?Sized>(source: &S) -> Self {
        Self {
            time: source.time(),
            own_ship: source.own_ship(),
            controls: source.controls(),
            contacts: source.contacts(),
            buoys: source.buoys(),
            man_overboard: source.man_overboard(),
            loop_number: source.loop_number(),
            weather: source.weather(),
            camera_view: source.camera_view(),
            mooring_lines: source.mooring_lines(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{}", FULL_STATE_PREFIX, self.encode_body())
    }

    /// The thirteen `#` separated groups without a prefix.
    pub fn encode_body(&self) -> String {
        let groups = [
            self.encode_time(),
            self.encode_own_ship(),
            self.encode_counts(),
            self.encode_contacts(),
            self.encode_buoys(),
            format!(
                "{},{}",
                self.man_overboard.position.x, self.man_overboard.position.y
            ),
            self.loop_number.to_string(),
            self.encode_weather(),
            EBL_PLACEHOLDER.to_string(),
            self.camera_view.to_string(),
            MULTIPLAYER_PLACEHOLDER.to_string(),
            self.encode_mooring_lines(),
            self.encode_controls(),
        ];
        groups.join(GROUP_SEPARATOR)
    }

    fn encode_time(&self) -> String {
        let t = &self.time;
        format!(
            "{},{},{},{}",
            t.timestamp, t.time_offset, t.time_delta, t.accelerator
        )
    }

    fn encode_own_ship(&self) -> String {
        let k = &self.own_ship.kinematics;
        let c = &self.controls;
        // Pitch and roll are not simulated and always go out as zero.
        format!(
            "{},{},{},{},0,0,{},{},{}:{}:{}:{}",
            k.position.x,
            k.position.y,
            k.heading,
            k.rate_of_turn,
            k.sog * MPS_TO_KTS,
            self.own_ship.cog,
            c.rudder,
            c.wheel,
            c.port_engine_rpm,
            c.stbd_engine_rpm
        )
    }

    fn encode_counts(&self) -> String {
        format!(
            "{},{},{},{}",
            self.contacts.len(),
            self.buoys.len(),
            u8::from(self.man_overboard.visible),
            self.mooring_lines.len()
        )
    }

    fn encode_contacts(&self) -> String {
        self.contacts
            .iter()
            .map(|contact| {
                let legs: Vec<String> = contact
                    .legs
                    .iter()
                    .map(|leg| format!("{}:{}:{}", leg.bearing, leg.speed, leg.start_time))
                    .collect();
                // Rate of turn and SART are reserved and always zero.
                format!(
                    "{},{},{},{},0,0,{},{},{}",
                    contact.position.x,
                    contact.position.y,
                    contact.heading,
                    contact.speed * MPS_TO_KTS,
                    contact.mmsi,
                    contact.legs.len(),
                    legs.join(LEG_SEPARATOR)
                )
            })
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    fn encode_buoys(&self) -> String {
        self.buoys
            .iter()
            .map(|buoy| format!("{},{}", buoy.x, buoy.y))
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    fn encode_weather(&self) -> String {
        let w = &self.weather;
        format!(
            "{},{},{},{},{},{},{},{}",
            w.weather,
            w.visibility,
            w.wind_direction,
            w.rain,
            w.wind_speed,
            w.stream_direction,
            w.stream_speed,
            u8::from(w.stream_override)
        )
    }

    fn encode_mooring_lines(&self) -> String {
        self.mooring_lines
            .iter()
            .map(|line| {
                format!(
                    "{},{},{},{},{},{},{},{},{},{}",
                    line.start.x,
                    line.start.y,
                    line.start.z,
                    line.end.x,
                    line.end.y,
                    line.end.z,
                    line.start_type,
                    line.end_type,
                    line.start_id,
                    line.end_id
                )
            })
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    fn encode_controls(&self) -> String {
        let c = &self.controls;
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            c.wheel,
            c.rudder,
            c.port_engine,
            c.stbd_engine,
            c.port_schottel,
            c.stbd_schottel,
            c.port_thrust_lever,
            c.stbd_thrust_lever,
            c.bow_thruster,
            c.stern_thruster
        )
    }

    pub fn decode_body(body: &str) -> Result<Self, DecodeError> {
        let groups: Vec<&str> = body.split(GROUP_SEPARATOR).collect();
        if groups.len() < FULL_STATE_GROUPS {
            return Err(DecodeError::MissingGroup {
                index: groups.len(),
            });
        }

        let time = decode_time(groups[group::TIME])?;

        let own = FieldReader::new(group::OWN_SHIP, groups[group::OWN_SHIP], FIELD_SEPARATOR);
        let own_ship = OwnShipState {
            kinematics: OwnShipKinematics {
                position: Vec2::new(own.get(0)?, own.get(1)?),
                heading: own.get(2)?,
                rate_of_turn: own.get(3)?,
                sog: own.get::<f32>(6)? / MPS_TO_KTS,
            },
            cog: own.get(7)?,
        };
        let helm = FieldReader::new(group::OWN_SHIP, own.raw(8)?, SUB_FIELD_SEPARATOR);

        let counts = FieldReader::new(group::COUNTS, groups[group::COUNTS], FIELD_SEPARATOR);
        let contact_count: usize = counts.get(0)?;
        let buoy_count: usize = counts.get(1)?;
        let man_overboard_visible = counts.flag(2)?;
        let line_count: usize = counts.get(3)?;

        let contacts = blocks(groups[group::CONTACTS])
            .into_iter()
            .map(decode_contact)
            .collect::<Result<Vec<_>, _>>()?;
        check_count(group::CONTACTS, contact_count, contacts.len())?;

        let buoys = blocks(groups[group::BUOYS])
            .into_iter()
            .map(|block| {
                let buoy = FieldReader::new(group::BUOYS, block, FIELD_SEPARATOR);
                Ok(Vec2::new(buoy.get(0)?, buoy.get(1)?))
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;
        check_count(group::BUOYS, buoy_count, buoys.len())?;

        let mob = FieldReader::new(
            group::MAN_OVERBOARD,
            groups[group::MAN_OVERBOARD],
            FIELD_SEPARATOR,
        );
        let man_overboard = ManOverboardState {
            visible: man_overboard_visible,
            position: Vec2::new(mob.get(0)?, mob.get(1)?),
        };

        let loop_number =
            FieldReader::new(group::LOOP, groups[group::LOOP], FIELD_SEPARATOR).get(0)?;
        let weather = decode_weather(groups[group::WEATHER])?;
        let camera_view =
            FieldReader::new(group::CAMERA_VIEW, groups[group::CAMERA_VIEW], FIELD_SEPARATOR)
                .get(0)?;

        let mooring_lines = blocks(groups[group::MOORING_LINES])
            .into_iter()
            .map(decode_mooring_line)
            .collect::<Result<Vec<_>, _>>()?;
        check_count(group::MOORING_LINES, line_count, mooring_lines.len())?;

        let ctl = FieldReader::new(group::CONTROLS, groups[group::CONTROLS], FIELD_SEPARATOR);
        let controls = ControlState {
            wheel: ctl.get(0)?,
            rudder: ctl.get(1)?,
            port_engine: ctl.get(2)?,
            stbd_engine: ctl.get(3)?,
            port_engine_rpm: helm.get(2)?,
            stbd_engine_rpm: helm.get(3)?,
            port_schottel: ctl.get(4)?,
            stbd_schottel: ctl.get(5)?,
            port_thrust_lever: ctl.get(6)?,
            stbd_thrust_lever: ctl.get(7)?,
            bow_thruster: ctl.get(8)?,
            stern_thruster: ctl.get(9)?,
        };

        Ok(Self {
            time,
            own_ship,
            controls,
            contacts,
            buoys,
            man_overboard,
            loop_number,
            weather,
            camera_view,
            mooring_lines,
        })
    }
}

fn check_count(group: usize, expected: usize, found: usize) -> Result<(), DecodeError> {
    if expected == found {
        Ok(())
    } else {
        Err(DecodeError::CountMismatch {
            group,
            expected,
            found,
        })
    }
}

fn decode_time(text: &str) -> Result<TimeState, DecodeError> {
    let time = FieldReader::new(group::TIME, text, FIELD_SEPARATOR);
    Ok(TimeState {
        timestamp: time.get(0)?,
        time_offset: time.get(1)?,
        time_delta: time.get(2)?,
        accelerator: time.get(3)?,
    })
}

fn decode_contact(block: &str) -> Result<ContactState, DecodeError> {
    let contact = FieldReader::new(group::CONTACTS, block, FIELD_SEPARATOR);
    let leg_count: usize = contact.get(7)?;
    let leg_text = contact.raw(8).unwrap_or("");

    let legs = if leg_text.is_empty() {
        Vec::new()
    } else {
        leg_text
            .split(LEG_SEPARATOR)
            .map(|text| {
                let leg = FieldReader::new(group::CONTACTS, text, SUB_FIELD_SEPARATOR);
                Ok(Leg {
                    bearing: leg.get(0)?,
                    speed: leg.get(1)?,
                    start_time: leg.get(2)?,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?
    };
    check_count(group::CONTACTS, leg_count, legs.len())?;

    Ok(ContactState {
        position: Vec2::new(contact.get(0)?, contact.get(1)?),
        heading: contact.get(2)?,
        speed: contact.get::<f32>(3)? / MPS_TO_KTS,
        mmsi: contact.get(6)?,
        legs,
    })
}

fn decode_weather(text: &str) -> Result<WeatherState, DecodeError> {
    let w = FieldReader::new(group::WEATHER, text, FIELD_SEPARATOR);
    Ok(WeatherState {
        weather: w.get(0)?,
        visibility: w.get(1)?,
        wind_direction: w.get(2)?,
        rain: w.get(3)?,
        wind_speed: w.get(4)?,
        stream_direction: w.get(5)?,
        stream_speed: w.get(6)?,
        stream_override: w.flag(7)?,
    })
}

fn decode_mooring_line(block: &str) -> Result<MooringLine, DecodeError> {
    let line = FieldReader::new(group::MOORING_LINES, block, FIELD_SEPARATOR);
    Ok(MooringLine {
        start: Vec3::new(line.get(0)?, line.get(1)?, line.get(2)?),
        end: Vec3::new(line.get(3)?, line.get(4)?, line.get(5)?),
        start_type: line.get(6)?,
        end_type: line.get(7)?,
        start_id: line.get(8)?,
        end_id: line.get(9)?,
    })
}

pub fn encode_short(kinematics: &OwnShipKinematics) -> String {
    format!(
        "{}{},{},{},{},{}",
        SHORT_PREFIX,
        kinematics.position.x,
        kinematics.position.y,
        kinematics.heading,
        kinematics.rate_of_turn,
        kinematics.sog * MPS_TO_KTS
    )
}

fn decode_short(body: &str) -> Result<OwnShipKinematics, DecodeError> {
    let own = FieldReader::new(0, body, FIELD_SEPARATOR);
    Ok(OwnShipKinematics {
        position: Vec2::new(own.get(0)?, own.get(1)?),
        heading: own.get(2)?,
        rate_of_turn: own.get(3)?,
        sog: own.get::<f32>(4)? / MPS_TO_KTS,
    })
}

/// Builds the outbound text for one cadence slot.
pub fn encode_payload<S: SnapshotSource + ?Sized>(kind: PayloadKind, source: &S) -> String {
    match kind {
        PayloadKind::Scenario => source.serialised_scenario(),
        PayloadKind::FullState => FullState::capture(source).encode(),
        PayloadKind::Short => encode_short(&source.own_ship().kinematics),
    }
}

/// A decoded outbound payload, as seen by a secondary.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Short(OwnShipKinematics),
    Full(Box<FullState>),
    /// Full scenario text including its prefix, handed to the model untouched.
    Scenario(String),
    Shutdown,
}

impl Payload {
    pub fn apply<S: SnapshotSink + ?Sized>(&self, sink: &mut S) -> Result<(), DecodeError> {
        match self {
            Payload::Short(kinematics) => sink.apply_own_ship(kinematics),
            Payload::Full(state) => sink.apply_full_state(state),
            Payload::Scenario(text) => sink.load_scenario(text)?,
            Payload::Shutdown => {}
        }
        Ok(())
    }
}

pub fn decode_payload(raw: &str) -> Result<Payload, DecodeError> {
    let text = clean_payload(raw);
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    if text == SHUTDOWN_PAYLOAD {
        return Ok(Payload::Shutdown);
    }
    if let Some(body) = text.strip_prefix(SHORT_PREFIX) {
        return decode_short(body).map(Payload::Short);
    }
    if let Some(body) = text.strip_prefix(FULL_STATE_PREFIX) {
        return FullState::decode_body(body).map(|state| Payload::Full(Box::new(state)));
    }
    if text.starts_with(SCENARIO_PREFIX) {
        return Ok(Payload::Scenario(text.to_string()));
    }
    Err(DecodeError::UnknownPrefix(text.chars().take(2).collect()))
}
