use glam::Vec2;

use crate::wire::{DecodeError, FullState, SCENARIO_PREFIX};

use super::model::{
    CommandSink, ContactState, ControlChannel, ControlState, Leg, ManOverboardState, MooringLine,
    OwnShipKinematics, OwnShipState, RudderPump, SnapshotSink, SnapshotSource, TimeState,
    WeatherState, MPS_TO_KTS,
};

const SECONDS_PER_HOUR: f32 = 3600.0;

/// Seconds needed to cover `distance` nautical miles at `speed` knots.
fn leg_duration(speed: f32, distance: f32) -> f32 {
    if speed > 0.0 {
        distance / speed * SECONDS_PER_HOUR
    } else {
        0.0
    }
}

fn shift_legs(legs: &mut [Leg], seconds: f32) {
    for leg in legs {
        leg.start_time += seconds;
    }
}

/// Plain in-memory simulation state. No kinematics are integrated here; the
/// model only holds what the protocol reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipModel {
    pub loop_number: u64,
    pub time: TimeState,
    pub own_ship: OwnShipState,
    pub controls: ControlState,
    pub contacts: Vec<ContactState>,
    pub buoys: Vec<Vec2>,
    pub man_overboard: ManOverboardState,
    pub weather: WeatherState,
    pub camera_view: u32,
    pub mooring_lines: Vec<MooringLine>,
    pub rudder_pumps: [bool; 2],
    pub alarm: bool,
    pub follow_up_rudder: bool,
    pub shutdown_requested: bool,
}

impl Default for ShipModel {
    fn default() -> Self {
        Self {
            loop_number: 0,
            time: TimeState {
                accelerator: 1.0,
                ..Default::default()
            },
            own_ship: OwnShipState::default(),
            controls: ControlState::default(),
            contacts: Vec::new(),
            buoys: Vec::new(),
            man_overboard: ManOverboardState::default(),
            weather: WeatherState::default(),
            camera_view: 0,
            mooring_lines: Vec::new(),
            rudder_pumps: [true, true],
            alarm: false,
            follow_up_rudder: true,
            shutdown_requested: false,
        }
    }
}

impl ShipModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small starting scenario: own ship in open water, two contacts on
    /// simple routes and a pair of channel buoys.
    pub fn training_area(time_offset: u64) -> Self {
        let mut model = Self {
            time: TimeState {
                timestamp: time_offset,
                time_offset,
                time_delta: 0.0,
                accelerator: 1.0,
            },
            ..Self::default()
        };

        model.own_ship.kinematics = OwnShipKinematics {
            position: Vec2::new(1000.0, 1000.0),
            heading: 0.0,
            rate_of_turn: 0.0,
            sog: 5.0,
        };
        model.own_ship.cog = 0.0;

        model.weather = WeatherState {
            weather: 1.0,
            visibility: 10.0,
            wind_direction: 270.0,
            wind_speed: 12.0,
            ..Default::default()
        };

        model.contacts.push(Self::contact(Vec2::new(1500.0, 3000.0), 235_000_001, 180.0, 10.0));
        model.contacts.push(Self::contact(Vec2::new(-800.0, 2200.0), 235_000_002, 90.0, 6.0));

        model.buoys.push(Vec2::new(900.0, 1800.0));
        model.buoys.push(Vec2::new(1100.0, 1800.0));

        model
    }

    fn contact(position: Vec2, mmsi: u32, course: f32, speed_kts: f32) -> ContactState {
        ContactState {
            position,
            heading: course,
            speed: speed_kts / MPS_TO_KTS,
            mmsi,
            legs: vec![
                Leg {
                    bearing: course,
                    speed: speed_kts,
                    start_time: 0.0,
                },
                Leg {
                    bearing: course,
                    speed: 0.0,
                    start_time: leg_duration(speed_kts, 2.0),
                },
            ],
        }
    }

    /// Steps the loop counter and the scenario clock.
    pub fn advance(&mut self, dt: f32) {
        self.loop_number += 1;
        self.time.time_delta += dt * self.time.accelerator;
        self.time.timestamp = self.time.time_offset + self.time.time_delta.max(0.0) as u64;
    }

    fn legs_mut(&mut self, ship: usize) -> Option<&mut Vec<Leg>> {
        self.contacts.get_mut(ship).map(|contact| &mut contact.legs)
    }
}

impl SnapshotSource for ShipModel {
    fn loop_number(&self) -> u64 {
        self.loop_number
    }

    fn time(&self) -> TimeState {
        self.time
    }

    fn own_ship(&self) -> OwnShipState {
        self.own_ship
    }

    fn controls(&self) -> ControlState {
        self.controls
    }

    fn contacts(&self) -> Vec<ContactState> {
        self.contacts.clone()
    }

    fn buoys(&self) -> Vec<Vec2> {
        self.buoys.clone()
    }

    fn man_overboard(&self) -> ManOverboardState {
        self.man_overboard
    }

    fn weather(&self) -> WeatherState {
        self.weather
    }

    fn camera_view(&self) -> u32 {
        self.camera_view
    }

    fn mooring_lines(&self) -> Vec<MooringLine> {
        self.mooring_lines.clone()
    }

    fn serialised_scenario(&self) -> String {
        format!("{}{}", SCENARIO_PREFIX, FullState::capture(self).encode_body())
    }
}

impl CommandSink for ShipModel {
    fn change_contact_leg(
        &mut self,
        ship: usize,
        leg: usize,
        bearing: f32,
        speed: f32,
        distance: f32,
    ) {
        let Some(legs) = self.legs_mut(ship) else {
            return;
        };
        let Some(current) = legs.get_mut(leg) else {
            return;
        };
        current.bearing = bearing;
        current.speed = speed;
        let end = current.start_time + leg_duration(speed, distance);

        match legs.get(leg + 1).map(|next| next.start_time) {
            Some(next_start) => shift_legs(&mut legs[leg + 1..], end - next_start),
            None => legs.push(Leg {
                bearing,
                speed: 0.0,
                start_time: end,
            }),
        }
    }

    fn add_contact_leg(
        &mut self,
        ship: usize,
        after_leg: Option<usize>,
        bearing: f32,
        speed: f32,
        distance: f32,
    ) {
        let now = self.time.time_delta;
        let Some(legs) = self.legs_mut(ship) else {
            return;
        };
        let index = after_leg.map_or(0, |leg| leg + 1);
        if index > legs.len() {
            return;
        }

        let start_time = match legs.get(index) {
            Some(displaced) => displaced.start_time,
            None => legs.last().map_or(now, |last| last.start_time.max(now)),
        };
        legs.insert(
            index,
            Leg {
                bearing,
                speed,
                start_time,
            },
        );
        shift_legs(&mut legs[index + 1..], leg_duration(speed, distance));
    }

    fn delete_contact_leg(&mut self, ship: usize, leg: usize) {
        let Some(legs) = self.legs_mut(ship) else {
            return;
        };
        if leg >= legs.len() {
            return;
        }
        let removed = legs.remove(leg);
        if let Some(next_start) = legs.get(leg).map(|next| next.start_time) {
            shift_legs(&mut legs[leg..], removed.start_time - next_start);
        }
    }

    fn set_own_ship_position(&mut self, x: f32, z: f32) {
        self.own_ship.kinematics.position = Vec2::new(x, z);
    }

    fn set_contact_position(&mut self, ship: usize, x: f32, z: f32) {
        if let Some(contact) = self.contacts.get_mut(ship) {
            contact.position = Vec2::new(x, z);
        }
    }

    fn reset_contact_legs(&mut self, ship: usize, course: f32, speed: f32, distance: f32) {
        let now = self.time.time_delta;
        let Some(contact) = self.contacts.get_mut(ship) else {
            return;
        };
        contact.heading = course;
        contact.speed = speed / MPS_TO_KTS;
        contact.legs = vec![
            Leg {
                bearing: course,
                speed,
                start_time: now,
            },
            Leg {
                bearing: course,
                speed: 0.0,
                start_time: now + leg_duration(speed, distance),
            },
        ];
    }

    fn set_weather(&mut self, weather: f32) {
        self.weather.weather = weather;
    }

    fn set_rain(&mut self, rain: f32) {
        self.weather.rain = rain;
    }

    fn set_visibility(&mut self, visibility: f32) {
        self.weather.visibility = visibility;
    }

    fn set_wind_speed(&mut self, speed: f32) {
        self.weather.wind_speed = speed;
    }

    fn set_wind_direction(&mut self, direction: f32) {
        self.weather.wind_direction = direction;
    }

    fn set_stream_override_speed(&mut self, speed: f32) {
        self.weather.stream_speed = speed;
    }

    fn set_stream_override_direction(&mut self, direction: f32) {
        self.weather.stream_direction = direction;
    }

    fn set_stream_override(&mut self, enabled: bool) {
        self.weather.stream_override = enabled;
    }

    fn release_man_overboard(&mut self) {
        self.man_overboard = ManOverboardState {
            visible: true,
            position: self.own_ship.kinematics.position,
        };
    }

    fn retrieve_man_overboard(&mut self) {
        self.man_overboard.visible = false;
    }

    fn set_contact_mmsi(&mut self, ship: usize, mmsi: u32) {
        if let Some(contact) = self.contacts.get_mut(ship) {
            contact.mmsi = mmsi;
        }
    }

    fn rudder_pump_working(&self, pump: RudderPump) -> bool {
        self.rudder_pumps[pump as usize]
    }

    fn set_rudder_pump_working(&mut self, pump: RudderPump, working: bool) {
        self.rudder_pumps[pump as usize] = working;
    }

    fn set_alarm(&mut self, active: bool) {
        self.alarm = active;
    }

    fn set_follow_up_rudder_working(&mut self, working: bool) {
        self.follow_up_rudder = working;
    }

    fn set_control(&mut self, channel: ControlChannel, value: f32) {
        let controls = &mut self.controls;
        let target = match channel {
            ControlChannel::Wheel => &mut controls.wheel,
            ControlChannel::PortEngine => &mut controls.port_engine,
            ControlChannel::StbdEngine => &mut controls.stbd_engine,
            ControlChannel::PortSchottel => &mut controls.port_schottel,
            ControlChannel::StbdSchottel => &mut controls.stbd_schottel,
            ControlChannel::PortThrustLever => &mut controls.port_thrust_lever,
            ControlChannel::StbdThrustLever => &mut controls.stbd_thrust_lever,
            ControlChannel::BowThruster => &mut controls.bow_thruster,
            ControlChannel::SternThruster => &mut controls.stern_thruster,
        };
        *target = value;
    }

    fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }
}

impl SnapshotSink for ShipModel {
    fn apply_own_ship(&mut self, kinematics: &OwnShipKinematics) {
        self.own_ship.kinematics = *kinematics;
    }

    fn apply_full_state(&mut self, state: &FullState) {
        self.time = state.time;
        self.own_ship = state.own_ship;
        self.controls = state.controls;
        self.contacts = state.contacts.clone();
        self.buoys = state.buoys.clone();
        self.man_overboard = state.man_overboard;
        self.loop_number = state.loop_number;
        self.weather = state.weather;
        self.camera_view = state.camera_view;
        self.mooring_lines = state.mooring_lines.clone();
    }

    fn load_scenario(&mut self, serialised: &str) -> Result<(), DecodeError> {
        let body = serialised
            .strip_prefix(SCENARIO_PREFIX)
            .ok_or_else(|| DecodeError::UnknownPrefix(serialised.chars().take(2).collect()))?;
        let state = FullState::decode_body(body)?;
        self.apply_full_state(&state);
        Ok(())
    }
}
