use glam::{Vec2, Vec3};

use crate::wire::{DecodeError, FullState};

pub const MPS_TO_KTS: f32 = 1.943_844_5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeState {
    /// Unix seconds of the current simulation instant.
    pub timestamp: u64,
    /// Unix seconds at the start of the scenario's first day.
    pub time_offset: u64,
    /// Seconds since `time_offset`.
    pub time_delta: f32,
    pub accelerator: f32,
}

/// Position is (x, z) in the horizontal plane. Speed over ground is in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OwnShipKinematics {
    pub position: Vec2,
    pub heading: f32,
    pub rate_of_turn: f32,
    pub sog: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OwnShipState {
    pub kinematics: OwnShipKinematics,
    pub cog: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlState {
    pub wheel: f32,
    pub rudder: f32,
    pub port_engine: f32,
    pub stbd_engine: f32,
    pub port_engine_rpm: f32,
    pub stbd_engine_rpm: f32,
    pub port_schottel: f32,
    pub stbd_schottel: f32,
    pub port_thrust_lever: f32,
    pub stbd_thrust_lever: f32,
    pub bow_thruster: f32,
    pub stern_thruster: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Leg {
    pub bearing: f32,
    /// Knots.
    pub speed: f32,
    /// Scenario seconds.
    pub start_time: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactState {
    pub position: Vec2,
    pub heading: f32,
    /// m/s.
    pub speed: f32,
    pub mmsi: u32,
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManOverboardState {
    pub visible: bool,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherState {
    pub weather: f32,
    pub visibility: f32,
    pub wind_direction: f32,
    pub rain: f32,
    pub wind_speed: f32,
    pub stream_direction: f32,
    pub stream_speed: f32,
    pub stream_override: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MooringLine {
    pub start: Vec3,
    pub end: Vec3,
    pub start_type: i32,
    pub end_type: i32,
    pub start_id: i32,
    pub end_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RudderPump {
    One,
    Two,
}

impl RudderPump {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// Control surfaces that a `CO` override can drive, in wire selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ControlChannel {
    Wheel = 0,
    PortEngine = 1,
    StbdEngine = 2,
    PortSchottel = 3,
    StbdSchottel = 4,
    PortThrustLever = 5,
    StbdThrustLever = 6,
    BowThruster = 7,
    SternThruster = 8,
}

impl ControlChannel {
    pub fn from_selector(selector: u32) -> Option<Self> {
        match selector {
            0 => Some(Self::Wheel),
            1 => Some(Self::PortEngine),
            2 => Some(Self::StbdEngine),
            3 => Some(Self::PortSchottel),
            4 => Some(Self::StbdSchottel),
            5 => Some(Self::PortThrustLever),
            6 => Some(Self::StbdThrustLever),
            7 => Some(Self::BowThruster),
            8 => Some(Self::SternThruster),
            _ => None,
        }
    }

    pub fn selector(self) -> u32 {
        self as u32
    }
}

/// Read side of the simulation, everything a snapshot needs.
pub trait SnapshotSource {
    fn loop_number(&self) -> u64;
    fn time(&self) -> TimeState;
    fn own_ship(&self) -> OwnShipState;
    fn controls(&self) -> ControlState;
    fn contacts(&self) -> Vec<ContactState>;
    fn buoys(&self) -> Vec<Vec2>;
    fn man_overboard(&self) -> ManOverboardState;
    fn weather(&self) -> WeatherState;
    fn camera_view(&self) -> u32;
    fn mooring_lines(&self) -> Vec<MooringLine>;
    /// Complete scenario text. Owns its own two-character prefix.
    fn serialised_scenario(&self) -> String;
}

/// Write side of the simulation, one method per inbound command effect.
///
/// Indices are zero based. Implementations ignore indices that are out of range.
pub trait CommandSink {
    fn change_contact_leg(
        &mut self,
        ship: usize,
        leg: usize,
        bearing: f32,
        speed: f32,
        distance: f32,
    );
    /// `after_leg` of `None` inserts before the first leg.
    fn add_contact_leg(
        &mut self,
        ship: usize,
        after_leg: Option<usize>,
        bearing: f32,
        speed: f32,
        distance: f32,
    );
    fn delete_contact_leg(&mut self, ship: usize, leg: usize);
    fn set_own_ship_position(&mut self, x: f32, z: f32);
    fn set_contact_position(&mut self, ship: usize, x: f32, z: f32);
    fn reset_contact_legs(&mut self, ship: usize, course: f32, speed: f32, distance: f32);
    fn set_weather(&mut self, weather: f32);
    fn set_rain(&mut self, rain: f32);
    fn set_visibility(&mut self, visibility: f32);
    fn set_wind_speed(&mut self, speed: f32);
    fn set_wind_direction(&mut self, direction: f32);
    fn set_stream_override_speed(&mut self, speed: f32);
    fn set_stream_override_direction(&mut self, direction: f32);
    fn set_stream_override(&mut self, enabled: bool);
    fn release_man_overboard(&mut self);
    fn retrieve_man_overboard(&mut self);
    fn set_contact_mmsi(&mut self, ship: usize, mmsi: u32);
    fn rudder_pump_working(&self, pump: RudderPump) -> bool;
    fn set_rudder_pump_working(&mut self, pump: RudderPump, working: bool);
    fn set_alarm(&mut self, active: bool);
    fn set_follow_up_rudder_working(&mut self, working: bool);
    fn set_control(&mut self, channel: ControlChannel, value: f32);
    fn request_shutdown(&mut self);
}

/// Secondary side: applies decoded snapshots.
pub trait SnapshotSink {
    fn apply_own_ship(&mut self, kinematics: &OwnShipKinematics);
    fn apply_full_state(&mut self, state: &FullState);
    fn load_scenario(&mut self, serialised: &str) -> Result<(), DecodeError>;
}
