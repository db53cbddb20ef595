mod cadence;
mod model;
mod ship;

pub use cadence::{CadenceConfig, CadenceScheduler, PayloadKind, Reliability};
pub use model::{
    CommandSink, ContactState, ControlChannel, ControlState, Leg, ManOverboardState, MooringLine,
    OwnShipKinematics, OwnShipState, RudderPump, SnapshotSink, SnapshotSource, TimeState,
    WeatherState, MPS_TO_KTS,
};
pub use ship::ShipModel;
