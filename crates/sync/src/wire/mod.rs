mod command;
mod format;
mod snapshot;

pub use command::{
    decode_buffer, dispatch, encode_commands, Command, DecodedBuffer, DispatchReport,
    ManOverboardAction, ShipTarget, WeatherOverride, RESET_LEG_DISTANCE_NM,
};
pub use format::{
    clean_payload, DecodeError, COMMAND_PREFIX, FULL_STATE_PREFIX, SCENARIO_PREFIX, SHORT_PREFIX,
    SHUTDOWN_PAYLOAD,
};
pub use snapshot::{decode_payload, encode_payload, encode_short, FullState, Payload};
