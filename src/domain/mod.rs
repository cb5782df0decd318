pub mod custom_types;
pub mod model;
pub mod ports;
