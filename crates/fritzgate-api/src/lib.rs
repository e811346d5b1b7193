// fritzgate-api: Async Rust client for the FRITZ!Box smart-home interface

pub mod aha;
pub mod auth;
pub mod client;
pub mod devicelist;
pub mod error;
pub mod procedure;
pub mod session;
pub mod surface;
pub mod system;
pub mod transport;

pub use client::FritzClient;
pub use devicelist::{
    AlertInfo, ButtonInfo, DeviceInfo, PowerMeterInfo, SwitchInfo, TempSetting, ThermostatInfo,
};
pub use error::Error;
pub use procedure::Procedure;
pub use session::{SessionId, SessionInfo};
pub use surface::RemoteProcedure;
pub use system::GuestWlan;
pub use transport::{TlsMode, TransportConfig};
