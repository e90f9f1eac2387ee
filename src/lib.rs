mod client;
mod cognito;
mod command;
mod config;
mod coordinator;
pub mod device;
mod diff;
mod error;
pub mod features;
mod iot;
mod jwt;
pub mod probe;
pub mod protocol;
mod rest;
mod selfdiag;
pub mod session;
pub mod storage;
pub mod store;
mod types;

pub use client::{TclClient, TclClientBuilder};
pub use cognito::CognitoBroker;
pub use command::{Command, Composed, compose};
pub use config::ClientConfig;
pub use coordinator::{Coordinator, TickOutcome};
pub use device::{Device, Family, Mode};
pub use diff::{changed_metadata_keys, pick_state};
pub use error::{Error, Result};
pub use features::{DeviceFeature, FeatureSet, ModeMap};
pub use iot::{AwsIotConnector, FakeIot, IotClient, IotData, IotDataConnector};
pub use rest::TclRestClient;
pub use selfdiag::{SelfDiagRecord, SelfDiagStep};
pub use session::{Clock, SessionManager, SystemClock};
pub use store::{FileStore, MemoryStore, Store};
pub use types::*;
