//! Scan Engine - camera code scanning and product resolution
//!
//! Samples frames from a camera, decodes visual codes, resolves them against
//! a product catalog and reports confirmed matches to a point-of-sale host.
//! A session drives the flow through a pure state machine; camera, decoder
//! and catalog are pluggable.

pub mod camera;
pub mod catalog;
pub mod config;
pub mod decoder;
pub mod session;
pub mod telemetry;

pub use camera::{CameraDevice, CameraRequest, DeviceError, Facing, Frame};
pub use catalog::{CatalogEntry, CatalogProvider, MatchResult, StaticCatalog};
pub use config::{ConfigError, ScanConfig};
pub use decoder::{DecodedPayload, Decoder, QrDecoder};
pub use session::{Phase, ScanMode, ScanObserver, ScanSession, ScanStatus, SessionStats};
