//! Output device discovery, configuration and stream setup on top of cpal.

pub mod enumeration;
pub mod negotiation;
pub mod stream;

pub use enumeration::{DeviceEnumerator, DeviceInfo, EnumError, HostInfo};
pub use negotiation::{ConfigNegotiator, ConfigurationRequest, NegotiatedConfig, NegotiationError};
pub use stream::open_output_stream;
