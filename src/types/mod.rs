pub mod id;
pub mod enums;

pub use enums::DefaultPermission;
pub use id::{AirportCode, Nonce, OperatorAddress};

/// Destinations are airports seen from the other end of a route.
pub type Destination = AirportCode;
