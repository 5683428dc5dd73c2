//! Validated newtypes for the D-Bus name grammars (bus names, interface names, member names,
//! error names). See spec §4.11 for the exact grammar each type enforces.

mod bus_name;
mod error;
mod error_name;
mod interface_name;
mod member_name;
mod unique_name;
mod well_known_name;

pub use bus_name::BusName;
pub use error::{Error, Result};
pub use error_name::ErrorName;
pub use interface_name::InterfaceName;
pub use member_name::MemberName;
pub use unique_name::UniqueName;
pub use well_known_name::WellKnownName;
