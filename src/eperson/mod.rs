//! Group and e-person data services.

mod group;
mod person;

pub use group::{Group, GroupDataService, GROUP_LINK_PATH};
pub use person::{EPerson, EPersonDataService, EPERSON_LINK_PATH};
