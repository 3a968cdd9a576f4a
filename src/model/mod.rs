//! Value types for the presence and contact-list core.

pub mod contact;
pub mod detail;
pub mod event;
pub mod group;
pub mod oim;
pub mod user;

pub use contact::{Contact, ContactGroupEntry, ContactInfo, ContactLocation, Lst};
pub use detail::UserDetail;
pub use event::{LoginOption, ServiceAddress, SessionEvent};
pub use group::Group;
pub use oim::{MessageType, Oim};
pub use user::{NetworkID, Substatus, User, UserStatus};
