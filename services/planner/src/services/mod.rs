pub mod accounts;
pub mod admin;
pub mod avatars;
pub mod classes;
pub mod password;
pub mod session;
pub mod setup;
pub mod users;

pub use accounts::AccountService;
pub use admin::{AdminService, UserStats};
pub use avatars::AvatarService;
pub use classes::{ClassPatch, ClassService, NewClass};
pub use session::{LoginOutcome, SessionService};
pub use setup::{SetupOutcome, SetupService};
pub use users::{NewProfile, ProfilePatch, UserService};
