pub mod chat;
pub mod report;
pub mod sensor;
pub mod station;
pub mod user;

pub use chat::*;
pub use report::*;
pub use sensor::*;
pub use station::*;
pub use user::*;
