mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod projection;
    pub mod report;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod identity;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod delivery {
    pub mod reply;
}
mod config;
mod constants;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use delivery::*;
