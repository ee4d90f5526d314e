// habits-core: cron-boundary sync and HTTP access for the Habitica API.

pub mod boundary;
pub mod cache;
pub mod checkpoint;
pub mod client;
pub mod clock;
pub mod coordinator;
pub mod interpret;
pub mod json;
pub mod model;
