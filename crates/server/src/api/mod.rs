pub mod events;
pub mod handlers;
pub mod middleware;
pub mod overlaps;
pub mod reports;
pub mod resolutions;
pub mod routes;
pub mod staging;
pub mod submission;

pub use routes::create_router;
