pub mod booking;
pub mod review;
pub mod service;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use review::Review;
pub use service::Service;
pub use user::{Role, User};
