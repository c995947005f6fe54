pub mod booking;
pub mod clock;
pub mod policy;
pub mod review;
pub mod scheduling;
