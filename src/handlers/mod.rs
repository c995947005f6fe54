pub mod bookings;
pub mod health;
pub mod reviews;
pub mod services;

pub(crate) fn fmt_ts(dt: &chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
