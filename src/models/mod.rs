pub mod hall_booking;
pub mod order;
pub mod profile;
