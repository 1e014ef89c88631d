pub mod booking;
pub mod booking_number;
pub mod lifecycle;
pub mod pricing;
