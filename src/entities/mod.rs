pub mod booking;
pub mod booking_assignment;
pub mod booking_counter;
pub mod booking_item;
pub mod coupon;
pub mod payment;
pub mod service_offering;
