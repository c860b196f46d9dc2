pub mod checkin;
pub mod health;
pub mod qr;
pub mod ticket;
