pub mod assignment;
pub mod courier;
pub mod earning;
pub mod location;
pub mod notification;
pub mod order;
