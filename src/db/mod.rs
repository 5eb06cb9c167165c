pub mod clearancedb;
pub mod db;
pub mod discountdb;
pub mod notificationdb;
pub mod shipmentdb;
#[cfg(test)]
pub mod testing;
pub mod trackingdb;
pub mod userdb;
pub mod vehicledb;

pub use db::DBClient;
