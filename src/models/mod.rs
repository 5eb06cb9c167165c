pub mod clearancemodel;
pub mod discountmodel;
pub mod notificationmodel;
pub mod shipmentmodel;
pub mod usermodel;
pub mod vehiclemodel;
