pub mod clearancedtos;
pub mod notificationdtos;
pub mod phonedtos;
pub mod shipmentdtos;
pub mod trackingdtos;
pub mod userdtos;
pub mod vehicledtos;
