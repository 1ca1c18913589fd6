pub mod alarm_control_panel;
pub mod availability;
pub mod binary_sensor;
pub mod device;
pub mod topics;
