pub mod certificate_dto;
pub mod device_dto;
pub mod manifest_dto;
pub mod module_dto;
