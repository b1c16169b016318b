pub mod execution_record_dto;
