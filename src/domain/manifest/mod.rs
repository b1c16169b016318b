pub mod manifest_view;
pub mod step;
