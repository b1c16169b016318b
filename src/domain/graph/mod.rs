pub mod device_graph;
pub mod layout;
pub mod render;
