pub mod cooldown;
pub mod direction_resolver;
pub mod frame;
pub mod frame_directory;
pub mod motion_box;
pub mod motion_history;
pub mod region_extractor;
pub mod utils;
