pub mod blocks;
pub mod directive;
pub mod resources;
