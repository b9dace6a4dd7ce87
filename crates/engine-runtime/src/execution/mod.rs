pub mod load;
pub mod unload;
pub mod writer;

mod setup;
