#![deny(dead_code)]
#![deny(unused_imports)]

pub mod aggregate;
pub mod data;
pub mod estimate;
pub mod features;
pub mod model;
pub mod profile;
pub mod registry;
pub mod taxonomy;
pub mod train;
