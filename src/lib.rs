pub mod config;
pub mod error;
pub mod fetch;
pub mod geodesy;
pub mod grid;
pub mod infra;
pub mod output;
pub mod pipeline;
pub mod polygonize;
pub mod raster;
pub mod services;
pub mod vector;
