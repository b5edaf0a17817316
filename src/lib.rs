//! aerodeck: aircraft panel geometry to vortex-lattice decks, stability and
//! control derivative tables, and airfoil polars.
//!
//! Pipeline: [`geometry::loader`] → [`reference`] → [`deck`] → [`run_matrix`]
//! → [`executor`] (per case, via [`process`]) → [`reducer`] → [`controls`] and
//! [`stability`], with [`polar`] as a parallel path for the section solver.

pub mod config;
pub mod context;
pub mod controls;
pub mod deck;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod hinge;
pub mod io;
pub mod polar;
pub mod process;
pub mod record;
pub mod reducer;
pub mod reference;
pub mod run_matrix;
pub mod stability;
pub mod units;

#[cfg(test)]
mod tests;
