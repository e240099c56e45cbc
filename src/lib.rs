//! # raw-to-jpg
//!
//! Converts camera RAW files (CR2/NEF) to JPEG or TIFF and mirrors a folder
//! tree into a destination, copying the non-RAW files alongside.
//!
//! # Architecture
//!
//! ```text
//! main.rs   flags → Mode, config, Ctrl-C, printer thread
//!   └── run      validate source, pick the walker
//!         └── walk     tree walk / group-enhance batch / archive walk
//!               ├── convert   RAW → JPEG/TIFF through imaging::RawBackend
//!               └── copy      byte copy with permissions and timestamps
//! ```
//!
//! Workers never print. Progress travels as [`report::Event`]s over an
//! `mpsc` channel and outcomes accumulate in a [`report::RunReport`] owned
//! by the caller.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | RAW / other classification by extension |
//! | [`skip`] | Existing-output skip decisions |
//! | [`convert`] | One RAW file → one JPEG/TIFF with the source's mtime |
//! | [`copy`] | One file → mirrored destination, staged and renamed |
//! | [`walk`] | Tree walk, group-enhance batch, archive walk |
//! | [`run`] | `Mode` selection, usage validation, dispatch |
//! | [`report`] | Progress events and the per-run report |
//! | [`imaging`] | LibRaw backend, bad-pixel detection and repair, encoders |
//! | [`config`] | Optional `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Existence-Only Skips
//!
//! An output that exists (as `a.jpg` or `a.JPG`) is never rewritten unless
//! the run is forced. Outputs carry their source's modification time, so a
//! later staleness check can compare them, but re-running over a finished
//! tree is a cheap no-op today.
//!
//! ## Bad Pixels on the Sensor Plane
//!
//! Hot and dead pixels are found and repaired on the raw CFA data, before
//! demosaicing spreads them into their neighbours. In group-enhance mode
//! every RAW file of a folder votes, and a pixel has to misbehave in most of
//! them to count as defective. See [`imaging::defects`].

pub mod catalog;
pub mod config;
pub mod convert;
pub mod copy;
pub mod imaging;
pub mod output;
pub mod report;
pub mod run;
pub mod skip;
pub mod walk;

#[cfg(test)]
pub(crate) mod test_helpers;
