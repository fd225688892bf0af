//! Stateless HLS VOD stitcher.
//!
//! A client posts a source playlist and a list of breaks; the answer is a
//! master playlist URL whose token carries the whole instruction. Every
//! playlist fetched through that URL is rebuilt from the token: the master
//! is rewritten to route variants back here, and media playlists get ads
//! spliced in or HLS interstitials marked.

pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod hls;
pub mod metrics;
pub mod model;
pub mod server;
pub mod splice;
pub mod stitcher;
