#![forbid(unsafe_code)]

//! Library behind the viral video finder binaries.
//!
//! A batch takes a list of keywords, asks the YouTube Data API for recent
//! popular uploads, and keeps the ones from small channels whose views far
//! outrun their subscriber counts. The binaries only collect input and render
//! the [`batch::BatchReport`].

pub mod batch;
pub mod config;
pub mod keywords;
pub mod logging;
pub mod present;
pub mod scoring;
pub mod youtube;
