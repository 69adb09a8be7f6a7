//! Conference channel control protocol for media relay servers.
//!
//! This crate implements the client side of a conference-channel control
//! protocol: a typed [`Conference`] document model, a [`RequestBuilder`]
//! compiling allocate/update/expire requests against shared conference
//! state, and an [`analyser`] folding relay responses back into that state.
//!
//! The wire exchange itself is out of scope: callers serialize the compiled
//! request document, deliver it to the relay by whatever transport they
//! use, and hand the parsed response document back to the [`analyser`].
//!
//! A [`Conference`] and the [`RequestBuilder`] bound to it are meant to be
//! driven by one logical owner at a time; the `&`/`&mut` parameters of the
//! builder and analyser make that explicit.
//!
//! [`Conference`]: crate::proto::Conference
//! [`RequestBuilder`]: crate::builder::RequestBuilder
//! [`analyser`]: crate::analyser

#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]
#![forbid(unsafe_code)]

pub mod analyser;
pub mod builder;
pub mod conf;
pub mod log;
pub mod proto;
