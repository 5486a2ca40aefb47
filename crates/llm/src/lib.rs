//! Opaque model call used by the UI generation loop: prompt in, text out.

pub mod http;
pub mod provider;
