//! External-facing collaborators. Currently just the HTTP surface; the
//! engine-command bus it drives lives in `application`.

pub mod http;
