//! The stateless command protocol over the virtual filesystem.
//!
//! A transport decodes a request into a [`ParamBag`] and hands it to
//! the [`Dispatcher`] together with the caller's declared root and
//! identity. The [`Driver`] underneath runs the actual operation
//! against the node store, and [`Views`] turn nodes into the flat
//! wire [`Descriptor`] records clients consume.
//!
//! ```text
//!  request ──▶ ParamBag ──▶ Dispatcher ──▶ Driver ──▶ NodeStore
//!                                │                       │
//!  response ◀── json body ◀── Views ◀────────────────────┘
//! ```
//!
//! Every failure is folded into an `{"error": ...}` json body rather
//! than a transport-level error, so clients always get something they
//! can render.

mod descriptor;
mod dispatch;
mod driver;
pub mod params;

pub use descriptor::{Descriptor, Views};
pub use dispatch::{Dispatcher, ParamBag, Response};
pub use driver::{Driver, DriverError, FileContent, Upload};
