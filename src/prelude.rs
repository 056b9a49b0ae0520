// Cadenza - An asynchronous, batching Statsd client for Rust!
//
// Copyright 2026 The Cadenza Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Export the traits of Cadenza for easy glob imports
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use cadenza::prelude::*;
//! use cadenza::NopDatagramSink;
//!
//! let sink = NopDatagramSink;
//! assert_eq!(7, sink.send(b"foo:1|c").unwrap());
//!
//! let clock = || Instant::now();
//! let _now = clock.now();
//! ```

pub use crate::metrics::Clock;
pub use crate::sinks::DatagramSink;
