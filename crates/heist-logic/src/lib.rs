//! Pure gameplay logic for Heist.
//!
//! This crate contains the math and rules that are independent of any
//! networking, entity storage, or runtime. Functions take plain data and
//! return results, so the authoritative simulation in `heist-core` and any
//! offline tooling can share them and test them in isolation.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`geometry`] | `Vec3`, ray/sphere and ray/plane intersection, reflection |
//! | [`beam`] | Laser beam tracing with a bounded number of reflections |
//! | [`combination`] | Dial arithmetic with wrap-around, code matching |
//! | [`navigation`] | Waypoint stepping, arrival checks, nearest waypoint |
//! | [`progress`] | Per-tick progress meters (hacking, stealing) |
//! | [`vision`] | View cones and debounced "continuously visible" tracking |
//! | [`zone`] | Zone membership with an explicit boundary policy |

pub mod beam;
pub mod combination;
pub mod geometry;
pub mod navigation;
pub mod progress;
pub mod vision;
pub mod zone;
