//! Entity cache and filtered cruise view.
//!
//! # Example
//!
//! ```ignore
//! use cruisemap::cache::FilterUpdate;
//!
//! engine.set_filter(FilterUpdate::new().ship_name("volga"));
//! engine.set_filter(FilterUpdate::new().start_date(Some(from)));
//! for cruise in engine.all_cruises() {
//!     println!("{} {}", cruise.departure, cruise.name);
//! }
//! ```

mod entity;
mod filter;

pub use entity::EntityCache;
pub use filter::{CruiseFilter, FilterUpdate};
